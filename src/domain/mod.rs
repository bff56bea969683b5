//! Domain layer - Pure business logic.

pub mod dimensions;
pub mod filter;
pub mod intake;
pub mod planner;
pub mod report;
pub mod variant;
