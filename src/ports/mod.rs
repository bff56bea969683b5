//! Ports - Trait definitions for the external media tools.

pub mod media;
