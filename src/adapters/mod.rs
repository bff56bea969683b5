//! Adapters - Concrete implementations of ports.

pub mod archive;
pub mod cmd;
pub mod ffmpeg;
pub mod staging;
