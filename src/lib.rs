//! Varimark - Watermarked Video Variant Generator
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (dimensions, variants, filter graph, reports, intake)
//! - ports/: Trait definitions for the external media tools
//! - adapters/: Concrete implementations (ffmpeg/ffprobe subprocesses, input staging, zip packaging)
//! - application/: Batch coordinator
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

// Re-exports for convenience
pub use adapters::ffmpeg::{FfmpegRenderer, FfprobeProber};
pub use application::batch::BatchCoordinator;
pub use config::PipelineConfig;
pub use domain::report::{BatchError, BatchReport, BatchStatus, RenderFailure, RenderResult};
pub use domain::variant::{RenderSpec, VariantParams};

use std::path::{Path, PathBuf};

/// Generate `variants` watermarked copies of `video` with the real ffmpeg toolchain.
///
/// Returns every successfully rendered output path. An empty list means the
/// batch produced nothing, either because probing failed or because every
/// render failed; use [`BatchCoordinator::run`] directly to tell those apart.
pub async fn generate_unique_videos(
    config: &PipelineConfig,
    video: &Path,
    watermark: &Path,
    variants: usize,
) -> Vec<PathBuf> {
    let coordinator = BatchCoordinator::from_config(config);
    coordinator
        .run(video, watermark, &config.output_dir, variants)
        .await
        .into_outputs()
}
