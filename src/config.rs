//! Configuration loaded from the environment.

use crate::adapters::ffmpeg::EncoderSettings;
use crate::domain::filter::Composition;
use crate::domain::intake::DEFAULT_MAX_UPLOAD_BYTES;
use crate::domain::variant::PerturbationBand;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 600;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Where the inputs are staged before a batch
    pub upload_dir: PathBuf,
    /// Where `video_<index>.mp4` files and the archive are written
    pub output_dir: PathBuf,
    /// Maximum number of transcoder processes running at once
    pub workers: usize,
    /// Per-variant limit; `None` lets a render run forever
    pub render_timeout: Option<Duration>,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    /// Fixed seed for reproducible color parameters
    pub seed: Option<u64>,
    pub band: PerturbationBand,
    pub encoder: EncoderSettings,
    pub composition: Composition,
    pub max_upload_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads/videos/"),
            output_dir: PathBuf::from("static/videos/"),
            workers: default_workers(),
            render_timeout: Some(Duration::from_secs(DEFAULT_RENDER_TIMEOUT_SECS)),
            ffmpeg_bin: String::from("ffmpeg"),
            ffprobe_bin: String::from("ffprobe"),
            seed: None,
            band: PerturbationBand::default(),
            encoder: EncoderSettings::default(),
            composition: Composition::default(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key/value source; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(workers) = parsed::<usize>(&lookup, "WORKERS") {
            config.workers = workers.max(1);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "RENDER_TIMEOUT_SECS") {
            config.render_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(bin) = lookup("FFMPEG_BIN") {
            config.ffmpeg_bin = bin;
        }
        if let Some(bin) = lookup("FFPROBE_BIN") {
            config.ffprobe_bin = bin;
        }
        config.seed = parsed::<u64>(&lookup, "VARIANT_SEED");

        if let Some(codec) = lookup("VIDEO_CODEC") {
            config.encoder.video_codec = codec;
        }
        if let Some(preset) = lookup("X264_PRESET") {
            config.encoder.preset = preset;
        }
        if let Some(crf) = parsed::<u8>(&lookup, "CRF") {
            config.encoder.crf = crf;
        }

        if let Some(color) = lookup("CANVAS_COLOR") {
            if is_filter_safe_color(&color) {
                config.composition.canvas_color = color;
            } else {
                warn!(value = %color, "Ignoring CANVAS_COLOR, not a plain ffmpeg color");
            }
        }
        if let Some(enabled) = parsed::<bool>(&lookup, "WATERMARK_COLORKEY") {
            if !enabled {
                config.composition.colorkey = None;
            }
        }
        if let Some(bytes) = parsed::<u64>(&lookup, "MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = bytes;
        }

        config
    }
}

pub fn default_workers() -> usize {
    num_cpus::get().max(1)
}

/// Color names, `#rrggbb`, `0xrrggbb` and `name@alpha`; nothing that could
/// break out of a filter option.
pub fn is_filter_safe_color(color: &str) -> bool {
    !color.is_empty()
        && color
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '#' | '@' | '.'))
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring malformed configuration value");
            None
        }
    }
}
