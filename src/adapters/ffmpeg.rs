use super::cmd::{CommandExecutor, RealCommandExecutor};
use crate::domain::dimensions::{parse_dimensions, Dimensions, ProbeError};
use crate::domain::report::{RenderError, RenderFailure, RenderResult};
use crate::domain::variant::RenderSpec;
use crate::ports::media::{MediaProber, VariantRenderer};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Output;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

// What ffmpeg's mp4 muxer prints when a copied audio codec has no mp4 tag.
const AUDIO_COPY_REJECTIONS: [&str; 2] = [
    "codec not currently supported in container",
    "Could not find tag for codec",
];

// ffmpeg before 5.1 has no -fps_mode and rejects the whole command line.
const FPS_MODE_REJECTION: &str = "Unrecognized option 'fps_mode'";

/// Video encoder options shared by every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            video_codec: String::from("libx264"),
            preset: String::from("ultrafast"),
            crf: 23,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Copy,
    Aac,
}

impl AudioMode {
    fn codec(&self) -> &'static str {
        match self {
            AudioMode::Copy => "copy",
            AudioMode::Aac => "aac",
        }
    }
}

/// Option used to force a constant output frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSync {
    /// `-fps_mode cfr`, ffmpeg 5.1 and newer
    FpsMode,
    /// `-vsync cfr`, for older builds
    Vsync,
}

impl FrameSync {
    fn flag(&self) -> &'static str {
        match self {
            FrameSync::FpsMode => "-fps_mode",
            FrameSync::Vsync => "-vsync",
        }
    }
}

pub struct FfprobeProber<E = RealCommandExecutor> {
    executor: E,
    program: String,
}

impl FfprobeProber<RealCommandExecutor> {
    pub fn new(program: &str) -> Self {
        Self::with_executor(RealCommandExecutor, program)
    }
}

impl<E: CommandExecutor> FfprobeProber<E> {
    pub fn with_executor(executor: E, program: &str) -> Self {
        Self {
            executor,
            program: program.to_string(),
        }
    }
}

pub fn probe_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "csv=p=0",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    args.push(path.as_os_str().to_os_string());
    args
}

#[async_trait]
impl<E: CommandExecutor> MediaProber for FfprobeProber<E> {
    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError> {
        let output = self
            .executor
            .execute(&self.program, &probe_args(path))
            .await
            .map_err(|e| ProbeError::Spawn(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(ProbeError::ToolFailed {
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let dimensions = parse_dimensions(&String::from_utf8_lossy(&output.stdout))?;
        debug!(path = %path.display(), %dimensions, "Probed source");
        Ok(dimensions)
    }
}

pub struct FfmpegRenderer<E = RealCommandExecutor> {
    executor: E,
    program: String,
    encoder: EncoderSettings,
    // set once the binary turned out to predate -fps_mode
    legacy_sync: AtomicBool,
}

impl FfmpegRenderer<RealCommandExecutor> {
    pub fn new(program: &str, encoder: EncoderSettings) -> Self {
        Self::with_executor(RealCommandExecutor, program, encoder)
    }
}

impl<E: CommandExecutor> FfmpegRenderer<E> {
    pub fn with_executor(executor: E, program: &str, encoder: EncoderSettings) -> Self {
        Self {
            executor,
            program: program.to_string(),
            encoder,
            legacy_sync: AtomicBool::new(false),
        }
    }

    fn frame_sync(&self) -> FrameSync {
        if self.legacy_sync.load(Ordering::Relaxed) {
            FrameSync::Vsync
        } else {
            FrameSync::FpsMode
        }
    }

    async fn transcode(
        &self,
        spec: &RenderSpec,
        audio: AudioMode,
        sync: FrameSync,
    ) -> Result<Output, RenderError> {
        self.executor
            .execute(&self.program, &render_args(spec, &self.encoder, audio, sync))
            .await
            .map_err(|e| RenderError::Spawn {
                message: format!("{}: {}", self.program, e),
            })
    }
}

/// Full ffmpeg argument vector for one variant.
pub fn render_args(
    spec: &RenderSpec,
    encoder: &EncoderSettings,
    audio: AudioMode,
    sync: FrameSync,
) -> Vec<OsString> {
    let graph = spec.filter_graph();
    let output_pad = graph.output_pad();
    let crf = encoder.crf.to_string();

    let mut args: Vec<OsString> = Vec::with_capacity(32);
    args.push(OsString::from("-hide_banner"));
    args.push(OsString::from("-y"));
    args.push(OsString::from("-i"));
    args.push(spec.source_path.as_os_str().to_os_string());
    args.push(OsString::from("-i"));
    args.push(spec.watermark_path.as_os_str().to_os_string());

    for value in [
        "-filter_complex",
        graph.as_str(),
        "-map",
        output_pad.as_str(),
        // source audio only, if it has any
        "-map",
        "0:a?",
        "-c:v",
        encoder.video_codec.as_str(),
        "-preset",
        encoder.preset.as_str(),
        "-crf",
        crf.as_str(),
        sync.flag(),
        "cfr",
        "-c:a",
        audio.codec(),
        "-movflags",
        "+faststart",
    ] {
        args.push(OsString::from(value));
    }
    args.push(spec.output_path.as_os_str().to_os_string());
    args
}

fn audio_copy_rejected(stderr: &str) -> bool {
    AUDIO_COPY_REJECTIONS
        .iter()
        .any(|needle| stderr.contains(needle))
}

#[async_trait]
impl<E: CommandExecutor> VariantRenderer for FfmpegRenderer<E> {
    async fn render(&self, spec: &RenderSpec) -> RenderResult {
        let failure = |error| RenderFailure::new(spec.index, error);

        let mut audio = AudioMode::Copy;
        let mut sync = self.frame_sync();

        // each fallback is taken at most once, so this ends after three attempts
        loop {
            let output = self.transcode(spec, audio, sync).await.map_err(failure)?;
            if output.status.success() {
                break;
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            if sync == FrameSync::FpsMode && stderr.contains(FPS_MODE_REJECTION) {
                warn!(index = spec.index, "ffmpeg does not know -fps_mode, falling back to -vsync");
                self.legacy_sync.store(true, Ordering::Relaxed);
                sync = FrameSync::Vsync;
            } else if audio == AudioMode::Copy && audio_copy_rejected(&stderr) {
                warn!(
                    index = spec.index,
                    "Audio stream cannot be copied into mp4, re-encoding it as AAC"
                );
                audio = AudioMode::Aac;
            } else {
                return Err(failure(RenderError::ToolFailed {
                    status: output.status.code(),
                    stderr: stderr.trim().to_string(),
                }));
            }
        }

        info!(
            index = spec.index,
            path = %spec.output_path.display(),
            brightness = spec.brightness,
            contrast = spec.contrast,
            "Rendered variant"
        );
        Ok(spec.output_path.clone())
    }
}
