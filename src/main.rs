use anyhow::bail;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use varimark::adapters::archive;
use varimark::adapters::staging::StagedInputs;
use varimark::domain::intake::{validate_count, validate_input, MediaRole, DEFAULT_VARIANT_COUNT};
use varimark::{BatchCoordinator, BatchStatus, PipelineConfig, RenderFailure};

/// Generate watermarked, color-perturbed copies of a video.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Source video (mp4, mov, avi, mkv)
    video: PathBuf,

    /// Watermark image or video
    watermark: PathBuf,

    /// Number of variants to generate
    #[arg(short = 'n', long, default_value_t = DEFAULT_VARIANT_COUNT as i64, allow_hyphen_values = true)]
    count: i64,

    /// Overrides OUTPUT_DIR
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Overrides WORKERS
    #[arg(short, long)]
    workers: Option<usize>,

    /// Overrides VARIANT_SEED
    #[arg(long)]
    seed: Option<u64>,

    /// Per-variant time limit in seconds, 0 disables it
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Leave the variants loose instead of bundling them into a zip
    #[arg(long)]
    no_zip: bool,

    /// Keep the loose variant files next to the zip
    #[arg(long)]
    keep_variants: bool,

    /// Print a JSON summary on stdout
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers.max(1);
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(secs) = self.timeout {
            config.render_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
    }
}

#[derive(Serialize)]
struct Summary<'a> {
    status: BatchStatus,
    requested: usize,
    outputs: &'a [PathBuf],
    failures: &'a [RenderFailure],
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env();
    cli.apply(&mut config);

    let variants = validate_count(cli.count)?;
    validate_input(&cli.video, MediaRole::Source, config.max_upload_bytes)?;
    validate_input(&cli.watermark, MediaRole::Watermark, config.max_upload_bytes)?;

    let staged = StagedInputs::stage(&config.upload_dir, &cli.video, &cli.watermark).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling remaining renders");
            on_interrupt.cancel();
        }
    });

    let coordinator = BatchCoordinator::from_config(&config);
    let report = coordinator
        .run_until_cancelled(
            &staged.video,
            &staged.watermark,
            &config.output_dir,
            variants,
            cancel,
        )
        .await;
    staged.remove().await;

    let archive_path = if report.outputs().is_empty() || cli.no_zip {
        None
    } else {
        Some(archive::bundle(report.outputs(), &config.output_dir, cli.keep_variants).await?)
    };

    let error = report.failure_reason();

    if cli.json {
        let summary = Summary {
            status: report.status(),
            requested: variants,
            outputs: report.outputs(),
            failures: report.failures(),
            archive: archive_path.clone(),
            error: error.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if let Some(path) = &archive_path {
        println!("{}", path.display());
    } else {
        for output in report.outputs() {
            println!("{}", output.display());
        }
    }

    if let Some(reason) = error {
        bail!("generation failed: {}", reason);
    }
    Ok(())
}
