use crate::adapters::ffmpeg::{FfmpegRenderer, FfprobeProber};
use crate::config::{default_workers, PipelineConfig};
use crate::domain::filter::Composition;
use crate::domain::planner::{wall_clock_seed, VariantPlanner};
use crate::domain::report::{BatchError, BatchReport, RenderError, RenderFailure, RenderResult};
use crate::domain::variant::{PerturbationBand, RenderSpec};
use crate::ports::media::{MediaProber, VariantRenderer};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Probes the source once, then renders every variant on a bounded pool.
///
/// A failed variant never stops the others; it is logged and reported in the
/// returned [`BatchReport`]. Only a probe failure (or an unusable output
/// directory) ends the batch before anything is dispatched.
pub struct BatchCoordinator<P, R> {
    prober: P,
    renderer: Arc<R>,
    workers: usize,
    render_timeout: Option<Duration>,
    seed: Option<u64>,
    band: PerturbationBand,
    composition: Composition,
}

impl BatchCoordinator<FfprobeProber, FfmpegRenderer> {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let prober = FfprobeProber::new(&config.ffprobe_bin);
        let renderer = FfmpegRenderer::new(&config.ffmpeg_bin, config.encoder.clone());

        let mut coordinator = Self::new(prober, renderer)
            .with_workers(config.workers)
            .with_render_timeout(config.render_timeout)
            .with_band(config.band)
            .with_composition(config.composition.clone());
        coordinator.seed = config.seed;
        coordinator
    }
}

impl<P, R> BatchCoordinator<P, R>
where
    P: MediaProber,
    R: VariantRenderer + 'static,
{
    pub fn new(prober: P, renderer: R) -> Self {
        Self {
            prober,
            renderer: Arc::new(renderer),
            workers: default_workers(),
            render_timeout: None,
            seed: None,
            band: PerturbationBand::default(),
            composition: Composition::default(),
        }
    }

    /// Cap on concurrent renders, independent of the batch size. Zero is treated as one.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_band(mut self, band: PerturbationBand) -> Self {
        self.band = band;
        self
    }

    pub fn with_composition(mut self, composition: Composition) -> Self {
        self.composition = composition;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub async fn run(
        &self,
        source: &Path,
        watermark: &Path,
        output_dir: &Path,
        variants: usize,
    ) -> BatchReport {
        self.run_until_cancelled(source, watermark, output_dir, variants, CancellationToken::new())
            .await
    }

    /// Like [`run`](Self::run), but renders that have not finished when
    /// `cancel` fires end as [`RenderError::Cancelled`].
    ///
    /// Dropping the returned future cancels the remaining renders as well.
    pub async fn run_until_cancelled(
        &self,
        source: &Path,
        watermark: &Path,
        output_dir: &Path,
        variants: usize,
        cancel: CancellationToken,
    ) -> BatchReport {
        let dimensions = match self.prober.probe(source).await {
            Ok(dimensions) => dimensions,
            Err(e) => {
                error!(source = %source.display(), error = %e, "Failed to get video dimensions, aborting batch");
                return BatchReport::Aborted(BatchError::Probe(e));
            }
        };

        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            error!(output_dir = %output_dir.display(), error = %e, "Cannot create output directory");
            return BatchReport::Aborted(BatchError::OutputDir {
                path: output_dir.to_path_buf(),
                source: e,
            });
        }

        if !dimensions.is_even() {
            warn!(
                %dimensions,
                canvas = %dimensions.rounded_to_even(),
                "Source has an odd side, rendering on the nearest smaller even canvas"
            );
        }

        let seed = self.seed.unwrap_or_else(wall_clock_seed);
        let planner = VariantPlanner::new(source, watermark, output_dir, dimensions, seed)
            .with_band(self.band)
            .with_composition(self.composition.clone());

        info!(
            source = %source.display(),
            %dimensions,
            variants,
            workers = self.workers,
            seed,
            "Dispatching variant batch"
        );

        // child token: the guard must not cancel the caller's token on a normal return
        let batch_cancel = cancel.child_token();
        let _abort_on_drop = batch_cancel.clone().drop_guard();
        let permits = Arc::new(Semaphore::new(self.workers));

        let handles: Vec<(usize, JoinHandle<RenderResult>)> = planner
            .plan_batch(variants)
            .into_iter()
            .map(|spec| {
                let index = spec.index;
                let task = render_with_permit(
                    self.renderer.clone(),
                    spec,
                    permits.clone(),
                    batch_cancel.clone(),
                    self.render_timeout,
                );
                (index, tokio::spawn(task))
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (index, handle) in handles {
            let result = handle.await.unwrap_or_else(|join_error| {
                Err(RenderFailure::new(
                    index,
                    RenderError::WorkerPanicked {
                        message: join_error.to_string(),
                    },
                ))
            });

            match &result {
                Ok(path) => debug!(index, path = %path.display(), "Variant collected"),
                Err(failure) => match failure.error.diagnostics() {
                    Some(stderr) => error!(index, error = %failure.error, stderr, "Error processing video"),
                    None => error!(index, error = %failure.error, "Error processing video"),
                },
            }
            results.push(result);
        }

        let report = BatchReport::from_results(results);
        let status = report.status();
        let rendered = report.outputs().len();
        let failed = report.failures().len();
        if failed == 0 {
            info!(?status, rendered, "Variant batch finished");
        } else {
            warn!(?status, rendered, failed, "Variant batch finished with failures");
        }
        report
    }
}

async fn render_with_permit<R: VariantRenderer>(
    renderer: Arc<R>,
    spec: RenderSpec,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
) -> RenderResult {
    let index = spec.index;
    let cancelled = || Err(RenderFailure::new(index, RenderError::Cancelled));

    let _permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return cancelled(),
        permit = permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return cancelled(),
        },
    };

    let render = async {
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, renderer.render(&spec)).await {
                Ok(result) => result,
                Err(_) => Err(RenderFailure::new(
                    index,
                    RenderError::TimedOut {
                        after_secs: limit.as_secs(),
                    },
                )),
            },
            None => renderer.render(&spec).await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => cancelled(),
        result = render => result,
    }
}
