use super::dimensions::ProbeError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderError {
    #[error("failed to start transcoder: {message}")]
    Spawn { message: String },
    #[error("transcoder exited with {status:?}: {stderr}")]
    ToolFailed { status: Option<i32>, stderr: String },
    #[error("render did not finish within {after_secs}s")]
    TimedOut { after_secs: u64 },
    #[error("render cancelled")]
    Cancelled,
    #[error("render worker panicked: {message}")]
    WorkerPanicked { message: String },
}

impl RenderError {
    /// Whatever the external tool printed, if it got that far.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            RenderError::ToolFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// A failed variant, tagged with the index it was planned under.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("variant {index}: {error}")]
pub struct RenderFailure {
    pub index: usize,
    pub error: RenderError,
}

impl RenderFailure {
    pub fn new(index: usize, error: RenderError) -> Self {
        Self { index, error }
    }
}

pub type RenderResult = Result<PathBuf, RenderFailure>;

/// Reasons a batch stops before any variant is rendered.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("probing source failed: {0}")]
    Probe(#[from] ProbeError),
    #[error("cannot create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Nothing was dispatched.
    Aborted,
    /// Every requested variant rendered.
    Complete,
    /// Some variants rendered, some failed.
    Partial,
    /// Variants were dispatched and none rendered.
    Failed,
}

#[derive(Debug)]
pub enum BatchReport {
    Aborted(BatchError),
    Finished {
        /// Successful outputs, in index order.
        outputs: Vec<PathBuf>,
        failures: Vec<RenderFailure>,
    },
}

impl BatchReport {
    /// Fold per-variant results, collected in submission order.
    pub fn from_results(results: impl IntoIterator<Item = RenderResult>) -> Self {
        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(path) => outputs.push(path),
                Err(failure) => failures.push(failure),
            }
        }
        BatchReport::Finished { outputs, failures }
    }

    pub fn status(&self) -> BatchStatus {
        match self {
            BatchReport::Aborted(_) => BatchStatus::Aborted,
            BatchReport::Finished { failures, .. } if failures.is_empty() => BatchStatus::Complete,
            BatchReport::Finished { outputs, .. } if outputs.is_empty() => BatchStatus::Failed,
            BatchReport::Finished { .. } => BatchStatus::Partial,
        }
    }

    pub fn outputs(&self) -> &[PathBuf] {
        match self {
            BatchReport::Aborted(_) => &[],
            BatchReport::Finished { outputs, .. } => outputs,
        }
    }

    pub fn failures(&self) -> &[RenderFailure] {
        match self {
            BatchReport::Aborted(_) => &[],
            BatchReport::Finished { failures, .. } => failures,
        }
    }

    pub fn error(&self) -> Option<&BatchError> {
        match self {
            BatchReport::Aborted(error) => Some(error),
            BatchReport::Finished { .. } => None,
        }
    }

    /// Why the batch produced nothing, for the caller to surface as an error.
    ///
    /// `None` whenever at least one variant rendered, and for an empty batch.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            BatchReport::Aborted(error) => Some(error.to_string()),
            BatchReport::Finished { outputs, failures } if outputs.is_empty() && !failures.is_empty() => {
                Some(format!("all {} variants failed to render", failures.len()))
            }
            BatchReport::Finished { .. } => None,
        }
    }

    pub fn into_outputs(self) -> Vec<PathBuf> {
        match self {
            BatchReport::Aborted(_) => Vec::new(),
            BatchReport::Finished { outputs, .. } => outputs,
        }
    }
}
