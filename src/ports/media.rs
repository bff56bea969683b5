use crate::domain::dimensions::{Dimensions, ProbeError};
use crate::domain::report::RenderResult;
use crate::domain::variant::RenderSpec;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Width and height of the first video stream of `path`.
    async fn probe(&self, path: &Path) -> Result<Dimensions, ProbeError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VariantRenderer: Send + Sync {
    /// Produce `spec.output_path`, overwriting it if present.
    ///
    /// Failures come back as values tagged with `spec.index`; implementations
    /// must not panic on tool errors.
    async fn render(&self, spec: &RenderSpec) -> RenderResult;
}
