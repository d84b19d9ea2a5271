//! Pipeline error taxonomy.
//!
//! | Variant | Stage | Fatal |
//! |---------|-------|-------|
//! | [`Configuration`](PipelineError::Configuration) | before startup | yes |
//! | [`Materialization`](PipelineError::Materialization) | checkout / workdir cleanup | yes |
//! | [`IndexBuild`](PipelineError::IndexBuild) | loading, embedding the corpus | yes |
//! | [`Query`](PipelineError::Query) | a single turn | no |
//!
//! Fatal errors abort the run; a query error is reported on the failing turn
//! and the session keeps going.

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("repository materialization failed: {0:#}")]
    Materialization(#[source] anyhow::Error),

    #[error("index build failed: {0:#}")]
    IndexBuild(#[source] anyhow::Error),

    #[error("query failed: {0:#}")]
    Query(#[source] anyhow::Error),
}

impl PipelineError {
    /// Whether the error must terminate the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::Query(_))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
