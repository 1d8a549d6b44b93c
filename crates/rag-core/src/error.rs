use thiserror::Error;

/// Error taxonomy shared by the workspace.
///
/// Library functions return `anyhow::Result`; these variants travel inside and
/// callers classify them with `anyhow::Error::downcast_ref::<Error>()`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Embedding dimension mismatch: index expects {expected}, provider produced {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Malformed ground truth: {0}")]
    GroundTruth(String),

    #[error("Back-end failure: {0}")]
    Backend(String),
}

impl Error {
    /// Configuration-class errors abort the caller; they are never retried or degraded around.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::DimensionMismatch { .. } | Self::GroundTruth(_))
    }
}

/// True when `err` carries a fatal [`Error`] anywhere in its chain.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<Error>())
        .any(Error::is_fatal)
}

pub type Result<T> = std::result::Result<T, Error>;
