use thiserror::Error;

#[derive(Debug, Error)]
pub enum JitterError {
    /// The target could not be parsed or resolved to an address.
    #[error("invalid host '{0}': could not resolve target")]
    InvalidHost(String),

    #[error("failed to start probe runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("probe worker thread exited without a result")]
    WorkerLost,

    #[error("could not find config directory")]
    NoConfigDir,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JitterError>;
