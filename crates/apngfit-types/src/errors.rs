use thiserror::Error;

pub type Result<T, E = ApngFitError> = std::result::Result<T, E>;

/// Unified error type covering failure scenarios across the pipeline crates.
#[derive(Debug, Error)]
pub enum ApngFitError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("no frames to encode")]
    EmptyInput,
    #[error("ingest error: {0}")]
    Ingest(String),
    #[error("raster error: {0}")]
    Raster(String),
    #[error("encoder error: {0}")]
    Encoder(String),
    #[error("request generation {generation} was superseded")]
    Superseded { generation: u64 },
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
