use lading_core::TransferError;
use lading_verify::VerificationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] figment::Error),

    #[error(transparent)]
    Toml(#[from] toml::ser::Error),

    #[error(transparent)]
    Checksum(#[from] VerificationError),

    #[error("invalid location {name}: {source}")]
    Location {
        name:   String,
        #[source]
        source: TransferError,
    },

    #[error("duplicate location name: {0}")]
    DuplicateLocation(String),

    #[error("no tokio runtime available to run transfer jobs")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
