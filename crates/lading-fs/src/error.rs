use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to lock {path}: {source}")]
    Lock {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Error::NotFound(path) => path,
            Error::Lock { path, .. } | Error::Read { path, .. } | Error::Write { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
