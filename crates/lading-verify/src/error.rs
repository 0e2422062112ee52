#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("unknown digest algorithm: {0}")]
    UnknownAlgorithm(String),
}
