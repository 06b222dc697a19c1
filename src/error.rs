use thiserror::Error;

/// Failures of the surrounding machinery, as opposed to diagnostics about
/// the source program.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
