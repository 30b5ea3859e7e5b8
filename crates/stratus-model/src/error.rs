use thiserror::Error;

/// Errors surfaced while assembling a topology.
///
/// Setup errors abort the run before any request is processed; once a
/// topology is built, the model itself is infallible.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,

    #[error("node {0} is not a proxy")]
    NotAProxy(String),
}
