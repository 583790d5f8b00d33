use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to spawn session process: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("i/o error communicating with session process: {0}")]
    Io(#[source] std::io::Error),
    #[error("session is closed")]
    SessionClosed,
    #[error(transparent)]
    Transport(#[from] dozor_transport::TransportError),
}
