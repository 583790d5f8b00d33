use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error(transparent)]
    Transport(#[from] dozor_transport::TransportError),
    #[error("failed to parse collector output: {0}")]
    Parse(String),
    #[error("request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
