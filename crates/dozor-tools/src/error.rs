use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
    #[error("blocked pattern: {0}")]
    Blocked(String),
    #[error(transparent)]
    Transport(#[from] dozor_transport::TransportError),
    #[error(transparent)]
    Collect(#[from] dozor_collect::CollectError),
    #[error("approval {0}")]
    Approval(String),
    #[error("remote operations are not configured")]
    NoRemote,
    /// Opaque string, not a `#[from]`, since the runtime crate that
    /// produces these errors depends on this one and not the reverse.
    #[error("{0}")]
    Runtime(String),
}
