//! HTTP gateway (`/mcp`, `/health`, `/webhook`) and CLI subcommand handlers
//! tying the agent loop and runtime primitives together (§6).

#![forbid(unsafe_code)]

pub mod cli;
pub mod mcp;
pub mod routes;
pub mod state;

pub use mcp::{McpRequest, McpResponse};
pub use routes::router;
pub use state::GatewayState;
