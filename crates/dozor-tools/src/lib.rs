//! Tool registry and the canonical server_* tool set (§4.6, §6).

#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod registry;
pub mod tools;

pub use context::{ApprovalOutcome, ApprovalSink, DeployManager, DevModeController, ToolContext};
pub use error::ToolError;
pub use registry::{Tool, ToolRegistry};
