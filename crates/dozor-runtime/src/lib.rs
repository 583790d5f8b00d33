//! Message bus, approvals, session, background deploy, and watch/dev-mode —
//! the supporting primitives behind the tool-context trait seams (§4.9).

#![forbid(unsafe_code)]

mod approvals;
mod bus;
mod dev_mode;
mod deploy;
mod error;
mod session;
mod traits;
mod watch;

pub use approvals::Approvals;
pub use bus::MessageBus;
pub use dev_mode::DevMode;
pub use deploy::BackgroundDeploy;
pub use error::RuntimeError;
pub use session::{Session, SessionEvent};
pub use traits::{RuntimeApprovalSink, RuntimeDeployManager, RuntimeDevModeController};
pub use watch::{Watch, WatchAction, WatchOutcome};
