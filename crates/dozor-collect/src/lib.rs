//! Container, log, network, certificate, and cleanup collectors (§4.2).
//!
//! The only path implemented is the CLI fallback; the preferred
//! native-runtime-API path (event-driven 30 s TTL container cache) is left
//! as an extension point rather than built against a specific runtime's
//! client library.

#![forbid(unsafe_code)]

pub mod certs;
pub mod cleanup;
pub mod discovery;
pub mod error;
pub mod logs;
pub mod metrics;
pub mod network;
pub mod probe;
pub mod systemd;
pub mod updates;

pub use certs::{CertFinding, CertStatus};
pub use cleanup::{CleanupFinding, CleanupOutcome, CleanupScanner};
pub use discovery::ContainerDiscovery;
pub use error::CollectError;
pub use logs::LogCollector;
pub use metrics::{HostMetrics, disks_above_threshold};
pub use network::{ConnectionThresholds, ConnectionsSummary, PortFinding};
pub use probe::{ProbeResult, probe_urls};
pub use systemd::{SystemdCollector, UnitStatus};
pub use updates::{TrackedBinary, UpdateChecker, UpdateCheckResult};
