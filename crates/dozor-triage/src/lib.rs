//! Log analyzer, composite triage renderer, and flap detection (§4.2.3, §4.3).

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod catalog;
pub mod flap;
pub mod triage;

pub use analyzer::analyze;
pub use flap::FlapDetector;
pub use triage::{TriageOptions, build_report, render};
