//! The Refresh Orchestrator: normalizes refresh targets, installs a trace,
//! commits a batch of refresh requests, and runs pre/post assertion checks
//! around the commit.

pub mod check;
pub mod orchestrator;

pub use check::{RefreshCheck, RowCountCheck};
pub use orchestrator::{refresh, RefreshOptions, RefreshReport, RefreshTarget, RefreshedPartition};
