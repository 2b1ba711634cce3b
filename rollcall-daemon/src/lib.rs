//! Rollcall daemon runtime: gateway + sync processor + timer + liveness HTTP.

pub mod config;
pub mod context;
pub mod discord;
mod error;
pub mod liveness;
mod runtime;

pub use config::{ConfigError, DaemonConfig};
pub use context::SyncContext;
pub use error::{error_chain, DaemonError};
pub use runtime::{
    init_tracing, run, run_once, start_blocking, PassHistory, PassSummary, Trigger,
};
