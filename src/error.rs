//! Core error types
//!
//! None of these reach the player: passes that hit them are skipped for a
//! tick, spawns are declined, stragglers are abandoned.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the simulation core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A registry lock was not acquired within the allowed wait.
    #[error("registry `{registry}` lock not acquired within {timeout_ms} ms")]
    LockTimeout {
        /// Registry that was contended.
        registry: &'static str,
        /// How long we waited.
        timeout_ms: u64,
    },

    /// Per-kind population cap reached.
    #[error("{kind} population cap reached ({cap})")]
    PopulationCap {
        /// Entity kind.
        kind: &'static str,
        /// Configured cap.
        cap: usize,
    },

    /// Global population cap reached.
    #[error("global population cap reached ({cap})")]
    GlobalCap {
        /// Configured cap.
        cap: usize,
    },

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Some threads did not stop within the shutdown bound.
    #[error("{abandoned} thread(s) did not stop within {timeout:?}; abandoned")]
    ShutdownTimedOut {
        /// Number of threads left behind.
        abandoned: usize,
        /// The bound that was honored.
        timeout: Duration,
    },

    /// The OS refused to spawn a thread.
    #[error("failed to spawn thread `{name}`: {reason}")]
    ThreadSpawn {
        /// Thread name.
        name: String,
        /// OS error text.
        reason: String,
    },

    /// Advance jobs for a tick did not finish in time.
    #[error("{pending} advance job(s) still pending at tick deadline")]
    TickOverrun {
        /// Jobs that had not reported back.
        pending: usize,
    },

    /// The pool or session has already been shut down.
    #[error("not running")]
    NotRunning,

    /// A session is already live.
    #[error("already running")]
    AlreadyRunning,
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
