//! Error taxonomy for the core, per spec section 7.
//!
//! Unsafe: no

use thiserror::Error;

/// Fatal errors that can cross the core's public boundary.
///
/// Recoverable conditions (missing data, empty cross-sections, MathKernel
/// non-finite results) never produce an [`Error`]: they are absorbed locally,
/// as described in spec section 7.
#[derive(Debug, Error)]
pub enum Error {
    /// A flux vector's length did not match the group structure fixed at
    /// data-load time.
    #[error("flux group structure mismatch: expected {expected} groups, found {found}")]
    GroupMismatch {
        /// `ngroups` fixed at data-load time.
        expected: usize,
        /// Length of the offending flux vector.
        found: usize,
    },

    /// Preprocessing found a schedule graph that is not a DAG.
    #[error("schedule hierarchy contains a cycle reachable from node {node_id}")]
    ScheduleCycle {
        /// Arena index of the node at which the cycle was detected.
        node_id: usize,
    },

    /// A persisted dump record failed its size checks on read-back.
    #[error("corrupt dump record #{index}: {reason}")]
    CorruptDump {
        /// Zero-based index of the offending record in the dump file.
        index: usize,
        /// Human-readable description of the mismatch.
        reason: &'static str,
    },

    /// I/O failure while reading or writing a dump file.
    #[cfg(feature = "std")]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A [`crate::config::Config`] violated its own invariants.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the violated invariant.
        reason: &'static str,
    },
}
