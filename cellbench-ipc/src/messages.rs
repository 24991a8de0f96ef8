//! IPC Message Types
//!
//! Supervisor and worker exchange one command and one reply per chunk
//! piece. A chunk too large for one frame goes out as several consecutive
//! `Compute` commands sharing its index.
//! All messages are serialized with rkyv.

use crate::batch::{MetricBatch, RowBatch};
use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Process id of the worker
    pub pid: u32,
    /// Number of logical CPUs visible to the worker
    pub cpu_count: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            pid: std::process::id(),
            cpu_count: num_cpus(),
        }
    }
}

/// Commands sent from Supervisor to Worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Compute metrics for one chunk
    Compute {
        /// Position of the chunk in the input file
        chunk_index: u64,
        /// Input rows
        batch: RowBatch,
    },

    /// Request graceful shutdown
    Shutdown,
}

/// Messages sent from Worker to Supervisor
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Initial handshake with worker capabilities
    Hello(WorkerCapabilities),

    /// Metrics for a chunk
    Computed {
        /// Echo of the command's chunk index
        chunk_index: u64,
        /// Derived metric rows
        batch: MetricBatch,
    },

    /// Computing a chunk failed
    Failure {
        /// Chunk being processed, if any
        chunk_index: Option<u64>,
        /// Error category
        kind: FailureKind,
        /// Human-readable error message
        message: String,
    },
}

/// Categories of worker failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// Rust panic (caught)
    Panic,
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|p| p.get() as u32)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_capabilities_default() {
        let caps = WorkerCapabilities::default();
        assert_eq!(caps.protocol_version, crate::PROTOCOL_VERSION);
        assert_eq!(caps.pid, std::process::id());
        assert!(caps.cpu_count >= 1);
    }
}
