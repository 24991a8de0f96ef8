//! Worker Process Entry Point
//!
//! Handles the worker side of the process-parallel strategy: receive a chunk,
//! compute its metrics, send them back, repeat until told to stop.
//!
//! On Unix, uses the fd pair named by `CELLBENCH_IPC_FD` and installs a
//! SIGTERM handler for graceful shutdown. Elsewhere, or when the variable is
//! absent, falls back to stdin/stdout.

use crate::compute::compute_row_metrics;
use cellbench_ipc::{
    FailureKind, FrameError, FrameReader, FrameWriter, IPC_FD_ENV, SupervisorCommand,
    WorkerCapabilities, WorkerMessage,
};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(unix)]
use std::os::unix::io::FromRawFd;

/// Set by the SIGTERM handler.
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Check if a graceful shutdown has been requested via SIGTERM.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::Relaxed)
}

#[cfg(unix)]
fn install_sigterm_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigterm_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        libc::sigaction(libc::SIGTERM, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigterm_handler(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigterm_handler() {}

/// Parse a `<read_fd>,<write_fd>` pair
fn parse_fd_pair(value: &str) -> Option<(i32, i32)> {
    let (r, w) = value.split_once(',')?;
    Some((r.trim().parse().ok()?, w.trim().parse().ok()?))
}

/// Worker main loop
pub struct WorkerMain {
    reader: FrameReader<Box<dyn Read>>,
    writer: FrameWriter<Box<dyn Write>>,
}

impl WorkerMain {
    /// Create a worker on the inherited fd pair, or on stdin/stdout.
    pub fn new() -> Self {
        #[cfg(unix)]
        if let Ok(value) = std::env::var(IPC_FD_ENV) {
            match parse_fd_pair(&value) {
                Some((read_fd, write_fd)) => {
                    // The supervisor hands these descriptors to this process only.
                    let read_file = unsafe { std::fs::File::from_raw_fd(read_fd) };
                    let write_file = unsafe { std::fs::File::from_raw_fd(write_fd) };
                    return Self::with_transport(Box::new(read_file), Box::new(write_file));
                }
                None => eprintln!(
                    "cellbench: warning: invalid {IPC_FD_ENV}={value:?} (expected <read_fd>,<write_fd>), falling back to stdio"
                ),
            }
        }
        Self::with_transport(Box::new(std::io::stdin()), Box::new(std::io::stdout()))
    }

    /// Create a worker over arbitrary streams
    pub fn with_transport(reader: Box<dyn Read>, writer: Box<dyn Write>) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    /// Run until `Shutdown`, SIGTERM, or the supervisor closing the pipe.
    pub fn run(&mut self) -> Result<(), FrameError> {
        install_sigterm_handler();

        self.writer
            .write(&WorkerMessage::Hello(WorkerCapabilities::default()))?;

        while !shutdown_requested() {
            let command: SupervisorCommand = match self.reader.read() {
                Ok(command) => command,
                Err(FrameError::EndOfStream) => break,
                Err(e) => return Err(e),
            };

            match command {
                SupervisorCommand::Compute { chunk_index, batch } => {
                    let reply = Self::compute(chunk_index, &batch);
                    self.writer.write(&reply)?;
                }
                SupervisorCommand::Shutdown => break,
            }
        }

        Ok(())
    }

    fn compute(chunk_index: u64, batch: &cellbench_ipc::RowBatch) -> WorkerMessage {
        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| compute_row_metrics(batch)));

        match result {
            Ok(batch) => WorkerMessage::Computed { chunk_index, batch },
            Err(panic) => {
                let message = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                WorkerMessage::Failure {
                    chunk_index: Some(chunk_index),
                    kind: FailureKind::Panic,
                    message,
                }
            }
        }
    }
}

impl Default for WorkerMain {
    fn default() -> Self {
        Self::new()
    }
}
