//! Supervisor Process
//!
//! Spawns worker processes, hands them chunks over IPC and reassembles
//! their metric batches in chunk order.
//!
//! A chunk whose frames would not fit [`MAX_FRAME_SIZE`] is sent as several
//! row pieces under the same chunk index; the replies are concatenated
//! before the chunk is handed back.

use cellbench_ipc::{
    FrameError, FrameReader, FrameWriter, IPC_FD_ENV, MAX_FRAME_SIZE, MetricBatch,
    PROTOCOL_VERSION, RowBatch, SupervisorCommand, WORKER_FLAG, WorkerCapabilities, WorkerMessage,
};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::fs::File;
use std::io;
use std::ops::Range;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(#[from] io::Error),

    #[error("IPC error: {0}")]
    IpcError(String),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Worker protocol error: expected {expected}, got {got}")]
    ProtocolError { expected: String, got: String },

    #[error("Worker failed on chunk {chunk_index}: {message}")]
    WorkerFailed { chunk_index: u64, message: String },

    #[error("Chunk {chunk_index} returned {got} metric rows for {expected} input rows")]
    RowCountMismatch {
        chunk_index: u64,
        expected: usize,
        got: usize,
    },
}

impl From<FrameError> for SupervisorError {
    fn from(e: FrameError) -> Self {
        SupervisorError::IpcError(e.to_string())
    }
}

/// Descriptor numbers the worker finds its command and message pipes on
const WORKER_FDS: [RawFd; 2] = [3, 4];

/// Frame budget per piece; half the cap leaves room for archive headers
pub const DEFAULT_FRAME_BUDGET: usize = MAX_FRAME_SIZE / 2;

/// Upper bound on the archived bytes of one row, excluding its id.
/// The reply carries six f64 columns plus the id's 8-byte string header.
const ROW_FRAME_OVERHEAD: usize = 64;

/// How long a dropped worker may take to exit before it is killed
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn row_frame_cost(cell_id: &str) -> usize {
    ROW_FRAME_OVERHEAD + cell_id.len()
}

/// Split `batch` into consecutive row ranges whose request and reply frames
/// each stay within `budget` bytes. A single row over budget still gets its
/// own range; an empty batch yields one empty range.
fn frame_pieces(batch: &RowBatch, budget: usize) -> Vec<Range<usize>> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut used = 0;
    for (i, cell_id) in batch.cell_ids.iter().enumerate() {
        let cost = row_frame_cost(cell_id);
        if i > start && used + cost > budget {
            pieces.push(start..i);
            start = i;
            used = 0;
        }
        used += cost;
    }
    pieces.push(start..batch.len());
    pieces
}

/// Validate a worker's reply to the piece `chunk_index` of `expected` rows
fn check_reply(
    chunk_index: u64,
    expected: usize,
    msg: WorkerMessage,
) -> Result<MetricBatch, SupervisorError> {
    match msg {
        WorkerMessage::Computed {
            chunk_index: got_index,
            batch,
        } => {
            if got_index != chunk_index {
                return Err(SupervisorError::ProtocolError {
                    expected: format!("result for chunk {}", chunk_index),
                    got: format!("result for chunk {}", got_index),
                });
            }
            if batch.len() != expected {
                return Err(SupervisorError::RowCountMismatch {
                    chunk_index,
                    expected,
                    got: batch.len(),
                });
            }
            Ok(batch)
        }
        WorkerMessage::Failure { message, .. } => {
            Err(SupervisorError::WorkerFailed { chunk_index, message })
        }
        other => Err(SupervisorError::ProtocolError {
            expected: "Computed/Failure".to_string(),
            got: format!("{:?}", other),
        }),
    }
}

/// Anonymous pipe; both ends close-on-exec
struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    fn new() -> io::Result<Self> {
        let mut fds = [0 as RawFd; 2];
        // pipe2 sets close-on-exec atomically; workers are spawned from several threads at once
        #[cfg(target_os = "linux")]
        let ret = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) };
        #[cfg(not(target_os = "linux"))]
        let ret = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if ret != 0 {
            return Err(io::Error::last_os_error());
        }
        // Owned before anything else can fail, so both ends always get closed
        let (read, write) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
        set_cloexec(read.as_raw_fd())?;
        set_cloexec(write.as_raw_fd())?;
        Ok(Self { read, write })
    }
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFD);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn send_sigterm(pid: u32) -> io::Result<()> {
    if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Worker process handle
pub struct WorkerHandle {
    child: Child,
    reader: FrameReader<File>,
    /// Command pipe; `None` once closed
    writer: Option<FrameWriter<File>>,
    capabilities: WorkerCapabilities,
    frame_budget: usize,
}

impl WorkerHandle {
    /// Spawn `binary` in worker mode with fd 3/4 as its IPC channel and
    /// wait for its handshake.
    pub fn spawn(binary: &Path) -> Result<Self, SupervisorError> {
        // commands: supervisor → worker fd 3; messages: worker fd 4 → supervisor
        let commands = Pipe::new()?;
        let messages = Pipe::new()?;
        let child_ends = [commands.read.as_raw_fd(), messages.write.as_raw_fd()];

        let mut command = Command::new(binary);
        command
            .arg(WORKER_FLAG)
            .env(IPC_FD_ENV, format!("{},{}", WORKER_FDS[0], WORKER_FDS[1]))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        unsafe {
            command.pre_exec(move || {
                // Lift both ends clear of 3/4 first so one dup2 cannot clobber the other.
                // The lifted copies stay close-on-exec; the dup2 targets do not.
                let mut lifted = [0 as RawFd; 2];
                for (slot, fd) in lifted.iter_mut().zip(child_ends) {
                    *slot = libc::fcntl(fd, libc::F_DUPFD_CLOEXEC, 10);
                    if *slot < 0 {
                        return Err(io::Error::last_os_error());
                    }
                }
                for (fd, target) in lifted.into_iter().zip(WORKER_FDS) {
                    if libc::dup2(fd, target) < 0 {
                        return Err(io::Error::last_os_error());
                    }
                }
                Ok(())
            });
        }

        let mut child = command.spawn()?;

        // Drop our copies of the child's ends so its exit reads as end-of-stream
        drop(commands.read);
        drop(messages.write);

        let mut reader = FrameReader::new(File::from(messages.read));
        let capabilities = match Self::wait_for_hello(&mut reader) {
            Ok(caps) => caps,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        Ok(Self {
            child,
            reader,
            writer: Some(FrameWriter::new(File::from(commands.write))),
            capabilities,
            frame_budget: DEFAULT_FRAME_BUDGET,
        })
    }

    /// Cap the estimated size of each frame sent to or expected from this worker
    pub fn with_frame_budget(mut self, bytes: usize) -> Self {
        self.frame_budget = bytes.max(1);
        self
    }

    /// Wait for Hello message from worker and validate protocol version
    fn wait_for_hello(reader: &mut FrameReader<File>) -> Result<WorkerCapabilities, SupervisorError> {
        let msg: WorkerMessage = match reader.read() {
            Ok(msg) => msg,
            Err(FrameError::EndOfStream) => {
                return Err(SupervisorError::WorkerCrashed(
                    "Worker exited before handshake".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        match msg {
            WorkerMessage::Hello(caps) => {
                if caps.protocol_version != PROTOCOL_VERSION {
                    return Err(SupervisorError::ProtocolError {
                        expected: format!("protocol version {}", PROTOCOL_VERSION),
                        got: format!("protocol version {}", caps.protocol_version),
                    });
                }
                Ok(caps)
            }
            other => Err(SupervisorError::ProtocolError {
                expected: "Hello".to_string(),
                got: format!("{:?}", other),
            }),
        }
    }

    /// Get worker capabilities
    pub fn capabilities(&self) -> &WorkerCapabilities {
        &self.capabilities
    }

    /// Compute the metrics of one chunk on this worker
    pub fn compute(
        &mut self,
        chunk_index: u64,
        batch: RowBatch,
    ) -> Result<MetricBatch, SupervisorError> {
        let pieces = frame_pieces(&batch, self.frame_budget);
        if pieces.len() == 1 {
            return self.compute_piece(chunk_index, batch);
        }

        tracing::debug!(chunk_index, pieces = pieces.len(), "splitting chunk");
        let mut parts = Vec::with_capacity(pieces.len());
        for range in pieces {
            parts.push(self.compute_piece(chunk_index, batch.slice(range))?);
        }
        Ok(MetricBatch::concat(parts))
    }

    fn compute_piece(
        &mut self,
        chunk_index: u64,
        batch: RowBatch,
    ) -> Result<MetricBatch, SupervisorError> {
        let expected = batch.len();
        self.send(&SupervisorCommand::Compute { chunk_index, batch })?;
        let msg = self.read_message()?;
        check_reply(chunk_index, expected, msg)
    }

    fn send(&mut self, command: &SupervisorCommand) -> Result<(), SupervisorError> {
        match self.writer.as_mut() {
            Some(writer) => Ok(writer.write(command)?),
            None => Err(SupervisorError::IpcError(
                "Command pipe already closed".to_string(),
            )),
        }
    }

    fn read_message(&mut self) -> Result<WorkerMessage, SupervisorError> {
        match self.reader.read::<WorkerMessage>() {
            Ok(msg) => Ok(msg),
            Err(FrameError::EndOfStream) => Err(SupervisorError::WorkerCrashed(
                "Worker closed connection unexpectedly".to_string(),
            )),
            Err(e) => {
                if !self.is_alive() {
                    return Err(SupervisorError::WorkerCrashed(
                        "Worker crashed during read".to_string(),
                    ));
                }
                Err(SupervisorError::IpcError(e.to_string()))
            }
        }
    }

    /// Shutdown the worker gracefully
    pub fn shutdown(mut self) -> Result<(), SupervisorError> {
        self.send(&SupervisorCommand::Shutdown)?;
        self.writer = None;
        let _ = self.child.wait();
        Ok(())
    }

    /// Check if worker process is still running
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        // An idle worker exits as soon as its command pipe reads end-of-stream
        self.writer = None;
        if self.is_alive() {
            // SIGTERM stops a busy worker after its current piece
            let _ = send_sigterm(self.child.id());
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            while self.is_alive() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(1));
            }
            if self.is_alive() {
                let _ = self.child.kill();
            }
        }
        let _ = self.child.wait();
    }
}

/// Split indexed items round-robin across `shard_count` shards
fn shard_round_robin<T>(items: Vec<T>, shard_count: usize) -> Vec<Vec<(usize, T)>> {
    let shard_count = shard_count.max(1);
    let mut shards: Vec<Vec<(usize, T)>> = (0..shard_count).map(|_| Vec::new()).collect();
    for (index, item) in items.into_iter().enumerate() {
        shards[index % shard_count].push((index, item));
    }
    shards
}

/// Supervisor that manages the worker pool and distributes chunks
pub struct Supervisor {
    worker_binary: PathBuf,
    num_workers: usize,
    frame_budget: usize,
}

impl Supervisor {
    /// Create a new supervisor
    pub fn new(worker_binary: impl Into<PathBuf>, num_workers: usize) -> Self {
        Self {
            worker_binary: worker_binary.into(),
            num_workers: num_workers.max(1),
            frame_budget: DEFAULT_FRAME_BUDGET,
        }
    }

    /// Per-frame size budget handed to every worker (default
    /// [`DEFAULT_FRAME_BUDGET`])
    pub fn with_frame_budget(mut self, bytes: usize) -> Self {
        self.frame_budget = bytes.max(1);
        self
    }

    /// Number of worker processes at most spawned per run
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Compute every chunk in a worker process.
    ///
    /// Returns one metric batch per input chunk, in input order. The first
    /// failing chunk aborts the whole run.
    pub fn map_chunks(&self, chunks: Vec<RowBatch>) -> Result<Vec<MetricBatch>, SupervisorError> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }

        let total = chunks.len();
        let worker_count = self.num_workers.min(total);
        let shards = shard_round_robin(chunks, worker_count);

        let shard_results: Vec<Vec<(usize, MetricBatch)>> = if worker_count == 1 {
            shards
                .into_iter()
                .map(|shard| self.run_shard(shard))
                .collect::<Result<_, _>>()?
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(worker_count)
                .build()
                .map_err(|e| {
                    SupervisorError::IpcError(format!("Failed to build worker pool: {}", e))
                })?;

            pool.install(|| {
                shards
                    .into_par_iter()
                    .map(|shard| self.run_shard(shard))
                    .collect::<Result<_, _>>()
            })?
        };

        let mut indexed_results: Vec<(usize, MetricBatch)> =
            shard_results.into_iter().flatten().collect();
        indexed_results.sort_by_key(|(index, _)| *index);
        if indexed_results.len() != total {
            return Err(SupervisorError::IpcError(format!(
                "Internal error: expected {} results, got {}",
                total,
                indexed_results.len()
            )));
        }

        Ok(indexed_results
            .into_iter()
            .map(|(_, batch)| batch)
            .collect())
    }

    /// Run one shard of chunks on a single reused worker process
    fn run_shard(
        &self,
        shard: Vec<(usize, RowBatch)>,
    ) -> Result<Vec<(usize, MetricBatch)>, SupervisorError> {
        let mut results = Vec::with_capacity(shard.len());
        if shard.is_empty() {
            return Ok(results);
        }

        let mut worker =
            WorkerHandle::spawn(&self.worker_binary)?.with_frame_budget(self.frame_budget);
        tracing::debug!(
            pid = worker.capabilities().pid,
            chunks = shard.len(),
            "worker started"
        );

        for (index, batch) in shard {
            let metrics = worker.compute(index as u64, batch)?;
            results.push((index, metrics));
        }

        worker.shutdown()?;
        Ok(results)
    }
}
