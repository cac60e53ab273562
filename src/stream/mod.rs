//! Streaming transform engine.
//!
//! # Coordinator
//! [`Coordinator`] owns one input and one output handle.  It takes the input
//! length up front (seek to end, seek back), then loops: read up to
//! [`BLOCK_SIZE`] bytes, transform them in place, write them in full, and
//! only then advance the shared byte counter.  End of input ends the loop;
//! the output is flushed once at the end.
//!
//! Any I/O error is fatal.  There is no framing in the output, so a dropped
//! or short block cannot be repaired; the first error is returned and the
//! loop stops.  The output is left as far as it got.
//!
//! # Background runs
//! [`Coordinator::spawn`] moves the coordinator onto a worker thread and
//! returns a [`RunHandle`].  Observers on any thread poll the handle for a
//! `(current, total)` snapshot; polling is a single atomic load and never
//! blocks the worker.  [`RunHandle::wait_with`] combines the polling timer
//! and the completion signal into one `recv_timeout` loop.
//!
//! # Inline runs
//! [`Coordinator::run_with`] runs on the calling thread and invokes a
//! callback after every block.  Same loop, no thread; handy for tests and
//! for embedding in an existing event loop.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::progress::{CancelToken, Progress, ProgressHandle, TransferState};
use crate::transform::{transform_block, Mode, BLOCK_SIZE};

/// Name given to background worker threads.
pub const WORKER_THREAD_NAME: &str = "de-nis-worker";

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Input size unavailable: {0}")]
    SizeUnavailable(#[source] io::Error),
    #[error("Read failed at offset {offset}: {source}")]
    ReadFailed {
        offset: u64,
        #[source]
        source: io::Error,
    },
    #[error("Write failed at offset {offset}: {source}")]
    WriteFailed {
        offset: u64,
        #[source]
        source: io::Error,
    },
    #[error("Cancelled after {processed} bytes; output is incomplete")]
    Cancelled { processed: u64 },
    #[error("Couldn't start worker thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("Worker thread panicked")]
    WorkerPanicked,
}

// ── Coordinator ──────────────────────────────────────────────────────────────

pub struct Coordinator<R, W> {
    input:  R,
    output: W,
    mode:   Mode,
    state:  Arc<TransferState>,
    cancel: CancelToken,
}

impl<R: Read + Seek, W: Write> Coordinator<R, W> {
    /// Take ownership of both handles and record the input length.
    ///
    /// The input is rewound to offset 0 regardless of where it was.
    pub fn new(mut input: R, output: W, mode: Mode) -> Result<Self, StreamError> {
        let total = measure(&mut input)?;
        Ok(Self::with_total(input, output, mode, total))
    }
}

impl<R, W> Coordinator<R, W> {
    /// Build from an input whose length was already taken with [`measure`]
    /// and which is positioned at offset 0.
    pub(crate) fn with_total(input: R, output: W, mode: Mode, total: u64) -> Self {
        Self {
            input,
            output,
            mode,
            state:  Arc::new(TransferState::new(total)),
            cancel: CancelToken::new(),
        }
    }

    /// Hand both handles back to the caller.
    pub fn into_inner(self) -> (R, W) {
        (self.input, self.output)
    }
}

impl<R: Read, W: Write> Coordinator<R, W> {
    /// Replace the cancel token, e.g. with one shared across several runs.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn progress(&self) -> ProgressHandle {
        ProgressHandle::new(Arc::clone(&self.state))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Run to end of input.  Returns the number of bytes written.
    pub fn run(&mut self) -> Result<u64, StreamError> {
        self.run_with(|_| {})
    }

    /// Run to end of input, calling `on_block` with a fresh snapshot after
    /// every block has been written.
    pub fn run_with<F: FnMut(Progress)>(&mut self, mut on_block: F) -> Result<u64, StreamError> {
        debug!(mode = %self.mode, total = self.state.total(), "transform started");
        let result = self.pump(&mut on_block);
        match &result {
            Ok(bytes) => debug!(bytes, "transform finished"),
            Err(e)    => warn!(error = %e, "transform aborted"),
        }
        result
    }

    fn pump(&mut self, on_block: &mut dyn FnMut(Progress)) -> Result<u64, StreamError> {
        let mut block  = [0u8; BLOCK_SIZE];
        let mut offset = self.state.snapshot().current;

        loop {
            if self.cancel.is_cancelled() {
                return Err(StreamError::Cancelled { processed: offset });
            }

            let len = read_block(&mut self.input, &mut block)
                .map_err(|source| StreamError::ReadFailed { offset, source })?;
            if len == 0 {
                break;
            }

            transform_block(&mut block[..len], self.mode);

            self.output
                .write_all(&block[..len])
                .map_err(|source| StreamError::WriteFailed { offset, source })?;

            // Only count bytes once the writer has accepted all of them.
            offset = self.state.advance(len as u64);
            on_block(self.state.snapshot());
        }

        self.output
            .flush()
            .map_err(|source| StreamError::WriteFailed { offset, source })?;
        Ok(offset)
    }
}

impl<R, W> Coordinator<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Move the coordinator onto a worker thread and start it.
    pub fn spawn(mut self) -> Result<RunHandle<R, W>, StreamError> {
        let progress = self.progress();
        let cancel   = self.cancel_token();
        let (tx, rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let result = self.run();
                // The receiver may already be gone if the handle was dropped.
                let _ = tx.send((result, self));
            })
            .map_err(StreamError::Spawn)?;

        Ok(RunHandle { progress, cancel, done: rx, worker: Some(worker) })
    }
}

// ── RunHandle ────────────────────────────────────────────────────────────────

/// Result of a successful run: the byte count and both handles.
#[derive(Debug)]
pub struct Completed<R, W> {
    pub bytes:  u64,
    pub input:  R,
    pub output: W,
}

type Outcome<R, W> = (Result<u64, StreamError>, Coordinator<R, W>);

/// Handle to a coordinator running on a worker thread.
pub struct RunHandle<R, W> {
    progress: ProgressHandle,
    cancel:   CancelToken,
    done:     Receiver<Outcome<R, W>>,
    worker:   Option<JoinHandle<()>>,
}

impl<R, W> RunHandle<R, W> {
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn poll(&self) -> Progress {
        self.progress.poll()
    }

    /// Ask the worker to stop before its next block.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().map_or(true, |w| w.is_finished())
    }

    /// Block until the worker finishes.
    pub fn wait(mut self) -> Result<Completed<R, W>, StreamError> {
        match self.done.recv() {
            Ok(outcome) => self.finish(outcome),
            Err(_)      => Err(self.reap()),
        }
    }

    /// Block until the worker finishes, calling `observer` every `interval`
    /// and once more with the final snapshot on success.
    pub fn wait_with<F: FnMut(Progress)>(
        mut self,
        interval:     Duration,
        mut observer: F,
    ) -> Result<Completed<R, W>, StreamError> {
        loop {
            match self.done.recv_timeout(interval) {
                Ok(outcome) => {
                    let completed = self.finish(outcome)?;
                    observer(self.progress.poll());
                    return Ok(completed);
                }
                Err(RecvTimeoutError::Timeout)      => observer(self.progress.poll()),
                Err(RecvTimeoutError::Disconnected) => return Err(self.reap()),
            }
        }
    }

    fn finish(&mut self, (result, coordinator): Outcome<R, W>) -> Result<Completed<R, W>, StreamError> {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        // On error the coordinator is dropped here, closing both handles.
        let bytes = result?;
        let (input, output) = coordinator.into_inner();
        Ok(Completed { bytes, input, output })
    }

    /// The sender vanished without a result: the worker panicked.
    fn reap(&mut self) -> StreamError {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        warn!("transform worker exited without a result");
        StreamError::WorkerPanicked
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Input length, taken by seeking to the end.  Leaves the stream at offset 0.
pub fn measure<S: Seek>(stream: &mut S) -> Result<u64, StreamError> {
    stream_len(stream).map_err(StreamError::SizeUnavailable)
}

fn stream_len<S: Seek>(stream: &mut S) -> io::Result<u64> {
    let len = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(0))?;
    Ok(len)
}

/// Fill `buf` as far as the reader allows.  Returns 0 only at end of input.
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0)  => break,
            Ok(n)  => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
