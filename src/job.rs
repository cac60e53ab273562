//! High-level [`TransformJob`] API — file in, file out.
//!
//! ```no_run
//! use denis::job::{JobOptions, TransformJob};
//! use denis::transform::Mode;
//!
//! let opts = JobOptions { mode: Mode::Decode, ..JobOptions::default() };
//! let job = TransformJob::open("SAVE.D5P", "SAVE.D5P.dec", opts)?;
//! let report = job.run(|p| eprint!("\r{p}"))?;
//! assert_eq!(report.bytes, std::fs::metadata("SAVE.D5P")?.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::progress::{CancelToken, Progress, ProgressHandle, DEFAULT_POLL_INTERVAL};
use crate::report::RunReport;
use crate::stream::{measure, Coordinator, StreamError};
use crate::transform::Mode;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Can't open input file {path} (does it exist?): {source}")]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Can't create output file {path} (no permission?): {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Output file {0} already exists")]
    OutputExists(PathBuf),
    #[error("Output file {0} is the input file")]
    SameFile(PathBuf),
    #[error(transparent)]
    Stream(#[from] StreamError),
}

// ── JobOptions ────────────────────────────────────────────────────────────────

/// What to do when the output path already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Fail with [`JobError::OutputExists`].
    Never,
    /// Truncate the existing file.  Only after the user agreed.
    Allow,
}

/// Configuration for [`TransformJob::open`].
#[derive(Debug, Clone)]
pub struct JobOptions {
    pub mode:              Mode,
    pub overwrite:         Overwrite,
    /// Observer cadence used by [`TransformJob::run`].
    pub poll_interval:     Duration,
    /// Delete the output if the run fails or is cancelled.
    pub remove_incomplete: bool,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            mode:              Mode::Decode,
            overwrite:         Overwrite::Never,
            poll_interval:     DEFAULT_POLL_INTERVAL,
            remove_incomplete: false,
        }
    }
}

// ── TransformJob ──────────────────────────────────────────────────────────────

type FileCoordinator = Coordinator<BufReader<File>, File>;

pub struct TransformJob {
    input_path:  PathBuf,
    output_path: PathBuf,
    options:     JobOptions,
    coordinator: FileCoordinator,
}

impl TransformJob {
    /// Open `input`, create `output` and get ready to run.
    pub fn open<P: AsRef<Path>, Q: AsRef<Path>>(
        input:   P,
        output:  Q,
        options: JobOptions,
    ) -> Result<Self, JobError> {
        let input_path  = input.as_ref().to_path_buf();
        let output_path = output.as_ref().to_path_buf();

        let input_file = File::open(&input_path).map_err(|source| JobError::OpenInput {
            path: input_path.clone(),
            source,
        })?;

        if same_file(&input_path, &output_path) {
            return Err(JobError::SameFile(output_path));
        }

        // Size the input before touching the output, so a failure here
        // leaves nothing behind.
        let mut reader = BufReader::new(input_file);
        let total      = measure(&mut reader)?;

        let output_file = create_output(&output_path, options.overwrite)?;
        debug!(
            input  = %input_path.display(),
            output = %output_path.display(),
            mode   = %options.mode,
            total,
            "job opened"
        );

        // The output stays unbuffered: progress only counts blocks the file
        // has taken.
        let coordinator = Coordinator::with_total(reader, output_file, options.mode, total);

        Ok(Self { input_path, output_path, options, coordinator })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn mode(&self) -> Mode {
        self.options.mode
    }

    pub fn progress(&self) -> ProgressHandle {
        self.coordinator.progress()
    }

    /// Token that stops the run before its next block.
    pub fn cancel_token(&self) -> CancelToken {
        self.coordinator.cancel_token()
    }

    /// Run on a worker thread, calling `observer` every `poll_interval`
    /// until the worker signals completion.  Both files are closed when this
    /// returns.
    pub fn run<F: FnMut(Progress)>(self, observer: F) -> Result<RunReport, JobError> {
        let started_at = Utc::now();
        let clock      = Instant::now();

        let outcome = self
            .coordinator
            .spawn()
            .and_then(|handle| handle.wait_with(self.options.poll_interval, observer));

        match outcome {
            Ok(done) => Ok(RunReport {
                input:      self.input_path,
                output:     self.output_path,
                mode:       self.options.mode,
                bytes:      done.bytes,
                started_at,
                elapsed_ms: clock.elapsed().as_millis() as u64,
            }),
            Err(e) => {
                if self.options.remove_incomplete {
                    discard_output(&self.output_path);
                }
                Err(e.into())
            }
        }
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn create_output(path: &Path, overwrite: Overwrite) -> Result<File, JobError> {
    let mut opts = OpenOptions::new();
    opts.write(true);
    match overwrite {
        Overwrite::Never => opts.create_new(true),
        Overwrite::Allow => opts.create(true).truncate(true),
    };
    opts.open(path).map_err(|source| match source.kind() {
        io::ErrorKind::AlreadyExists => JobError::OutputExists(path.to_path_buf()),
        _ => JobError::CreateOutput { path: path.to_path_buf(), source },
    })
}

/// True when both paths exist and resolve to the same file.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _              => false,
    }
}

fn discard_output(path: &Path) {
    match fs::remove_file(path) {
        Ok(())  => debug!(output = %path.display(), "removed incomplete output"),
        Err(e)  => warn!(output = %path.display(), error = %e, "couldn't remove incomplete output"),
    }
}
