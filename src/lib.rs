pub mod transform;
pub mod progress;
pub mod stream;
pub mod naming;
pub mod report;
pub mod job;

pub use transform::{Mode, BLOCK_SIZE, encode_byte, decode_byte, transform_block};
pub use progress::{Progress, ProgressHandle, CancelToken};
pub use stream::{Coordinator, RunHandle, StreamError};
pub use job::{JobOptions, Overwrite, TransformJob, JobError};
pub use report::RunReport;
