//! Job execution with stage tracking and result retention

mod job_queue;
mod result_store;
mod state;
mod worker;

pub use job_queue::{IngestJob, JobObserver, JobQueue, JobSource, QueueStats, INLINE_JOB_PREFIX};
pub use result_store::{InMemoryResultStore, ResultStore};
pub use state::{JobStage, JobState, TransitionError};
pub use worker::{IngestRunner, IngestWorker};
