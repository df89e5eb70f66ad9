//! Background conversion pipeline: job table, FIFO queue, worker and janitor

mod janitor;
mod job_queue;
mod job_store;
mod worker;

pub use janitor::Janitor;
pub use job_queue::{JobListing, JobQueue, JobReceiver};
pub use job_store::{Job, JobStatus, JobStore};
pub use worker::ConversionWorker;
