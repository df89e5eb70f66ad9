//! FIFO job queue feeding the single conversion worker

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::job_store::{Job, JobStatus, JobStore};

/// Receiving half of the queue; exactly one exists per [`JobQueue`]
pub type JobReceiver = mpsc::UnboundedReceiver<Uuid>;

/// Poll response: every known job plus whether polling should stay fast
#[derive(Debug, Clone, Serialize)]
pub struct JobListing {
    pub jobs: Vec<Job>,
    pub has_active: bool,
}

/// Job queue for submitting conversions
#[derive(Clone)]
pub struct JobQueue {
    store: JobStore,
    sender: mpsc::UnboundedSender<Uuid>,
}

impl JobQueue {
    /// Create a queue and the receiver its worker consumes
    pub fn new() -> (Self, JobReceiver) {
        Self::with_store(JobStore::new())
    }

    pub fn with_store(store: JobStore) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { store, sender }, receiver)
    }

    /// Record a pending job and enqueue it. Never waits on processing.
    pub fn submit(
        &self,
        filename: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
    ) -> Uuid {
        let job = Job::new(filename, input_path, output_folder);
        let job_id = job.id;
        tracing::info!("Job added: {} (ID: {})", job.filename, job_id);
        self.store.insert(job);

        if let Err(e) = self.sender.send(job_id) {
            tracing::error!("Failed to enqueue job {}: {}", job_id, e);
            // The worker is gone; fail the job instead of leaving it pending
            let _ = self.store.update_status(job_id, JobStatus::Processing, None);
            let _ = self.store.update_status(
                job_id,
                JobStatus::Failed,
                Some("conversion worker is not running".to_string()),
            );
        }

        job_id
    }

    pub fn get(&self, job_id: Uuid) -> Option<Job> {
        self.store.get(job_id)
    }

    pub fn list_jobs(&self) -> JobListing {
        let jobs = self.store.snapshot();
        let has_active = jobs.iter().any(|job| job.status.is_active());
        JobListing { jobs, has_active }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }
}
