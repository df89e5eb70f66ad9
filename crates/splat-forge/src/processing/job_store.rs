//! Lock-guarded table of conversion jobs

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and failed jobs never change again
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// pending -> processing -> {completed | failed}
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

/// A single image-to-model conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// Original upload name, used to derive the model file name
    pub filename: String,
    pub input_path: PathBuf,
    pub output_folder: PathBuf,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(
        filename: impl Into<String>,
        input_path: impl Into<PathBuf>,
        output_folder: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Pending,
            filename: filename.into(),
            input_path: input_path.into(),
            output_folder: output_folder.into(),
            created_at: Utc::now(),
            error: None,
        }
    }

    /// Path the tool is expected to write: `<output>/<stem(filename)>.<ext>`
    pub fn expected_output(&self, extension: &str) -> PathBuf {
        let stem = Path::new(&self.filename)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.filename.clone());
        self.output_folder.join(format!("{}.{}", stem, extension))
    }
}

/// Shared job table.
///
/// Every operation takes the lock for its own duration only; callers get
/// clones, never references into the map.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<Mutex<HashMap<Uuid, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Move a job forward in its lifecycle, recording an error message.
    ///
    /// Regressions and skipped steps are rejected and leave the job untouched.
    pub fn update_status(&self, id: Uuid, status: JobStatus, error: Option<String>) -> Result<()> {
        let mut jobs = self.jobs.lock();
        let job = jobs.get_mut(&id).ok_or(Error::JobNotFound(id))?;

        if !job.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                id,
                from: job.status,
                to: status,
            });
        }

        job.status = status;
        job.error = error;
        Ok(())
    }

    /// All jobs, newest first
    pub fn snapshot(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.lock().values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// True when any job is pending or processing
    pub fn has_active(&self) -> bool {
        self.jobs.lock().values().any(|job| job.status.is_active())
    }

    /// Remove terminal jobs created before `cutoff`; returns how many went
    pub fn prune_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.lock();
        let before = jobs.len();
        jobs.retain(|_, job| !(job.status.is_terminal() && job.created_at < cutoff));
        before - jobs.len()
    }
}
