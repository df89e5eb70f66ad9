//! Background worker for processing conversion jobs

use std::sync::Arc;
use uuid::Uuid;

use crate::converter::Converter;
use crate::error::{Error, Result};

use super::job_queue::JobReceiver;
use super::job_store::{Job, JobStatus, JobStore};

/// Runs conversions one at a time, in submission order
pub struct ConversionWorker {
    store: JobStore,
    converter: Arc<dyn Converter>,
    ply_extension: String,
}

impl ConversionWorker {
    /// Create a new conversion worker
    pub fn new(store: JobStore, converter: Arc<dyn Converter>, ply_extension: impl Into<String>) -> Self {
        Self {
            store,
            converter,
            ply_extension: ply_extension.into(),
        }
    }

    /// Start processing jobs from the queue; returns once every sender is gone
    pub async fn run(self, mut receiver: JobReceiver) {
        tracing::info!("Conversion worker started ({})", self.converter.name());

        while let Some(job_id) = receiver.recv().await {
            self.process(job_id).await;
        }

        tracing::info!("Conversion worker stopped");
    }

    /// Drive one job from pending to a terminal status
    pub async fn process(&self, job_id: Uuid) {
        let Some(job) = self.store.get(job_id) else {
            tracing::debug!("Skipping unknown job {}", job_id);
            return;
        };

        if let Err(e) = self.store.update_status(job_id, JobStatus::Processing, None) {
            tracing::warn!("Not processing job {}: {}", job_id, e);
            return;
        }
        tracing::info!("Processing job {}: {}", job_id, job.filename);

        let (status, error) = match self.convert(&job).await {
            Ok(()) => {
                tracing::info!("Job {} completed successfully", job_id);
                (JobStatus::Completed, None)
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                (JobStatus::Failed, Some(e.job_message()))
            }
        };

        if let Err(e) = self.store.update_status(job_id, status, error) {
            tracing::error!("Failed to record outcome of job {}: {}", job_id, e);
        }
    }

    async fn convert(&self, job: &Job) -> Result<()> {
        self.converter
            .convert(&job.input_path, &job.output_folder)
            .await?;

        let expected = job.expected_output(&self.ply_extension);
        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            Ok(())
        } else {
            Err(Error::MissingOutput(expected))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::JobQueue;
    use async_trait::async_trait;
    use std::path::Path;

    /// Writes `<stem>.ply` when `write_output` is set
    struct FakeConverter {
        write_output: bool,
        failure: Option<String>,
    }

    #[async_trait]
    impl Converter for FakeConverter {
        async fn convert(&self, input_path: &Path, output_folder: &Path) -> Result<()> {
            if let Some(stderr) = &self.failure {
                return Err(Error::external_tool("exit status: 1", stderr.clone()));
            }
            if self.write_output {
                let stem = input_path.file_stem().unwrap().to_string_lossy();
                std::fs::write(output_folder.join(format!("{}.ply", stem)), b"ply\n")?;
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn worker(store: &JobStore, converter: FakeConverter) -> ConversionWorker {
        ConversionWorker::new(store.clone(), Arc::new(converter), "ply")
    }

    #[tokio::test]
    async fn test_completed_when_model_written() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _rx) = JobQueue::new();
        let id = queue.submit("cat.png", dir.path().join("cat.png"), dir.path());

        let w = worker(queue.store(), FakeConverter { write_output: true, failure: None });
        w.process(id).await;

        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_failed_when_model_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _rx) = JobQueue::new();
        let id = queue.submit("cat.png", dir.path().join("cat.png"), dir.path());

        let w = worker(queue.store(), FakeConverter { write_output: false, failure: None });
        w.process(id).await;

        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some(crate::error::MISSING_OUTPUT_MESSAGE)
        );
    }

    #[tokio::test]
    async fn test_failed_with_tool_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _rx) = JobQueue::new();
        let id = queue.submit("cat.png", dir.path().join("cat.png"), dir.path());

        let w = worker(
            queue.store(),
            FakeConverter { write_output: true, failure: Some("model error".to_string()) },
        );
        w.process(id).await;

        let job = queue.get(id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("model error"));
    }

    #[tokio::test]
    async fn test_unknown_and_finished_jobs_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (queue, _rx) = JobQueue::new();
        let w = worker(queue.store(), FakeConverter { write_output: true, failure: None });

        w.process(Uuid::new_v4()).await;
        assert!(queue.store().is_empty());

        let id = queue.submit("cat.png", dir.path().join("cat.png"), dir.path());
        w.process(id).await;
        // A duplicate delivery must not regress the finished job
        w.process(id).await;
        assert_eq!(queue.get(id).unwrap().status, JobStatus::Completed);
    }
}
