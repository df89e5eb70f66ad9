//! Application service: configuration, the job pipeline and model export

use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::SplatForgeConfig;
use crate::converter::{Converter, SharpConverter};
use crate::error::{Error, Result};
use crate::export::encode_ply_file;
use crate::gallery::{self, ModelEntry};
use crate::processing::{ConversionWorker, Janitor, Job, JobListing, JobQueue};

/// Shared service handle
#[derive(Clone)]
pub struct SplatService {
    inner: Arc<SplatServiceInner>,
}

struct SplatServiceInner {
    /// Configuration, read once at startup
    config: SplatForgeConfig,
    /// Job queue (owns the job table)
    job_queue: JobQueue,
}

impl SplatService {
    /// Start with the configured command-line converter.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn start(config: SplatForgeConfig) -> Result<Self> {
        let converter = Arc::new(SharpConverter::new(config.converter.clone()));
        Self::start_with_converter(config, converter)
    }

    /// Start with any converter; spawns the single worker and the janitor
    pub fn start_with_converter(config: SplatForgeConfig, converter: Arc<dyn Converter>) -> Result<Self> {
        config.ensure_directories()?;
        tracing::info!("Input folder: {}", config.storage.input_folder.display());
        tracing::info!("Output folder: {}", config.storage.output_folder.display());

        let (job_queue, receiver) = JobQueue::new();

        let worker = ConversionWorker::new(
            job_queue.store().clone(),
            converter,
            config.converter.ply_extension.clone(),
        );
        tokio::spawn(async move {
            worker.run(receiver).await;
        });

        let janitor = Janitor::new(
            job_queue.store().clone(),
            config.janitor.interval(),
            config.janitor.retention(),
        );
        tokio::spawn(janitor.run());

        Ok(Self {
            inner: Arc::new(SplatServiceInner { config, job_queue }),
        })
    }

    pub fn config(&self) -> &SplatForgeConfig {
        &self.inner.config
    }

    pub fn job_queue(&self) -> &JobQueue {
        &self.inner.job_queue
    }

    /// Queue an image that already sits at `input_path`
    pub fn submit(&self, filename: impl Into<String>, input_path: impl Into<PathBuf>) -> Uuid {
        self.inner.job_queue.submit(
            filename,
            input_path,
            self.inner.config.storage.output_folder.clone(),
        )
    }

    pub fn job(&self, job_id: Uuid) -> Result<Job> {
        self.inner
            .job_queue
            .get(job_id)
            .ok_or(Error::JobNotFound(job_id))
    }

    pub fn list_jobs(&self) -> JobListing {
        self.inner.job_queue.list_jobs()
    }

    /// Path of a model in the output folder.
    ///
    /// Ids are bare file stems; anything that could escape the folder is rejected.
    pub fn model_path(&self, model_id: &str) -> Result<PathBuf> {
        if !gallery::is_plain_id(model_id) {
            return Err(Error::ModelNotFound(model_id.to_string()));
        }

        let path = self.inner.config.storage.output_folder.join(format!(
            "{}.{}",
            model_id, self.inner.config.converter.ply_extension
        ));
        if path.is_file() {
            Ok(path)
        } else {
            Err(Error::ModelNotFound(model_id.to_string()))
        }
    }

    /// Encode a finished model; recomputed on every call
    pub async fn export_model(&self, model_id: &str) -> Result<Vec<u8>> {
        let path = self.model_path(model_id)?;
        tracing::info!("Exporting {}", model_id);

        tokio::task::spawn_blocking(move || encode_ply_file(path))
            .await
            .map_err(|e| Error::internal(format!("Export task failed: {}", e)))?
    }

    /// Finished models, newest first
    pub fn list_models(&self) -> Result<Vec<ModelEntry>> {
        let config = self.config();
        gallery::list_models(
            &config.storage.output_folder,
            &config.storage.input_folder,
            &config.converter.ply_extension,
        )
    }

    /// Delete a model and its source image
    pub fn delete_model(&self, model_id: &str) -> Result<Vec<PathBuf>> {
        let config = self.config();
        gallery::delete_model(
            &config.storage.output_folder,
            &config.storage.input_folder,
            &config.converter.ply_extension,
            model_id,
        )
    }
}
