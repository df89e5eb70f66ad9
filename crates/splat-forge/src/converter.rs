//! External image-to-model reconstruction tool

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::ConverterConfig;
use crate::error::{Error, Result};

/// Something that turns an image into a `.ply` model inside an output folder.
///
/// Implementations:
/// - `SharpConverter`: runs the configured command-line tool
#[async_trait]
pub trait Converter: Send + Sync {
    /// Run one conversion to completion.
    ///
    /// `Ok(())` means the tool reported success; whether the model file was
    /// actually written is checked by the caller.
    async fn convert(&self, input_path: &Path, output_folder: &Path) -> Result<()>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// Subprocess-backed converter: `<program> <args..> -i <input> -o <output>`
pub struct SharpConverter {
    config: ConverterConfig,
}

impl SharpConverter {
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    fn command(&self, input_path: &Path, output_folder: &Path) -> Command {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg("-i")
            .arg(input_path)
            .arg("-o")
            .arg(output_folder)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Converter for SharpConverter {
    async fn convert(&self, input_path: &Path, output_folder: &Path) -> Result<()> {
        let program = &self.config.program;
        let child = self
            .command(input_path, output_folder)
            .spawn()
            .map_err(|e| Error::execution(format!("Failed to start {}: {}", program, e)))?;

        // Dropping the wait future on timeout drops the child, which kills it
        let waited = match self.config.timeout() {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    Error::execution(format!(
                        "{} timed out after {}s",
                        program,
                        limit.as_secs()
                    ))
                })?,
            None => child.wait_with_output().await,
        };
        let output = waited
            .map_err(|e| Error::execution(format!("Failed to wait for {}: {}", program, e)))?;

        if !output.stdout.is_empty() {
            tracing::debug!("{} stdout: {}", program, String::from_utf8_lossy(&output.stdout));
        }

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        match output.status.code() {
            Some(_) => Err(Error::external_tool(output.status.to_string(), stderr)),
            None => Err(Error::execution(format!(
                "{} terminated abnormally ({}): {}",
                program, output.status, stderr
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.config.program
    }
}
