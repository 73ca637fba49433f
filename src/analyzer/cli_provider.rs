//! Vision provider over an installed AI CLI
//!
//! One CLI process per image. The prompt points the CLI at the image's
//! absolute path and asks for a single JSON object; the text answer is
//! returned as is.

use super::types::{ProviderError, RawAnalysisPayload};
use super::AnalysisProvider;
use crate::ai_provider::AiProvider;
use crate::scanner::ImageInfo;
use async_trait::async_trait;
use catalog_reconcile_common::build_analysis_prompt;
use serde_json::Value;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CliAnalysisProvider {
    provider: AiProvider,
}

impl CliAnalysisProvider {
    pub fn new(provider: AiProvider) -> Self {
        Self { provider }
    }

    fn build_prompt(&self, image: &ImageInfo) -> std::io::Result<String> {
        let abs_path = std::fs::canonicalize(&image.path)?;
        let abs_path = abs_path.display().to_string().replace('\\', "/");

        // Line breaks and quotes survive `cmd /c` poorly
        let raw_prompt = format!(
            "Read the image file {} and analyze it.\n\n{}",
            abs_path,
            build_analysis_prompt(&image.file_name)
        );
        Ok(raw_prompt.replace('\n', " ").replace('"', "\\\""))
    }

    fn command(&self, prompt: &str) -> Command {
        let args = self.provider.prompt_args(prompt);

        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.arg("/c").arg(self.provider.command_name()).args(args);
            cmd
        }

        #[cfg(not(windows))]
        {
            let mut cmd = Command::new(self.provider.command_name());
            cmd.args(args);
            cmd
        }
    }
}

#[async_trait]
impl AnalysisProvider for CliAnalysisProvider {
    fn name(&self) -> &str {
        self.provider.command_name()
    }

    async fn analyze(&self, image: &ImageInfo) -> Result<RawAnalysisPayload, ProviderError> {
        let prompt = self
            .build_prompt(image)
            .map_err(|e| ProviderError::Permanent(format!("{}: {}", image.path.display(), e)))?;

        debug!(image_id = %image.file_name, prompt_len = prompt.len(), "running {}", self.name());

        let output = self
            .command(&prompt)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProviderError::Permanent(format!("{} CLI not found: {}", self.name(), e))
                } else {
                    ProviderError::Transient(format!("{} CLI spawn failed: {}", self.name(), e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderError::Transient(format!(
                "{} CLI failed (code {:?}): {}",
                self.name(),
                output.status.code(),
                stderr.trim()
            )));
        }

        let response = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(
            image_id = %image.file_name,
            response_len = response.len(),
            preview = %response.chars().take(200).collect::<String>(),
            "provider answered"
        );

        Ok(RawAnalysisPayload {
            image_id: image.file_name.clone(),
            body: Value::String(response),
        })
    }
}
