use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::debug;

use super::checks::{
    converter_output, executable, is_audio, nonzero_size, require_mime, require_size,
};
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::{AmergeParams, MergeDuration};
use crate::config::{AmergeConfig, HandlersConfig};
use crate::humanize::ByteSize;

/// Mixes the source audio with a second audio object using ffmpeg
pub struct AmergeHandler {
    services: HandlerServices,
    max_first_file_length: ByteSize,
    max_second_file_length: ByteSize,
    ffmpeg: PathBuf,
}

impl AmergeHandler {
    pub fn new(services: HandlerServices) -> Self {
        let defaults = AmergeConfig::default();
        Self {
            services,
            max_first_file_length: defaults.max_first_file_length,
            max_second_file_length: defaults.max_second_file_length,
            ffmpeg: defaults.ffmpeg_path,
        }
    }
}

fn ffmpeg_args(
    first: PathBuf,
    second: PathBuf,
    duration: MergeDuration,
    format: &str,
    output: PathBuf,
) -> Vec<OsString> {
    vec![
        "-y".into(),
        "-v".into(),
        "error".into(),
        "-i".into(),
        first.into(),
        "-i".into(),
        second.into(),
        "-filter_complex".into(),
        format!(
            "amix=inputs=2:duration={}:dropout_transition=2",
            duration.as_str()
        )
        .into(),
        "-f".into(),
        format.into(),
        output.into(),
    ]
}

#[async_trait]
impl JobHandler for AmergeHandler {
    fn name(&self) -> &'static str {
        "amerge"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        let config = &config.amerge;
        nonzero_size("amerge.max_first_file_length", config.max_first_file_length)?;
        nonzero_size("amerge.max_second_file_length", config.max_second_file_length)?;

        self.ffmpeg = executable("amerge.ffmpeg_path", &config.ffmpeg_path)?;
        self.max_first_file_length = config.max_first_file_length;
        self.max_second_file_length = config.max_second_file_length;
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = AmergeParams::parse(&request.command)?;
        let source = &request.source;

        require_size(
            source,
            self.max_first_file_length,
            "first file length exceeds the limit",
        )?;
        require_mime(source, is_audio, "first file mimetype not supported")?;

        let second = self
            .services
            .storage
            .stat(params.bucket(), params.key())
            .await?
            .ok_or_else(|| {
                OperationError::UpstreamResource(
                    "second file not in the specified bucket".to_string(),
                )
            })?;
        if second.size_bytes > self.max_second_file_length.as_u64() {
            return Err(OperationError::invalid(
                "url",
                "second file length exceeds the limit",
            ));
        }
        if !is_audio(&second.mime_type) {
            return Err(OperationError::invalid(
                "url",
                "second file mimetype not supported",
            ));
        }

        let scratch = TempDir::with_prefix("amerge")?;
        let first_path = scratch.path().join("first");
        let second_path = scratch.path().join("second");
        let output_path = scratch.path().join(format!("merged.{}", params.format()));

        let fetcher = &self.services.fetcher;
        fetcher.fetch_to_file(&source.url, &first_path).await?;
        fetcher.fetch_to_file(params.url(), &second_path).await?;
        debug!(url = params.url(), "Fetched both audio streams");

        self.services
            .converter
            .run(
                &self.ffmpeg,
                ffmpeg_args(
                    first_path,
                    second_path,
                    params.duration(),
                    params.format(),
                    output_path.clone(),
                ),
            )
            .await?
            .ensure_success()?;

        let merged = converter_output(&output_path, "audio merge").await?;
        Ok(JobOutput::bytes(merged, params.mime()))
    }
}
