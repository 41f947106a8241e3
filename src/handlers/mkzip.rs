use async_trait::async_trait;
use bytes::Bytes;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::checks::{nonzero_count, nonzero_size, stat_all};
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::MkzipParams;
use crate::config::{HandlersConfig, MkzipConfig};
use crate::humanize::ByteSize;

/// Entries per archive, whatever the configuration says
pub const MAX_ZIP_ENTRIES: usize = 1000;

/// Packs objects of one bucket into a zip archive
pub struct MkzipHandler {
    services: HandlerServices,
    max_file_count: usize,
    max_file_length: ByteSize,
}

impl MkzipHandler {
    pub fn new(services: HandlerServices) -> Self {
        let defaults = MkzipConfig::default();
        Self {
            services,
            max_file_count: defaults.max_file_count,
            max_file_length: defaults.max_file_length,
        }
    }
}

#[async_trait]
impl JobHandler for MkzipHandler {
    fn name(&self) -> &'static str {
        "mkzip"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        let config = &config.mkzip;
        nonzero_count("mkzip.max_file_count", config.max_file_count)?;
        nonzero_size("mkzip.max_file_length", config.max_file_length)?;
        if config.max_file_count > MAX_ZIP_ENTRIES {
            return Err(HandlerConfigError::LimitTooLarge {
                field: "mkzip.max_file_count",
                max: MAX_ZIP_ENTRIES as u64,
            });
        }

        self.max_file_count = config.max_file_count;
        self.max_file_length = config.max_file_length;
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = MkzipParams::parse(&request.command)?;
        let entries = params.entries();

        if entries.len() > self.max_file_count {
            return Err(OperationError::invalid(
                "url",
                format!("zip file count exceeds the limit of {}", self.max_file_count),
            ));
        }

        let stats = stat_all(
            &self.services.storage,
            params.bucket(),
            entries.iter().map(|e| (e.url.as_str(), e.key.as_str())),
        )
        .await?;

        for (entry, stat) in entries.iter().zip(&stats) {
            if stat.size_bytes > self.max_file_length.as_u64() {
                return Err(OperationError::UpstreamResource(format!(
                    "'{}' file length exceeds the limit of {}",
                    entry.url, self.max_file_length
                )));
            }
        }

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let resource = self.services.fetcher.fetch(&entry.url).await.map_err(|e| {
                OperationError::UpstreamResource(format!("get zip file resource error, {e}"))
            })?;
            debug!(alias = %entry.alias, size = resource.bytes.len(), "Fetched zip entry");
            files.push((entry.alias.clone(), resource.bytes));
        }

        let archive = tokio::task::spawn_blocking(move || write_archive(&files)).await??;

        Ok(JobOutput::bytes(archive, "application/zip"))
    }
}

fn write_archive(files: &[(String, Bytes)]) -> Result<Vec<u8>, OperationError> {
    let failed = |e: &dyn std::fmt::Display| {
        OperationError::Encode(format!("write zip file content error, {e}"))
    };

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (alias, data) in files {
        writer
            .start_file(alias.as_str(), options)
            .map_err(|e| failed(&e))?;
        writer.write_all(data).map_err(|e| failed(&e))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| OperationError::Encode(format!("close zip file error, {e}")))?;
    Ok(cursor.into_inner())
}
