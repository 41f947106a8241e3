use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::io::{Cursor, Read};
use tracing::{info, warn};
use zip::ZipArchive;

use super::checks::{nonzero_count, nonzero_size, require_mime, require_size};
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::UnzipParams;
use crate::config::{HandlersConfig, UnzipConfig};
use crate::humanize::ByteSize;
use crate::storage::guess_mime;

/// Expands a zip source into a bucket
pub struct UnzipHandler {
    services: HandlerServices,
    limits: UnzipConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnzippedFile {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct UnzipResult {
    files: Vec<UnzippedFile>,
}

impl UnzipHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self {
            services,
            limits: UnzipConfig::default(),
        }
    }

    async fn store(&self, bucket: &str, key: String, data: Vec<u8>, overwrite: bool) -> UnzippedFile {
        let storage = &self.services.storage;

        if !overwrite {
            match storage.exists(bucket, &key).await {
                Ok(false) => {}
                Ok(true) => {
                    return UnzippedFile {
                        key,
                        hash: None,
                        error: Some("save unzip file to bucket error, file exists".to_string()),
                    };
                }
                Err(e) => {
                    return UnzippedFile {
                        key,
                        hash: None,
                        error: Some(format!("save unzip file to bucket error, {e}")),
                    };
                }
            }
        }

        match storage.upload(bucket, &key, data, guess_mime(&key)).await {
            Ok(meta) => UnzippedFile {
                key,
                hash: meta.etag,
                error: None,
            },
            Err(e) => {
                warn!(bucket, key = %key, error = %e, "Unzipped file upload failed");
                UnzippedFile {
                    key,
                    hash: None,
                    error: Some(format!("save unzip file to bucket error, {e}")),
                }
            }
        }
    }
}

#[async_trait]
impl JobHandler for UnzipHandler {
    fn name(&self) -> &'static str {
        "unzip"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        let config = &config.unzip;
        nonzero_size("unzip.max_zip_file_length", config.max_zip_file_length)?;
        nonzero_count("unzip.max_file_count", config.max_file_count)?;
        nonzero_size("unzip.max_file_length", config.max_file_length)?;

        self.limits = config.clone();
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = UnzipParams::parse(&request.command)?;
        let source = &request.source;

        require_mime(
            source,
            |mime| mime == "application/zip",
            "unsupported mimetype to unzip",
        )?;
        require_size(
            source,
            self.limits.max_zip_file_length,
            "src zip file length exceeds the limit",
        )?;

        let resource = self.services.fetcher.fetch(&source.url).await?;
        if resource.bytes.len() as u64 > self.limits.max_zip_file_length.as_u64() {
            return Err(OperationError::UpstreamResource(
                "src zip file length exceeds the limit".to_string(),
            ));
        }

        let limits = self.limits.clone();
        let entries =
            tokio::task::spawn_blocking(move || extract(resource.bytes, &limits)).await??;

        let mut files = Vec::with_capacity(entries.len());
        for (name, data) in entries {
            let key = format!("{}{}", params.prefix(), name);
            files.push(self.store(params.bucket(), key, data, params.overwrite()).await);
        }

        info!(
            bucket = params.bucket(),
            count = files.len(),
            failed = files.iter().filter(|f| f.error.is_some()).count(),
            "Unzip finished"
        );

        let result = serde_json::to_value(UnzipResult { files })
            .map_err(|e| OperationError::Internal(e.to_string()))?;
        Ok(JobOutput::Json(result))
    }
}

/// Every regular file of the archive as `(name, content)`, after the count
/// and per-entry size limits have been checked for the whole archive.
fn extract(data: Bytes, limits: &UnzipConfig) -> Result<Vec<(String, Vec<u8>)>, OperationError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| OperationError::UpstreamResource(format!("invalid zip file, {e}")))?;

    if archive.len() > limits.max_file_count {
        return Err(OperationError::UpstreamResource(format!(
            "zip files count exceeds the limit of {}",
            limits.max_file_count
        )));
    }

    let max_file_length: ByteSize = limits.max_file_length;
    for index in 0..archive.len() {
        let entry = archive
            .by_index_raw(index)
            .map_err(|e| OperationError::UpstreamResource(format!("invalid zip file, {e}")))?;
        if entry.size() > max_file_length.as_u64() {
            return Err(OperationError::UpstreamResource(format!(
                "zip file length exceeds the limit of {max_file_length}"
            )));
        }
    }

    let mut files = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|e| {
            OperationError::UpstreamResource(format!("open zip file content failed, {e}"))
        })?;
        if entry.is_dir() {
            continue;
        }

        let name = String::from_utf8_lossy(entry.name_raw()).into_owned();
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content).map_err(|e| {
            OperationError::UpstreamResource(format!("unzip the file content failed, {e}"))
        })?;
        files.push((name, content));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::encode_value;
    use crate::handlers::SourceDescriptor;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive(entries: &[(&str, &[u8])], dirs: &[&str]) -> Bytes {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for dir in dirs {
            writer.add_directory(*dir, options).unwrap();
        }
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        Bytes::from(writer.finish().unwrap().into_inner())
    }

    #[test]
    fn test_extract_skips_directories() {
        let data = archive(&[("docs/a.txt", b"aaa"), ("b.txt", b"bb")], &["docs/"]);
        let files = extract(data, &UnzipConfig::default()).unwrap();

        assert_eq!(
            files,
            vec![
                ("docs/a.txt".to_string(), b"aaa".to_vec()),
                ("b.txt".to_string(), b"bb".to_vec())
            ]
        );
    }

    #[test]
    fn test_extract_limits() {
        let data = archive(&[("a", b"1"), ("b", b"2"), ("c", b"3")], &[]);
        let limits = UnzipConfig {
            max_file_count: 2,
            ..Default::default()
        };
        assert!(matches!(
            extract(data, &limits),
            Err(OperationError::UpstreamResource(_))
        ));

        let data = archive(&[("big", &[0u8; 64])], &[]);
        let limits = UnzipConfig {
            max_file_length: ByteSize(63),
            ..Default::default()
        };
        assert!(extract(data, &limits).is_err());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        assert!(extract(Bytes::from_static(b"not a zip"), &UnzipConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_store_respects_overwrite() {
        let services = crate::handlers::tests_support::services();
        services
            .storage
            .upload("b", "x/a.txt", b"old".to_vec(), "text/plain")
            .await
            .unwrap();
        let handler = UnzipHandler::new(services);

        let kept = handler
            .store("b", "x/a.txt".to_string(), b"new".to_vec(), false)
            .await;
        assert!(kept.error.is_some());
        assert!(kept.hash.is_none());

        let replaced = handler
            .store("b", "x/a.txt".to_string(), b"new".to_vec(), true)
            .await;
        assert!(replaced.error.is_none());
    }

    #[tokio::test]
    async fn test_execute_checks_source_before_fetching() {
        let handler = UnzipHandler::new(crate::handlers::tests_support::services());
        let command = format!("unzip/bucket/{}", encode_value("b"));

        let request = JobRequest::new(
            command.clone(),
            SourceDescriptor::new("http://127.0.0.1:9/a.zip", "text/plain", 10),
        );
        let err = handler.execute(request).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { ref field, .. } if field == "src.mimetype"));

        let request = JobRequest::new(
            command,
            SourceDescriptor::new(
                "http://127.0.0.1:9/a.zip",
                "application/zip",
                ByteSize::gib(2).as_u64(),
            ),
        );
        let err = handler.execute(request).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { ref field, .. } if field == "src.fsize"));
    }
}
