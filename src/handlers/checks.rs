//! Source descriptor and limit checks shared by the handlers

use super::traits::{HandlerConfigError, OperationError};
use super::types::SourceDescriptor;
use crate::humanize::ByteSize;
use crate::storage::{BlobStat, StorageClient};

pub(super) fn require_mime(
    source: &SourceDescriptor,
    accept: impl Fn(&str) -> bool,
    reason: &str,
) -> Result<(), OperationError> {
    if accept(&source.mime_type) {
        Ok(())
    } else {
        Err(OperationError::invalid("src.mimetype", reason))
    }
}

pub(super) fn require_size(
    source: &SourceDescriptor,
    limit: ByteSize,
    reason: &str,
) -> Result<(), OperationError> {
    if source.size_bytes > limit.as_u64() {
        Err(OperationError::invalid(
            "src.fsize",
            format!("{reason} ({} > {limit})", source.size_bytes),
        ))
    } else {
        Ok(())
    }
}

/// Stat every `(url, key)` in `bucket`; the first missing or failed object
/// aborts the job, named by its url.
pub(super) async fn stat_all<'a>(
    storage: &StorageClient,
    bucket: &str,
    objects: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Vec<BlobStat>, OperationError> {
    let (urls, keys): (Vec<&str>, Vec<String>) = objects
        .into_iter()
        .map(|(url, key)| (url, key.to_string()))
        .unzip();

    let results = storage.batch_stat(bucket, &keys).await;

    urls.into_iter()
        .zip(results)
        .map(|(url, result)| match result {
            Ok(Some(stat)) => Ok(stat),
            Ok(None) => Err(OperationError::UpstreamResource(format!(
                "batch stat '{url}' error, no such file or directory"
            ))),
            Err(e) => Err(OperationError::UpstreamResource(format!(
                "batch stat '{url}' error, {e}"
            ))),
        })
        .collect()
}

/// Read a converter's output file, which must exist and be non-empty
pub(super) async fn converter_output(
    path: &std::path::Path,
    operation: &str,
) -> Result<Vec<u8>, OperationError> {
    match tokio::fs::read(path).await {
        Ok(data) if !data.is_empty() => Ok(data),
        Ok(_) => Err(OperationError::ExternalProcess(format!(
            "{operation} with no valid output result"
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
            OperationError::ExternalProcess(format!("{operation} with no valid output result")),
        ),
        Err(e) => Err(OperationError::Internal(format!(
            "read {operation} output result error, {e}"
        ))),
    }
}

pub(super) fn is_raster(mime_type: &str) -> bool {
    matches!(mime_type, "image/png" | "image/jpeg")
}

pub(super) fn is_audio(mime_type: &str) -> bool {
    mime_type.starts_with("audio/")
}

pub(super) fn is_text(mime_type: &str) -> bool {
    mime_type.starts_with("text/")
}

pub(super) fn nonzero_count(field: &'static str, value: usize) -> Result<(), HandlerConfigError> {
    if value == 0 {
        Err(HandlerConfigError::ZeroLimit { field })
    } else {
        Ok(())
    }
}

pub(super) fn nonzero_size(field: &'static str, value: ByteSize) -> Result<(), HandlerConfigError> {
    if value.as_u64() == 0 {
        Err(HandlerConfigError::ZeroLimit { field })
    } else {
        Ok(())
    }
}

pub(super) fn executable(
    field: &'static str,
    path: &std::path::Path,
) -> Result<std::path::PathBuf, HandlerConfigError> {
    if path.as_os_str().is_empty() {
        Err(HandlerConfigError::MissingExecutable { field })
    } else {
        Ok(path.to_path_buf())
    }
}
