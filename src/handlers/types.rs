use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::TempPath;

/// One job envelope: the command plus the resource it applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(rename = "cmd")]
    pub command: String,
    #[serde(rename = "src", default)]
    pub source: SourceDescriptor,
}

impl JobRequest {
    pub fn new(command: impl Into<String>, source: SourceDescriptor) -> Self {
        Self {
            command: command.into(),
            source,
        }
    }

    /// First path segment of the command
    pub fn operation(&self) -> &str {
        self.command.split('/').next().unwrap_or_default()
    }
}

/// The job's source resource as the caller describes it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "mimetype", default)]
    pub mime_type: String,
    #[serde(rename = "fsize", default)]
    pub size_bytes: u64,
}

impl SourceDescriptor {
    pub fn new(url: impl Into<String>, mime_type: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            url: url.into(),
            mime_type: mime_type.into(),
            size_bytes,
        }
    }
}

/// What a successful job hands back to the transport
#[derive(Debug)]
pub enum JobOutput {
    Json(Value),
    Bytes {
        data: Vec<u8>,
        mime_type: String,
    },
    /// Result left on disk; the file is removed when the path drops
    StagedFile {
        path: TempPath,
        mime_type: String,
    },
}

impl JobOutput {
    pub fn bytes(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        JobOutput::Bytes {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        match self {
            JobOutput::Json(_) => "application/json",
            JobOutput::Bytes { mime_type, .. } | JobOutput::StagedFile { mime_type, .. } => {
                mime_type
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_names() {
        let request: JobRequest = serde_json::from_str(
            r#"{"cmd":"roundpic/radius/10","src":{"url":"http://a/b.png","mimetype":"image/png","fsize":1234}}"#,
        )
        .unwrap();

        assert_eq!(request.operation(), "roundpic");
        assert_eq!(request.source.mime_type, "image/png");
        assert_eq!(request.source.size_bytes, 1234);
    }

    #[test]
    fn test_source_fields_default() {
        let request: JobRequest =
            serde_json::from_str(r#"{"cmd":"mkzip/bucket/Yg==","src":{"url":"http://a"}}"#).unwrap();
        assert_eq!(request.source.mime_type, "");
        assert_eq!(request.source.size_bytes, 0);

        let bare: JobRequest = serde_json::from_str(r#"{"cmd":"imagecomp"}"#).unwrap();
        assert_eq!(bare.source, SourceDescriptor::default());
    }

    #[test]
    fn test_output_mime_type() {
        assert_eq!(JobOutput::Json(Value::Null).mime_type(), "application/json");
        assert_eq!(JobOutput::bytes(vec![], "image/png").mime_type(), "image/png");
    }
}
