//! External converter processes (ffmpeg, wkhtmltopdf, wkhtmltoimage)

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("start {program} command error, {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Exit status and captured stderr of one converter run
#[derive(Debug)]
pub struct ConverterOutput {
    pub program: String,
    pub status: ExitStatus,
    pub stderr: String,
}

impl ConverterOutput {
    pub fn ensure_success(self) -> Result<Self, ConvertError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(ConvertError::Failed {
                program: self.program,
                status: self.status,
                stderr: self.stderr,
            })
        }
    }
}

/// Runs converter executables with stdin closed and stdout discarded
#[derive(Debug, Clone, Default)]
pub struct Converter;

impl Converter {
    pub fn new() -> Self {
        Self
    }

    pub async fn run<I, S>(&self, program: &Path, args: I) -> Result<ConverterOutput, ConvertError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let name = program.display().to_string();
        debug!(program = %name, "Running converter");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ConvertError::Spawn {
                program: name.clone(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !stderr.is_empty() {
            warn!(program = %name, stderr = %stderr, "Converter wrote to stderr");
        }

        Ok(ConverterOutput {
            program: name,
            status: output.status,
            stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stderr() {
        let output = Converter::new()
            .run(Path::new("sh"), ["-c", "echo oops >&2; exit 3"])
            .await
            .unwrap();

        assert_eq!(output.status.code(), Some(3));
        assert_eq!(output.stderr, "oops");
        assert!(matches!(
            output.ensure_success(),
            Err(ConvertError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let err = Converter::new()
            .run(Path::new("/nonexistent/converter"), ["--help"])
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Spawn { .. }));
    }
}
