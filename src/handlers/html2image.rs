use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::checks::{executable, is_text, nonzero_size, require_mime, require_size};
use super::html2pdf::page_file_name;
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::Html2ImageParams;
use crate::config::{HandlersConfig, Html2ImageConfig};
use crate::humanize::ByteSize;

/// Renders a text or html page to an image with wkhtmltoimage
pub struct Html2ImageHandler {
    services: HandlerServices,
    max_page_size: ByteSize,
    wkhtmltoimage: PathBuf,
}

impl Html2ImageHandler {
    pub fn new(services: HandlerServices) -> Self {
        let defaults = Html2ImageConfig::default();
        Self {
            services,
            max_page_size: defaults.max_page_size,
            wkhtmltoimage: defaults.wkhtmltoimage_path,
        }
    }
}

fn push_numeric(args: &mut Vec<OsString>, flag: &str, value: Option<u32>) {
    if let Some(value) = value {
        args.push(flag.into());
        args.push(value.to_string().into());
    }
}

fn wkhtmltoimage_args(params: &Html2ImageParams, page: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-q".into()];

    push_numeric(&mut args, "--crop-h", params.crop_h);
    push_numeric(&mut args, "--crop-w", params.crop_w);
    push_numeric(&mut args, "--crop-x", params.crop_x);
    push_numeric(&mut args, "--crop-y", params.crop_y);

    args.push("--format".into());
    args.push(params.format.extension().into());

    push_numeric(&mut args, "--quality", params.quality);
    push_numeric(&mut args, "--height", params.height);
    push_numeric(&mut args, "--width", params.width);

    if params.force {
        args.push("--disable-smart-width".into());
    }

    args.push(page.into());
    args.push(output.into());
    args
}

#[async_trait]
impl JobHandler for Html2ImageHandler {
    fn name(&self) -> &'static str {
        "html2image"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        let config = &config.html2image;
        nonzero_size("html2image.max_page_size", config.max_page_size)?;

        self.wkhtmltoimage =
            executable("html2image.wkhtmltoimage_path", &config.wkhtmltoimage_path)?;
        self.max_page_size = config.max_page_size;
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = Html2ImageParams::parse(&request.command)?;
        let source = &request.source;

        require_mime(source, is_text, "unsupported file mime type, only text/* allowed")?;
        require_size(source, self.max_page_size, "page file length exceeds the limit")?;

        let scratch = TempDir::with_prefix("html2image")?;
        let page = scratch.path().join(page_file_name(&source.mime_type));

        // outlives the scratch dir; the transport streams it and drops it
        let output = tempfile::Builder::new()
            .prefix("html2image")
            .suffix(&format!(".{}", params.format.extension()))
            .tempfile()?
            .into_temp_path();

        self.services.fetcher.fetch_to_file(&source.url, &page).await?;

        self.services
            .converter
            .run(&self.wkhtmltoimage, wkhtmltoimage_args(&params, &page, &output))
            .await?
            .ensure_success()?;

        let size = tokio::fs::metadata(&output).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(OperationError::ExternalProcess(
                "html2image with no valid output result".to_string(),
            ));
        }

        Ok(JobOutput::StagedFile {
            path: output,
            mime_type: params.format.mime_type().to_string(),
        })
    }
}
