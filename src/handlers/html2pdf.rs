use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::checks::{converter_output, executable, is_text, nonzero_size, require_mime, require_size};
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::Html2PdfParams;
use crate::config::{HandlersConfig, Html2PdfConfig};
use crate::humanize::ByteSize;

/// Renders a text or html page to pdf with wkhtmltopdf
pub struct Html2PdfHandler {
    services: HandlerServices,
    max_page_size: ByteSize,
    max_copies: u32,
    wkhtmltopdf: PathBuf,
}

impl Html2PdfHandler {
    pub fn new(services: HandlerServices) -> Self {
        let defaults = Html2PdfConfig::default();
        Self {
            services,
            max_page_size: defaults.max_page_size,
            max_copies: defaults.max_copies,
            wkhtmltopdf: defaults.wkhtmltopdf_path,
        }
    }
}

/// Page file name; wkhtmltopdf picks its parser from the extension
pub(super) fn page_file_name(mime_type: &str) -> &'static str {
    if mime_type == "text/html" {
        "page.html"
    } else {
        "page.txt"
    }
}

fn wkhtmltopdf_args(params: &Html2PdfParams, page: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-q".into()];

    if params.gray {
        args.push("--grayscale".into());
    }
    if params.low_quality {
        args.push("--lowquality".into());
    }
    if let Some(orientation) = params.orientation {
        args.push("--orientation".into());
        args.push(orientation.as_str().into());
    }
    if let Some(size) = &params.page_size {
        args.push("--page-size".into());
        args.push(size.into());
    }
    if let Some(title) = &params.title {
        args.push("--title".into());
        args.push(title.into());
    }
    args.push(if params.collate { "--collate" } else { "--no-collate" }.into());
    args.push("--copies".into());
    args.push(params.copies.to_string().into());

    args.push(page.into());
    args.push(output.into());
    args
}

#[async_trait]
impl JobHandler for Html2PdfHandler {
    fn name(&self) -> &'static str {
        "html2pdf"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        let config = &config.html2pdf;
        nonzero_size("html2pdf.max_page_size", config.max_page_size)?;
        if config.max_copies == 0 {
            return Err(HandlerConfigError::ZeroLimit {
                field: "html2pdf.max_copies",
            });
        }

        self.wkhtmltopdf = executable("html2pdf.wkhtmltopdf_path", &config.wkhtmltopdf_path)?;
        self.max_page_size = config.max_page_size;
        self.max_copies = config.max_copies;
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = Html2PdfParams::parse(&request.command)?;
        let source = &request.source;

        require_mime(source, is_text, "unsupported file mime type, only text/* allowed")?;
        require_size(source, self.max_page_size, "page file length exceeds the limit")?;
        if params.copies > self.max_copies {
            return Err(OperationError::invalid(
                "copies",
                format!("pdf copies exceeds the limit of {}", self.max_copies),
            ));
        }

        let scratch = TempDir::with_prefix("html2pdf")?;
        let page = scratch.path().join(page_file_name(&source.mime_type));
        let output = scratch.path().join("result.pdf");

        self.services.fetcher.fetch_to_file(&source.url, &page).await?;

        self.services
            .converter
            .run(&self.wkhtmltopdf, wkhtmltopdf_args(&params, &page, &output))
            .await?
            .ensure_success()?;

        let pdf = converter_output(&output, "html2pdf").await?;
        Ok(JobOutput::bytes(pdf, "application/pdf"))
    }
}
