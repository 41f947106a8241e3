use async_trait::async_trait;
use image::DynamicImage;

use super::checks::{is_raster, nonzero_size, require_mime, require_size};
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::RoundPicParams;
use crate::config::{HandlersConfig, RoundPicConfig};
use crate::humanize::ByteSize;
use crate::imaging::{self, OutputFormat, round_corners};

/// Rounds the corners of the source image; the result is always PNG
pub struct RoundPicHandler {
    services: HandlerServices,
    max_file_size: ByteSize,
}

impl RoundPicHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self {
            services,
            max_file_size: RoundPicConfig::default().max_file_size,
        }
    }
}

#[async_trait]
impl JobHandler for RoundPicHandler {
    fn name(&self) -> &'static str {
        "roundpic"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        nonzero_size("roundpic.max_file_size", config.roundpic.max_file_size)?;
        self.max_file_size = config.roundpic.max_file_size;
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = RoundPicParams::parse(&request.command)?;
        let source = &request.source;

        require_mime(
            source,
            is_raster,
            "unsupported mimetype, only 'image/png' and 'image/jpeg' supported",
        )?;
        require_size(
            source,
            self.max_file_size,
            "src image size too large, exceeds the limit",
        )?;

        let resource = self.services.fetcher.fetch(&source.url).await?;
        let radius = *params.radius();
        let mime_type = source.mime_type.clone();

        let encoded = tokio::task::spawn_blocking(move || {
            let image = imaging::decode(&resource.bytes, &mime_type).map_err(|e| {
                OperationError::UpstreamResource(format!("decode image failed, {e}"))
            })?;
            let rounded = DynamicImage::ImageRgba8(round_corners(&image, &radius));
            OutputFormat::Png
                .encode(rounded)
                .map_err(|e| OperationError::Encode(format!("write dest image failed, {e}")))
        })
        .await??;

        Ok(JobOutput::bytes(encoded, OutputFormat::Png.mime_type()))
    }
}
