use async_trait::async_trait;
use tracing::debug;

use super::checks::{is_raster, nonzero_count, stat_all};
use super::registry::HandlerServices;
use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use crate::command::{ImageCompParams, MAX_SOURCE_IMAGES};
use crate::config::{HandlersConfig, ImageCompConfig};
use crate::imaging::{self, compose};

/// Lays several bucket images out on one grid canvas
pub struct ImageCompHandler {
    services: HandlerServices,
    max_url_count: usize,
}

impl ImageCompHandler {
    pub fn new(services: HandlerServices) -> Self {
        Self {
            services,
            max_url_count: ImageCompConfig::default().max_url_count,
        }
    }
}

#[async_trait]
impl JobHandler for ImageCompHandler {
    fn name(&self) -> &'static str {
        "imagecomp"
    }

    fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
        let max_url_count = config.imagecomp.max_url_count;
        nonzero_count("imagecomp.max_url_count", max_url_count)?;
        if max_url_count > MAX_SOURCE_IMAGES {
            return Err(HandlerConfigError::LimitTooLarge {
                field: "imagecomp.max_url_count",
                max: MAX_SOURCE_IMAGES as u64,
            });
        }

        self.max_url_count = max_url_count;
        Ok(())
    }

    async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
        let params = ImageCompParams::parse(&request.command)?;
        let sources = params.sources();

        if sources.len() > self.max_url_count {
            return Err(OperationError::invalid(
                "url",
                format!("only allow url count not larger than {}", self.max_url_count),
            ));
        }

        stat_all(
            &self.services.storage,
            params.bucket(),
            sources.iter().map(|s| (s.url.as_str(), s.key.as_str())),
        )
        .await?;

        let mut fetched = Vec::with_capacity(sources.len());
        for source in sources {
            let resource = self.services.fetcher.fetch(&source.url).await?;
            if !is_raster(&resource.mime_type) {
                return Err(OperationError::UpstreamResource(format!(
                    "unsupported mimetype of '{}', '{}'",
                    source.url, resource.mime_type
                )));
            }
            debug!(url = %source.url, size = resource.bytes.len(), "Fetched source image");
            fetched.push((source.url.clone(), resource));
        }

        let format = params.format();
        let layout = params.layout().clone();
        let encoded = tokio::task::spawn_blocking(move || {
            let images = fetched
                .iter()
                .map(|(url, resource)| {
                    imaging::decode(&resource.bytes, &resource.mime_type).map_err(|e| {
                        OperationError::UpstreamResource(format!("decode image '{url}' failed, {e}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            compose(&layout, &images, format).map_err(OperationError::from)
        })
        .await??;

        Ok(JobOutput::bytes(encoded, format.mime_type()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::encode_value;
    use crate::handlers::SourceDescriptor;

    fn command(urls: &[&str]) -> String {
        let mut command = format!("imagecomp/bucket/{}", encode_value("mybucket"));
        for url in urls {
            command.push_str(&format!("/url/{}", encode_value(url)));
        }
        command
    }

    #[tokio::test]
    async fn test_missing_object_is_upstream_error() {
        let handler = ImageCompHandler::new(crate::handlers::tests_support::services());
        let request = JobRequest::new(
            command(&["http://127.0.0.1:9/a.png"]),
            SourceDescriptor::default(),
        );

        let err = handler.execute(request).await.unwrap_err();
        assert!(matches!(err, OperationError::UpstreamResource(_)));
        assert!(err.to_string().contains("http://127.0.0.1:9/a.png"));
    }

    #[tokio::test]
    async fn test_configured_url_limit() {
        let mut handler = ImageCompHandler::new(crate::handlers::tests_support::services());
        let mut config = HandlersConfig::default();
        config.imagecomp.max_url_count = 1;
        handler.initialize(&config).unwrap();

        let request = JobRequest::new(
            command(&["http://h/a.png", "http://h/b.png"]),
            SourceDescriptor::default(),
        );
        let err = handler.execute(request).await.unwrap_err();
        assert!(matches!(err, OperationError::InvalidParameter { ref field, .. } if field == "url"));
    }

    #[test]
    fn test_initialize_caps_url_count() {
        let mut handler = ImageCompHandler::new(crate::handlers::tests_support::services());
        let mut config = HandlersConfig::default();
        config.imagecomp.max_url_count = MAX_SOURCE_IMAGES + 1;

        assert!(handler.initialize(&config).is_err());
    }
}
