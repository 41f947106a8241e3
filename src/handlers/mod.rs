//! Job handlers and the registry that routes commands to them
//!
//! ## Key Components
//!
//! - [`JobHandler`] - trait every operation implements
//! - [`JobRegistry`] - operation key to handler, built once at startup
//! - [`JobRequest`] / [`JobOutput`] - what goes in and comes out of a job
//! - [`OperationError`] - typed job failure, mapped to a status by the API
//!
//! ## Example
//!
//! ```rust,ignore
//! use fopgate::handlers::{JobRegistry, JobRequest, SourceDescriptor};
//!
//! let registry = JobRegistry::with_builtins("", &services, &config.handlers)?;
//! let output = registry
//!     .dispatch(JobRequest::new("roundpic/radius/20", source))
//!     .await?;
//! ```

mod amerge;
mod checks;
mod html2image;
mod html2pdf;
mod imagecomp;
mod mkzip;
mod registry;
mod roundpic;
mod traits;
mod types;
mod unzip;

pub use amerge::AmergeHandler;
pub use html2image::Html2ImageHandler;
pub use html2pdf::Html2PdfHandler;
pub use imagecomp::ImageCompHandler;
pub use mkzip::{MAX_ZIP_ENTRIES, MkzipHandler};
pub use registry::{HandlerServices, JobRegistry, RegistryError};
pub use roundpic::RoundPicHandler;
pub use traits::{HandlerConfigError, JobHandler, OperationError};
pub use types::{JobOutput, JobRequest, SourceDescriptor};
pub use unzip::{UnzipHandler, UnzippedFile};

#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;

    use super::HandlerServices;
    use crate::config::FetchConfig;
    use crate::convert::Converter;
    use crate::fetch::ResourceFetcher;
    use crate::storage::StorageClient;

    pub(crate) fn services() -> HandlerServices {
        HandlerServices {
            storage: StorageClient::in_memory(),
            fetcher: Arc::new(ResourceFetcher::new(&FetchConfig::default()).unwrap()),
            converter: Converter::new(),
        }
    }
}
