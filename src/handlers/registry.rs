use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use super::traits::{HandlerConfigError, JobHandler, OperationError};
use super::types::{JobOutput, JobRequest};
use super::{
    AmergeHandler, Html2ImageHandler, Html2PdfHandler, ImageCompHandler, MkzipHandler,
    RoundPicHandler, UnzipHandler,
};
use crate::config::HandlersConfig;
use crate::convert::Converter;
use crate::fetch::ResourceFetcher;
use crate::storage::StorageClient;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("operation '{0}' is already registered")]
    DuplicateOperation(String),

    #[error("handler for '{operation}' rejected its configuration: {source}")]
    Config {
        operation: String,
        #[source]
        source: HandlerConfigError,
    },

    #[error("no handler registered for '{0}'")]
    NoHandler(String),

    #[error(transparent)]
    Job(#[from] OperationError),
}

/// Collaborators shared by the built-in handlers
#[derive(Clone)]
pub struct HandlerServices {
    pub storage: StorageClient,
    pub fetcher: Arc<ResourceFetcher>,
    pub converter: Converter,
}

/// Operation key to handler, populated once before serving
pub struct JobRegistry {
    handlers: BTreeMap<String, Box<dyn JobHandler>>,
    prefix: String,
}

impl JobRegistry {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            handlers: BTreeMap::new(),
            prefix: prefix.into(),
        }
    }

    /// Registry holding every built-in operation under `prefix + name`
    pub fn with_builtins(
        prefix: impl Into<String>,
        services: &HandlerServices,
        config: &HandlersConfig,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new(prefix);

        registry.register_builtin(Box::new(MkzipHandler::new(services.clone())), config)?;
        registry.register_builtin(Box::new(UnzipHandler::new(services.clone())), config)?;
        registry.register_builtin(Box::new(AmergeHandler::new(services.clone())), config)?;
        registry.register_builtin(Box::new(Html2PdfHandler::new(services.clone())), config)?;
        registry.register_builtin(Box::new(Html2ImageHandler::new(services.clone())), config)?;
        registry.register_builtin(Box::new(ImageCompHandler::new(services.clone())), config)?;
        registry.register_builtin(Box::new(RoundPicHandler::new(services.clone())), config)?;

        Ok(registry)
    }

    /// Bind `handler` under `operation`.
    ///
    /// An existing binding wins and the new handler is dropped uninitialised.
    /// A handler whose `initialize` fails is not stored.
    pub fn register(
        &mut self,
        operation: impl Into<String>,
        mut handler: Box<dyn JobHandler>,
        config: &HandlersConfig,
    ) -> Result<(), RegistryError> {
        let operation = operation.into();
        if self.handlers.contains_key(&operation) {
            return Err(RegistryError::DuplicateOperation(operation));
        }

        handler
            .initialize(config)
            .map_err(|source| RegistryError::Config {
                operation: operation.clone(),
                source,
            })?;

        info!(operation = %operation, "Registered handler");
        self.handlers.insert(operation, handler);
        Ok(())
    }

    pub fn register_builtin(
        &mut self,
        handler: Box<dyn JobHandler>,
        config: &HandlersConfig,
    ) -> Result<(), RegistryError> {
        let operation = format!("{}{}", self.prefix, handler.name());
        self.register(operation, handler, config)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn operations(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    pub fn has_handler(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Route a request to the handler named by its first command segment
    pub async fn dispatch(&self, mut request: JobRequest) -> Result<JobOutput, RegistryError> {
        let operation = request.operation().to_string();
        let handler = self
            .handlers
            .get(&operation)
            .ok_or_else(|| RegistryError::NoHandler(operation.clone()))?;

        if let Some(rest) = request.command.strip_prefix(&self.prefix) {
            request.command = rest.to_string();
        }

        debug!(operation = %operation, "Dispatching job");
        let started = Instant::now();
        let output = handler.execute(request).await?;
        info!(
            operation = %operation,
            duration_ms = started.elapsed().as_millis() as u64,
            "Job completed"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::SourceDescriptor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoHandler {
        label: &'static str,
        calls: Arc<AtomicUsize>,
        initialized: bool,
    }

    impl EchoHandler {
        fn boxed(label: &'static str, calls: &Arc<AtomicUsize>) -> Box<dyn JobHandler> {
            Box::new(Self {
                label,
                calls: calls.clone(),
                initialized: false,
            })
        }
    }

    #[async_trait]
    impl JobHandler for EchoHandler {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn initialize(&mut self, config: &HandlersConfig) -> Result<(), HandlerConfigError> {
            if config.mkzip.max_file_count == 0 {
                return Err(HandlerConfigError::ZeroLimit {
                    field: "max_file_count",
                });
            }
            self.initialized = true;
            Ok(())
        }

        async fn execute(&self, request: JobRequest) -> Result<JobOutput, OperationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(JobOutput::Json(json!({
                "label": self.label,
                "command": request.command,
                "initialized": self.initialized,
            })))
        }
    }

    fn request(command: &str) -> JobRequest {
        JobRequest::new(command, SourceDescriptor::default())
    }

    #[tokio::test]
    async fn test_duplicate_registration_keeps_first() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new("");
        let config = HandlersConfig::default();

        registry
            .register("echo", EchoHandler::boxed("first", &calls), &config)
            .unwrap();
        let err = registry
            .register("echo", EchoHandler::boxed("second", &calls), &config)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateOperation(ref op) if op == "echo"));

        let output = registry.dispatch(request("echo/x")).await.unwrap();
        let JobOutput::Json(value) = output else {
            panic!("expected json output");
        };
        assert_eq!(value["label"], "first");
        assert_eq!(value["initialized"], true);
    }

    #[tokio::test]
    async fn test_unknown_operation_invokes_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new("");
        registry
            .register("echo", EchoHandler::boxed("only", &calls), &HandlersConfig::default())
            .unwrap();

        let err = registry.dispatch(request("nothere/a/b")).await.unwrap_err();
        assert!(matches!(err, RegistryError::NoHandler(ref op) if op == "nothere"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_prefix_is_stripped_before_execute() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new("qn-");
        registry
            .register_builtin(EchoHandler::boxed("p", &calls), &HandlersConfig::default())
            .unwrap();

        assert!(registry.has_handler("qn-echo"));
        assert!(!registry.has_handler("echo"));

        let JobOutput::Json(value) = registry.dispatch(request("qn-echo/a/b")).await.unwrap()
        else {
            panic!("expected json output");
        };
        assert_eq!(value["command"], "echo/a/b");

        // the bare name is not routed when a prefix is configured
        assert!(matches!(
            registry.dispatch(request("echo/a/b")).await,
            Err(RegistryError::NoHandler(_))
        ));
    }

    #[test]
    fn test_failed_initialize_stores_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = JobRegistry::new("");
        let mut config = HandlersConfig::default();
        config.mkzip.max_file_count = 0;

        let err = registry
            .register("echo", EchoHandler::boxed("bad", &calls), &config)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Config { .. }));
        assert!(registry.operations().is_empty());
    }

    #[test]
    fn test_builtins_registered() {
        let services = crate::handlers::tests_support::services();
        let registry =
            JobRegistry::with_builtins("", &services, &HandlersConfig::default()).unwrap();

        assert_eq!(
            registry.operations(),
            vec![
                "amerge",
                "html2image",
                "html2pdf",
                "imagecomp",
                "mkzip",
                "roundpic",
                "unzip"
            ]
        );
    }
}
