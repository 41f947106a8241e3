//! Object storage for source lookups and uploads
//! Uses Apache Arrow object_store crate

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{
    Attribute, Attributes, GetOptions, ObjectStore, PutOptions, path::Path as StoragePath,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::config::{StorageConfig, StorageProvider};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage configuration: {0}")]
    Config(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("batch stat task failed: {0}")]
    Join(String),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: usize,
}

/// What a stat call knows about a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobStat {
    pub size_bytes: u64,
    pub mime_type: String,
}

#[derive(Clone)]
enum Backend {
    /// One store for every bucket; the bucket is the leading path segment.
    Shared {
        store: Arc<dyn ObjectStore>,
        // LocalFileSystem rejects object attributes
        attributes: bool,
    },
    /// One S3 bucket per request bucket
    S3(S3Settings),
}

#[derive(Clone)]
struct S3Settings {
    endpoint: Option<String>,
    region: Option<String>,
    access_key: String,
    secret_key: String,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    backend: Backend,
}

impl StorageClient {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config.provider {
            StorageProvider::Memory => Ok(Self::in_memory()),
            StorageProvider::Local => {
                std::fs::create_dir_all(&config.root)?;
                let store = LocalFileSystem::new_with_prefix(&config.root)?;
                Ok(Self {
                    backend: Backend::Shared {
                        store: Arc::new(store),
                        attributes: false,
                    },
                })
            }
            StorageProvider::S3 => {
                let (Some(access_key), Some(secret_key)) =
                    (config.access_key.clone(), config.secret_key.clone())
                else {
                    return Err(StorageError::Config("missing S3 credentials".to_string()));
                };
                Ok(Self {
                    backend: Backend::S3(S3Settings {
                        endpoint: config.endpoint.clone(),
                        region: config.region.clone(),
                        access_key,
                        secret_key,
                    }),
                })
            }
        }
    }

    /// Wrap an arbitrary store that understands object attributes
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            backend: Backend::Shared {
                store,
                attributes: true,
            },
        }
    }

    /// Create in-memory storage for testing/development
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    fn locate(&self, bucket: &str, key: &str) -> Result<(Arc<dyn ObjectStore>, StoragePath)> {
        match &self.backend {
            Backend::Shared { store, .. } => {
                Ok((store.clone(), StoragePath::from(format!("{bucket}/{key}"))))
            }
            Backend::S3(settings) => {
                let mut builder = AmazonS3Builder::new()
                    .with_bucket_name(bucket)
                    .with_access_key_id(&settings.access_key)
                    .with_secret_access_key(&settings.secret_key);
                if let Some(region) = &settings.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &settings.endpoint {
                    builder = builder.with_endpoint(endpoint).with_allow_http(true);
                }
                Ok((Arc::new(builder.build()?), StoragePath::from(key)))
            }
        }
    }

    fn keeps_attributes(&self) -> bool {
        match &self.backend {
            Backend::Shared { attributes, .. } => *attributes,
            Backend::S3(_) => true,
        }
    }

    /// Size and content type of one object, `None` when it does not exist
    pub async fn stat(&self, bucket: &str, key: &str) -> Result<Option<BlobStat>> {
        let (store, path) = self.locate(bucket, key)?;
        let options = GetOptions {
            head: true,
            ..Default::default()
        };

        let result = match store.get_opts(&path, options).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mime_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|value| value.to_string())
            .unwrap_or_else(|| guess_mime(key).to_string());

        Ok(Some(BlobStat {
            size_bytes: result.meta.size,
            mime_type,
        }))
    }

    /// Stat many keys in one bucket; results keep the order of `keys`
    pub async fn batch_stat(&self, bucket: &str, keys: &[String]) -> Vec<Result<Option<BlobStat>>> {
        let mut tasks = JoinSet::new();
        for (index, key) in keys.iter().enumerate() {
            let client = self.clone();
            let bucket = bucket.to_string();
            let key = key.clone();
            tasks.spawn(async move { (index, client.stat(&bucket, &key).await) });
        }

        let mut results: Vec<Result<Option<BlobStat>>> = keys.iter().map(|_| Ok(None)).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, stat)) => results[index] = stat,
                Err(e) => {
                    tracing::error!(error = %e, "batch stat task aborted");
                    return keys
                        .iter()
                        .map(|_| Err(StorageError::Join(e.to_string())))
                        .collect();
                }
            }
        }
        results
    }

    /// Upload bytes to storage
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        mime_type: &str,
    ) -> Result<UploadMetadata> {
        let (store, path) = self.locate(bucket, key)?;
        let size = data.len();

        let mut options = PutOptions::default();
        if self.keeps_attributes() {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, mime_type.to_string().into());
            options.attributes = attributes;
        }

        let put_result = store.put_opts(&path, data.into(), options).await?;

        tracing::info!(bucket, key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag,
            size,
        })
    }

    /// Check if key exists
    pub async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        let (store, path) = self.locate(bucket, key)?;

        match store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Content type from a key's extension, for backends that keep no attributes
pub fn guess_mime(key: &str) -> &'static str {
    let extension = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "aac" => "audio/aac",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "css" => "text/css",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
