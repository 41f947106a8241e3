use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
}

/// HTTP front end
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Largest accepted request envelope (after decompression)
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
    /// Prepended to every operation name when handlers are registered
    #[serde(default)]
    pub operation_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            request_timeout_secs: default_request_timeout_secs(),
            max_payload_bytes: default_max_payload_bytes(),
            operation_prefix: String::new(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9011))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize::kib(64)
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    S3,
    #[default]
    Local,
    Memory,
}

/// Object storage used for existence checks and uploads
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    /// Root directory of the local provider; buckets are subdirectories
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    pub endpoint: Option<String>,
    pub region: Option<String>,
    /// S3 access key (loaded from environment, not from config file)
    #[serde(skip)]
    pub access_key: Option<String>,
    /// S3 secret key (loaded from environment, not from config file)
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::Local,
            root: default_storage_root(),
            endpoint: None,
            region: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("data/blobs")
}

/// Outbound HTTP client for source resources
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_fetch_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_fetch_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("fopgate/{}", env!("CARGO_PKG_VERSION"))
}

/// Per-operation limits and converter executables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HandlersConfig {
    #[serde(default)]
    pub mkzip: MkzipConfig,
    #[serde(default)]
    pub unzip: UnzipConfig,
    #[serde(default)]
    pub amerge: AmergeConfig,
    #[serde(default)]
    pub html2pdf: Html2PdfConfig,
    #[serde(default)]
    pub html2image: Html2ImageConfig,
    #[serde(default)]
    pub imagecomp: ImageCompConfig,
    #[serde(default)]
    pub roundpic: RoundPicConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MkzipConfig {
    #[serde(default = "default_mkzip_max_file_count")]
    pub max_file_count: usize,
    #[serde(default = "default_max_file_length")]
    pub max_file_length: ByteSize,
}

impl Default for MkzipConfig {
    fn default() -> Self {
        Self {
            max_file_count: default_mkzip_max_file_count(),
            max_file_length: default_max_file_length(),
        }
    }
}

fn default_mkzip_max_file_count() -> usize {
    100
}

fn default_max_file_length() -> ByteSize {
    ByteSize::mib(100)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnzipConfig {
    #[serde(default = "default_max_zip_file_length")]
    pub max_zip_file_length: ByteSize,
    #[serde(default = "default_unzip_max_file_count")]
    pub max_file_count: usize,
    #[serde(default = "default_max_file_length")]
    pub max_file_length: ByteSize,
}

impl Default for UnzipConfig {
    fn default() -> Self {
        Self {
            max_zip_file_length: default_max_zip_file_length(),
            max_file_count: default_unzip_max_file_count(),
            max_file_length: default_max_file_length(),
        }
    }
}

fn default_max_zip_file_length() -> ByteSize {
    ByteSize::gib(1)
}

fn default_unzip_max_file_count() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AmergeConfig {
    #[serde(default = "default_max_file_length")]
    pub max_first_file_length: ByteSize,
    #[serde(default = "default_max_file_length")]
    pub max_second_file_length: ByteSize,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
}

impl Default for AmergeConfig {
    fn default() -> Self {
        Self {
            max_first_file_length: default_max_file_length(),
            max_second_file_length: default_max_file_length(),
            ffmpeg_path: default_ffmpeg_path(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Html2PdfConfig {
    #[serde(default = "default_max_page_size")]
    pub max_page_size: ByteSize,
    #[serde(default = "default_max_copies")]
    pub max_copies: u32,
    #[serde(default = "default_wkhtmltopdf_path")]
    pub wkhtmltopdf_path: PathBuf,
}

impl Default for Html2PdfConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            max_copies: default_max_copies(),
            wkhtmltopdf_path: default_wkhtmltopdf_path(),
        }
    }
}

fn default_max_page_size() -> ByteSize {
    ByteSize::mib(10)
}

fn default_max_copies() -> u32 {
    10
}

fn default_wkhtmltopdf_path() -> PathBuf {
    PathBuf::from("wkhtmltopdf")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Html2ImageConfig {
    #[serde(default = "default_max_page_size")]
    pub max_page_size: ByteSize,
    #[serde(default = "default_wkhtmltoimage_path")]
    pub wkhtmltoimage_path: PathBuf,
}

impl Default for Html2ImageConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            wkhtmltoimage_path: default_wkhtmltoimage_path(),
        }
    }
}

fn default_wkhtmltoimage_path() -> PathBuf {
    PathBuf::from("wkhtmltoimage")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImageCompConfig {
    #[serde(default = "default_max_url_count")]
    pub max_url_count: usize,
}

impl Default for ImageCompConfig {
    fn default() -> Self {
        Self {
            max_url_count: default_max_url_count(),
        }
    }
}

fn default_max_url_count() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoundPicConfig {
    #[serde(default = "default_max_file_length")]
    pub max_file_size: ByteSize,
}

impl Default for RoundPicConfig {
    fn default() -> Self {
        Self {
            max_file_size: default_max_file_length(),
        }
    }
}
