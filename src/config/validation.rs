use super::models::{Config, StorageProvider};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("max_payload_bytes ({actual}) exceeds limit of 5MB ({limit})")]
    PayloadSizeExceedsLimit { actual: u64, limit: u64 },

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },

    #[error("Operation prefix '{prefix}' must not contain '/'")]
    InvalidOperationPrefix { prefix: String },
}

/// Validate the entire configuration
///
/// Handler limits are checked by each handler when it is initialized.
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_payload_size(config)?;
    validate_storage(config)?;
    validate_timeouts(config)?;
    validate_prefix(config)?;
    Ok(())
}

fn validate_payload_size(config: &Config) -> Result<(), ValidationError> {
    const MAX_PAYLOAD_BYTES: u64 = 5 * 1024 * 1024;

    if config.server.max_payload_bytes.as_u64() > MAX_PAYLOAD_BYTES {
        return Err(ValidationError::PayloadSizeExceedsLimit {
            actual: config.server.max_payload_bytes.as_u64(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.provider == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }

    Ok(())
}

fn validate_timeouts(config: &Config) -> Result<(), ValidationError> {
    let timeouts = [
        ("server.request_timeout_secs", config.server.request_timeout_secs),
        ("fetch.connect_timeout_secs", config.fetch.connect_timeout_secs),
        ("fetch.request_timeout_secs", config.fetch.request_timeout_secs),
    ];

    match timeouts.into_iter().find(|(_, secs)| *secs == 0) {
        Some((field, _)) => Err(ValidationError::ZeroTimeout { field }),
        None => Ok(()),
    }
}

/// The prefix becomes part of the first command segment
fn validate_prefix(config: &Config) -> Result<(), ValidationError> {
    if config.server.operation_prefix.contains('/') {
        return Err(ValidationError::InvalidOperationPrefix {
            prefix: config.server.operation_prefix.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_payload_size_limit() {
        let mut config = Config::default();
        config.server.max_payload_bytes = ByteSize::mib(10);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::PayloadSizeExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_s3_credentials_missing() {
        let mut config = Config::default();
        config.storage.provider = StorageProvider::S3;
        config.storage.access_key = Some("key".to_string());

        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingS3Credentials)
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.fetch.connect_timeout_secs = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroTimeout {
                field: "fetch.connect_timeout_secs"
            })
        ));
    }

    #[test]
    fn test_prefix_with_slash() {
        let mut config = Config::default();
        config.server.operation_prefix = "a/b".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidOperationPrefix { .. })
        ));
    }
}
