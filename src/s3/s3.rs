use crate::config::S3Config;
use crate::s3::error::StorageError;
use crate::s3::storage::ObjectStore;
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, info};

/// S3 implementation of the ObjectStore trait
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance from configuration
    pub async fn new(config: &S3Config) -> Result<Self, StorageError> {
        if config.bucket.is_empty() {
            return Err(StorageError::ConfigurationError(
                "bucket name must not be empty".to_string(),
            ));
        }

        info!(
            "Creating S3Storage with config: endpoint={:?}, region={}, bucket={}",
            config.endpoint, config.region, config.bucket
        );

        let region = Region::new(config.region.clone());

        // Static credentials win; otherwise the default provider chain resolves them
        let mut s3_config_builder = if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "StaticCredentialsProvider",
            );

            aws_sdk_s3::config::Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(credentials)
        } else {
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&sdk_config)
        };

        if let Some(endpoint) = &config.endpoint {
            info!("Setting custom endpoint: {}", endpoint);
            // S3-compatible servers such as MinIO need path-style requests
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true);
        }

        let client = Client::from_conf(s3_config_builder.build());

        info!("Created S3 client for region {}", config.region);

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
        })
    }

    async fn ensure_exists(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_error(key, e))?;
        Ok(())
    }
}

/// Map an SDK failure onto the storage error taxonomy.
///
/// Transport failures are checked first, then service error codes, then the
/// HTTP status.
fn classify_error<E>(key: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            return StorageError::Unavailable(key.to_string(), message);
        }
        SdkError::ConstructionFailure(_) => {
            return StorageError::ConfigurationError(message);
        }
        _ => {}
    }

    match err.code() {
        Some("NoSuchKey" | "NotFound" | "KeyNotFound") => {
            return StorageError::ObjectNotFound(key.to_string());
        }
        Some("NoSuchBucket") => return StorageError::ConfigurationError(message),
        Some(
            "AccessDenied"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "Forbidden",
        ) => return StorageError::AccessDenied(key.to_string(), message),
        Some(
            "SlowDown"
            | "ServiceUnavailable"
            | "InternalError"
            | "RequestTimeout"
            | "Throttling"
            | "ThrottlingException",
        ) => return StorageError::Unavailable(key.to_string(), message),
        _ => {}
    }

    match err.raw_response().map(|raw| raw.status().as_u16()) {
        Some(404) => StorageError::ObjectNotFound(key.to_string()),
        Some(401 | 403) => StorageError::AccessDenied(key.to_string(), message),
        Some(429) | Some(500..=599) => StorageError::Unavailable(key.to_string(), message),
        _ => StorageError::Other(anyhow::anyhow!("S3 request for {} failed: {}", key, message)),
    }
}

#[async_trait]
impl ObjectStore for S3Storage {
    async fn put_object(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        debug!("Putting object to S3: {} ({} bytes)", key, data.len());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/octet-stream")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify_error(key, e))?;

        debug!("Successfully put object to S3: {}", key);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Bytes, StorageError> {
        debug!("Fetching object from S3: {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_error(key, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Unavailable(key.to_string(), e.to_string()))?
            .into_bytes();

        debug!("Successfully fetched object from S3: {}", key);
        Ok(data)
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        // S3 reports success for absent keys, so check first to surface ObjectNotFound
        self.ensure_exists(key).await?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_error(key, e))?;

        debug!("Successfully deleted object: {}", key);
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| classify_error(prefix, e))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} objects under prefix '{}'", keys.len(), prefix);
        Ok(keys)
    }
}
