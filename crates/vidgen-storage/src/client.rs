//! R2 client implementation.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::keys::public_url;

/// Configuration for the R2 client.
#[derive(Debug, Clone)]
pub struct R2Config {
    /// S3 API endpoint
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Usually "auto" for R2
    pub region: String,
    /// Base URL objects are publicly served from
    pub public_base_url: String,
}

impl R2Config {
    /// Host of the public base URL, used to recognise managed assets.
    pub fn public_host(&self) -> StorageResult<String> {
        url::Url::parse(&self.public_base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| {
                StorageError::config_error(format!(
                    "public base URL has no host: {}",
                    self.public_base_url
                ))
            })
    }
}

/// A stored object and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedObject {
    pub url: String,
    pub key: String,
    /// Size reported by the store after the write
    pub size: u64,
}

/// Cloudflare R2 storage client.
#[derive(Clone)]
pub struct R2Client {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl R2Client {
    pub fn new(config: R2Config) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url,
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        public_url(&self.public_base_url, key)
    }

    /// Upload a local file and confirm its stored size.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadedObject> {
        let path = path.as_ref();
        debug!(key, path = %path.display(), "Uploading file");

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let size = self.object_size(key).await?;
        info!(key, size, "Uploaded object");

        Ok(UploadedObject {
            url: self.public_url(key),
            key: key.to_string(),
            size,
        })
    }

    /// Size in bytes of a stored object.
    pub async fn object_size(&self, key: &str) -> StorageResult<u64> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("NotFound") || msg.contains("NoSuchKey") {
                    StorageError::not_found(key)
                } else {
                    StorageError::HeadFailed(msg)
                }
            })?;

        Ok(head.content_length().unwrap_or(0).max(0) as u64)
    }
}
