//! Upload with bounded retries.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use vidgen_storage::UploadedObject;

use crate::backends::ObjectStore;
use crate::metrics::record_upload_attempt;
use crate::retry::{retry_async, RetryConfig, RetryResult};

pub struct UploadClient {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
}

impl UploadClient {
    pub fn new(store: Arc<dyn ObjectStore>, retry: RetryConfig) -> Self {
        Self { store, retry }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts
    }

    /// Upload `path` under `key`, retrying failed or timed-out attempts.
    ///
    /// Returns `None` once every attempt has failed; the caller decides
    /// whether that is fatal.
    pub async fn upload(&self, path: &Path, key: &str) -> Option<UploadedObject> {
        let result = retry_async(
            &self.retry,
            |attempt| {
                info!(key, attempt, "Uploading video");
                self.store.upload(path, key)
            },
            |_, ok| record_upload_attempt(ok),
        )
        .await;

        match result {
            RetryResult::Success { value, attempts } => {
                info!(key, size = value.size, attempts, "Upload complete");
                Some(value)
            }
            RetryResult::Failed { error, attempts } => {
                warn!(key, attempts, error = %error, "Upload attempts exhausted");
                None
            }
        }
    }
}
