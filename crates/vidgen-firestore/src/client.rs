//! Firestore REST API client.
//!
//! - Cached OAuth token, refreshed once on `ACCESS_TOKEN_EXPIRED`
//! - Pooled HTTP client with request and connect timeouts
//! - Tracing span and metrics around every request

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{self, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::{Document, Value};

/// Public Firestore REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com/v1";

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// REST endpoint root
    pub endpoint: String,
    /// Service account JSON; `GOOGLE_APPLICATION_CREDENTIALS` when unset
    pub credentials_path: Option<PathBuf>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials_path: None,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Root URL for document paths.
    pub fn documents_url(&self) -> String {
        format!(
            "{}/projects/{}/databases/{}/documents",
            self.endpoint.trim_end_matches('/'),
            self.project_id,
            self.database_id
        )
    }
}

/// Firestore REST API client. Clones share the HTTP pool and token cache.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Create a client authenticated with a service account.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let provider = Self::service_account(&config)?;
        Self::with_token_provider(config, provider)
    }

    /// Create a client with an explicit token provider.
    pub fn with_token_provider(
        config: FirestoreConfig,
        provider: Arc<dyn TokenProvider>,
    ) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vidgen-firestore/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.documents_url(),
            config,
            token_cache: Arc::new(TokenCache::new(provider)),
        })
    }

    fn service_account(config: &FirestoreConfig) -> FirestoreResult<Arc<dyn TokenProvider>> {
        let account = match &config.credentials_path {
            Some(path) => CustomServiceAccount::from_file(path).map(Some),
            None => CustomServiceAccount::from_env(),
        }
        .map_err(|e| FirestoreError::auth_error(format!("Failed to load service account: {e}")))?;

        account
            .map(|sa| Arc::new(sa) as Arc<dyn TokenProvider>)
            .ok_or_else(|| {
                FirestoreError::auth_error(
                    "GOOGLE_APPLICATION_CREDENTIALS not set and no credentials path configured",
                )
            })
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Send a request with the cached token, retrying once with a fresh
    /// token when the server reports the old one expired.
    async fn send_authorized<F>(&self, url: &str, build: F) -> FirestoreResult<Response>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(
                401,
                format!("{url} failed: {body}"),
            ));
        }

        debug!("Firestore access token expired, refreshing");
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(&token).send().await?)
    }

    /// Get a document, `None` if it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.get(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document; fails with `AlreadyExists` if the ID is taken.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| {
                    self.http.post(&url).bearer_auth(token).json(&body)
                })
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!(
                    "{collection}/{doc_id}"
                ))),
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Merge `fields` into an existing document.
    ///
    /// With an `update_time`, the write only applies if the document was not
    /// modified since; otherwise `PreconditionFailed` is returned.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
        update_time: Option<&str>,
    ) -> FirestoreResult<Document> {
        let mut params: Vec<String> = update_mask
            .iter()
            .flatten()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
            .collect();
        if let Some(ts) = update_time {
            params.push(format!(
                "currentDocument.updateTime={}",
                urlencoding::encode(ts)
            ));
        } else {
            // Update must not create a missing document.
            params.push("currentDocument.exists=true".to_string());
        }
        let url = format!("{}?{}", self.document_url(collection, doc_id), params.join("&"));
        let body = Document::new(fields);
        let operation = if update_time.is_some() {
            "update_document_precondition"
        } else {
            "update_document"
        };

        self.execute_request(operation, collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| {
                    self.http.patch(&url).bearer_auth(token).json(&body)
                })
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                StatusCode::NOT_FOUND => {
                    Err(FirestoreError::not_found(format!("{collection}/{doc_id}")))
                }
                StatusCode::PRECONDITION_FAILED | StatusCode::CONFLICT => {
                    let body = response.text().await.unwrap_or_default();
                    Err(FirestoreError::PreconditionFailed(body))
                }
                StatusCode::BAD_REQUEST if update_time.is_none() => {
                    // `exists=true` violations surface as FAILED_PRECONDITION
                    let body = response.text().await.unwrap_or_default();
                    if body.contains("FAILED_PRECONDITION") || body.contains("NOT_FOUND") {
                        Err(FirestoreError::not_found(format!("{collection}/{doc_id}")))
                    } else {
                        Err(FirestoreError::request_failed(format!("{url} failed: {body}")))
                    }
                }
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Delete a document. Deleting a missing document succeeds.
    pub async fn delete_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<()> {
        let url = self.document_url(collection, doc_id);

        self.execute_request("delete_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.delete(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
                StatusCode::NOT_FOUND => {
                    debug!(collection, doc_id, "Document already deleted");
                    Ok(())
                }
                status => Err(Self::error_from_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Run `op` under the configured retry policy.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = FirestoreResult<T>>,
    {
        retry::with_retry(&self.config.retry, operation, op).await
    }

    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            collection = %collection,
            doc_id = doc_id.unwrap_or_default()
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, start.elapsed().as_millis() as f64);

        result
    }

    async fn error_from_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{url} failed: {body}"))
    }
}
