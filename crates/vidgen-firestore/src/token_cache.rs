//! Cached OAuth access token for the Firestore REST API.
//!
//! Readers share the cached token; a refresh takes the write lock and
//! re-checks so concurrent callers trigger a single refresh. If refreshing
//! fails while the old token has not yet expired, the old token is reused.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

/// Refresh this long before the token expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// TTL assumed when the provider reports no usable expiry.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + REFRESH_MARGIN < self.expires_at
    }

    fn is_unexpired(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Token cache shared by all clones of a `FirestoreClient`.
pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            slot: RwLock::new(None),
        }
    }

    /// Drop the cached token so the next call fetches a new one.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }

    /// Current access token, refreshed when close to expiry.
    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(cached) = self.slot.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.slot.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.value.clone());
            }
        }

        match self.provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let now = Utc::now();
                let expires_at = if token.expires_at() > now {
                    (token.expires_at() - now)
                        .to_std()
                        .map(|ttl| Instant::now() + ttl)
                        .unwrap_or_else(|_| Instant::now() + FALLBACK_TTL)
                } else {
                    Instant::now()
                };
                let value = token.as_str().to_string();
                *slot = Some(CachedToken {
                    value: value.clone(),
                    expires_at,
                });
                debug!("Refreshed Firestore access token");
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(cached) if cached.is_unexpired() => {
                    warn!(error = %e, "Token refresh failed, reusing unexpired token");
                    Ok(cached.value.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain access token: {e}"
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_freshness() {
        let stale = CachedToken {
            value: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(30),
        };
        assert!(!stale.is_fresh());
        assert!(stale.is_unexpired());

        let fresh = CachedToken {
            value: "t".into(),
            expires_at: Instant::now() + Duration::from_secs(600),
        };
        assert!(fresh.is_fresh());
    }

    #[test]
    fn test_scope_targets_datastore() {
        assert!(FIRESTORE_SCOPE.ends_with("/datastore"));
    }
}
