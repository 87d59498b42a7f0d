//! Per-user quiz usage quota stored at `usage_quotas/{uid}`.
//!
//! Decrements use optimistic locking on the document's `updateTime`. A read
//! at or after `reset_date` refills the counter before it is checked.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use vidgen_models::UsageQuota;

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_precondition_conflict;
use crate::types::{Document, ToFirestoreValue, Value};

const COLLECTION: &str = "usage_quotas";

/// Attempts for one decrement before giving up on contention.
const MAX_QUOTA_RETRIES: u32 = 5;

/// Linear backoff step between contended attempts (milliseconds).
const RETRY_BASE_DELAY_MS: u64 = 50;

/// Outcome of a decrement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaDecrement {
    /// One unit consumed; the stored quota afterwards.
    Consumed(UsageQuota),
    /// Nothing left before the reset date.
    Exhausted(UsageQuota),
}

pub struct UsageQuotaRepository {
    client: FirestoreClient,
    /// Limit given to users without a quota document
    default_limit: u32,
}

impl UsageQuotaRepository {
    pub fn new(client: FirestoreClient, default_limit: u32) -> Self {
        Self {
            client,
            default_limit,
        }
    }

    /// Current quota with any pending reset applied. Users without a
    /// document get a fresh default quota (not persisted).
    pub async fn current(&self, user_id: &str) -> FirestoreResult<UsageQuota> {
        let now = Utc::now();
        let doc = self.client.get_document(COLLECTION, user_id).await?;
        Ok(match doc {
            Some(d) => document_to_quota(&d, user_id, self.default_limit, now)?,
            None => UsageQuota::new(user_id, self.default_limit, now),
        })
    }

    /// Consume one unit of the user's quota.
    pub async fn decrement(&self, user_id: &str) -> FirestoreResult<QuotaDecrement> {
        let mut last_error = None;

        for attempt in 0..MAX_QUOTA_RETRIES {
            let now = Utc::now();
            let doc = self.client.get_document(COLLECTION, user_id).await?;

            let (quota, update_time) = match &doc {
                Some(d) => (
                    document_to_quota(d, user_id, self.default_limit, now)?,
                    d.update_time.clone(),
                ),
                None => (UsageQuota::new(user_id, self.default_limit, now), None),
            };

            let Some(next) = quota.decremented() else {
                info!(user_id, reset_date = %quota.reset_date, "Usage quota exhausted");
                return Ok(QuotaDecrement::Exhausted(quota));
            };

            let result = match update_time {
                Some(ts) => self
                    .client
                    .update_document(
                        COLLECTION,
                        user_id,
                        quota_to_fields(&next, now),
                        Some(quota_field_mask()),
                        Some(&ts),
                    )
                    .await
                    .map(|_| ()),
                None => self
                    .client
                    .create_document(COLLECTION, user_id, quota_to_fields(&next, now))
                    .await
                    .map(|_| ()),
            };

            match result {
                Ok(()) => {
                    info!(user_id, remaining = next.remaining, "Decremented usage quota");
                    return Ok(QuotaDecrement::Consumed(next));
                }
                Err(e) if e.is_precondition_failed() || matches!(e, FirestoreError::AlreadyExists(_)) => {
                    debug!(user_id, attempt = attempt + 1, "Quota write lost a race, retrying");
                    record_precondition_conflict(COLLECTION);
                    last_error = Some(e);
                    tokio::time::sleep(Duration::from_millis(
                        RETRY_BASE_DELAY_MS * (attempt as u64 + 1),
                    ))
                    .await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(user_id, "Quota decrement failed after {} attempts", MAX_QUOTA_RETRIES);
        Err(last_error.unwrap_or_else(|| {
            FirestoreError::PreconditionFailed(format!("quota for {user_id} kept changing"))
        }))
    }
}

fn quota_field_mask() -> Vec<String> {
    ["remaining", "monthly_limit", "reset_date", "updated_at"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn quota_to_fields(quota: &UsageQuota, now: DateTime<Utc>) -> HashMap<String, Value> {
    let mut fields = HashMap::new();
    fields.insert("remaining".to_string(), quota.remaining.to_firestore_value());
    fields.insert(
        "monthly_limit".to_string(),
        quota.monthly_limit.to_firestore_value(),
    );
    fields.insert("reset_date".to_string(), quota.reset_date.to_firestore_value());
    fields.insert("updated_at".to_string(), now.to_firestore_value());
    fields
}

fn document_to_quota(
    doc: &Document,
    user_id: &str,
    default_limit: u32,
    now: DateTime<Utc>,
) -> FirestoreResult<UsageQuota> {
    let monthly_limit = doc.field::<u32>("monthly_limit").unwrap_or(default_limit);
    let remaining = doc.field::<u32>("remaining").ok_or_else(|| {
        FirestoreError::invalid_document(format!("{COLLECTION}/{user_id} has no remaining count"))
    })?;
    let reset_date = doc
        .field::<DateTime<Utc>>("reset_date")
        .unwrap_or(now);

    Ok(UsageQuota {
        user_id: user_id.to_string(),
        remaining,
        monthly_limit,
        reset_date,
    }
    .refreshed(now))
}
