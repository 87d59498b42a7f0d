//! Firestore REST API client.
//!
//! This crate provides:
//! - A Firestore document client with cached service-account tokens
//! - `JobRepository` for the per-user video job records
//! - `UsageQuotaRepository` for the monthly quiz quota with optimistic locking
//! - Retry with exponential backoff and request metrics

pub mod client;
pub mod error;
pub mod job_repo;
pub mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;
pub mod usage_quota;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use job_repo::{FinalMedia, JobRepository};
pub use retry::RetryConfig;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
pub use usage_quota::{QuotaDecrement, UsageQuotaRepository};
