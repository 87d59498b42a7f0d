//! Cloudflare R2 storage client.
//!
//! Uploads rendered videos, confirms their stored size and builds the
//! public URL and object key for a job.

pub mod client;
pub mod error;
pub mod keys;

pub use client::{R2Client, R2Config, UploadedObject};
pub use error::{StorageError, StorageResult};
pub use keys::{public_url, slugify, video_key};
