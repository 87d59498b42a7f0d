//! Transactional email for job notifications.
//!
//! Renders the completion and failure emails and sends them through an
//! HTTP email API.

pub mod client;
pub mod error;
pub mod templates;

pub use client::{EmailClient, EmailConfig};
pub use error::{NotifyError, NotifyResult};
pub use templates::{CompletionEmail, EmailMessage, FailureEmail};
