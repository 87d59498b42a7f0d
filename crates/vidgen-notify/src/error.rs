//! Notification error types.

use thiserror::Error;

pub type NotifyResult<T> = Result<T, NotifyError>;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Email API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl NotifyError {
    pub fn rejected(status: u16, body: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            body: body.into(),
        }
    }
}
