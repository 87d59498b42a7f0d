//! Completion and failure email bodies.

use serde::Serialize;

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Sent when a video is ready.
#[derive(Debug, Clone)]
pub struct CompletionEmail<'a> {
    pub recipient: &'a str,
    pub title: &'a str,
    pub duration_seconds: f64,
    /// Link to the user's video library
    pub library_url: &'a str,
    /// Direct link to the rendered file
    pub video_url: &'a str,
}

impl CompletionEmail<'_> {
    pub fn render(&self) -> EmailMessage {
        let title = escape_html(self.title);
        let html = format!(
            "<h2>Your video is ready</h2>\
             <p><strong>{title}</strong> ({duration}) has finished rendering.</p>\
             <p><a href=\"{library}\">Open your library</a> or \
             <a href=\"{video}\">download the video</a>.</p>",
            duration = format_duration(self.duration_seconds),
            library = escape_html(self.library_url),
            video = escape_html(self.video_url),
        );
        EmailMessage {
            to: self.recipient.to_string(),
            subject: format!("Your video \"{}\" is ready", self.title),
            html,
        }
    }
}

/// Sent when a job fails after acceptance.
#[derive(Debug, Clone)]
pub struct FailureEmail<'a> {
    pub recipient: &'a str,
    pub title: &'a str,
    pub reason: &'a str,
}

impl FailureEmail<'_> {
    /// Title shown to the user, marked as failed.
    pub fn failed_title(&self) -> String {
        format!("{} (failed)", self.title)
    }

    pub fn render(&self) -> EmailMessage {
        let title = self.failed_title();
        let html = format!(
            "<h2>We couldn't finish your video</h2>\
             <p><strong>{}</strong></p>\
             <p>Something went wrong while rendering: {}</p>\
             <p>Please try again in a few minutes.</p>",
            escape_html(&title),
            escape_html(self.reason),
        );
        EmailMessage {
            to: self.recipient.to_string(),
            subject: format!("Video generation failed: {title}"),
            html,
        }
    }
}

/// `m:ss` for display.
fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
