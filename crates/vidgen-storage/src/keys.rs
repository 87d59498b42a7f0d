//! Object key and public URL construction.

use vidgen_models::JobId;

/// Longest title slug kept in a key.
const MAX_SLUG_LEN: usize = 48;

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else collapse
/// to a single `-`, trimmed and truncated.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "video".to_string()
    } else {
        slug.to_string()
    }
}

/// `videos/<user_id>/<job_id>-<slug>.mp4`
pub fn video_key(user_id: &str, job_id: &JobId, title: &str) -> String {
    format!("videos/{}/{}-{}.mp4", user_id, job_id, slugify(title))
}

/// Public URL for an object under the bucket's public base URL.
pub fn public_url(public_base_url: &str, key: &str) -> String {
    format!("{}/{}", public_base_url.trim_end_matches('/'), key)
}
