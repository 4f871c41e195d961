//! Mastodon poster implementation
//!
//! Uploads media and creates statuses on Mastodon and other Fediverse servers
//! implementing the Mastodon API, using the megalodon library.

use async_trait::async_trait;
use megalodon::entities::UploadMedia;
use megalodon::megalodon::{PostStatusInputOptions, PostStatusOutput};
use megalodon::{Megalodon, SNS};
use std::io::Cursor;

use crate::error::{PlatformError, Result};
use crate::platforms::Poster;

/// Mastodon destination client
pub struct MastodonPoster {
    /// The megalodon client for API interactions
    client: Box<dyn Megalodon + Send + Sync>,

    /// Normalized server URL (e.g., "https://mastodon.social")
    server_url: String,
}

impl MastodonPoster {
    /// Create a new Mastodon poster
    ///
    /// `server_url` may omit the scheme, in which case `https://` is assumed.
    /// A trailing slash is dropped so recorded URLs stay comparable.
    pub fn new(server_url: String, access_token: String) -> Result<Self> {
        if access_token.trim().is_empty() {
            return Err(
                PlatformError::Authentication("Mastodon access token is empty".to_string()).into(),
            );
        }

        let server_url = normalize_server_url(&server_url);
        let client = megalodon::generator(
            SNS::Mastodon,
            server_url.clone(),
            Some(access_token.trim().to_string()),
            None,
        )
        .map_err(|e| {
            PlatformError::Authentication(format!("Failed to create Mastodon client: {:?}", e))
        })?;

        Ok(Self { client, server_url })
    }
}

#[async_trait]
impl Poster for MastodonPoster {
    async fn upload_media(&self, bytes: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .upload_media_reader(Box::new(Cursor::new(bytes)), None)
            .await
            .map_err(|e| map_megalodon_error(e, "upload media"))?;

        let media_id = match response.json {
            UploadMedia::Attachment(attachment) => attachment.id,
            UploadMedia::AsyncAttachment(attachment) => attachment.id,
        };

        Ok(media_id)
    }

    async fn create_status(&self, text: &str, media_ids: &[String]) -> Result<String> {
        let options = PostStatusInputOptions {
            media_ids: (!media_ids.is_empty()).then(|| media_ids.to_vec()),
            ..Default::default()
        };

        let response = self
            .client
            .post_status(text.to_string(), Some(&options))
            .await
            .map_err(|e| map_megalodon_error(e, "post status"))?;

        // No scheduled_at is sent, so anything but a published status is unexpected
        match response.json {
            PostStatusOutput::Status(status) => Ok(status.id),
            PostStatusOutput::ScheduledStatus(scheduled) => Err(PlatformError::Posting(format!(
                "Mastodon scheduled the status ({}) instead of publishing it",
                scheduled.id
            ))
            .into()),
        }
    }

    fn name(&self) -> &str {
        "mastodon"
    }

    fn server_url(&self) -> &str {
        &self.server_url
    }
}

fn normalize_server_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

/// Map megalodon errors to PlatformError
///
/// - HTTP 401/403 → `PlatformError::Authentication`
/// - HTTP 422 → `PlatformError::Validation` (media or status rejected)
/// - HTTP 429 → `PlatformError::RateLimit`
/// - anything else → `PlatformError::Network`
fn map_megalodon_error(error: megalodon::error::Error, context: &str) -> PlatformError {
    classify_error(&error.to_string(), context)
}

fn classify_error(error_str: &str, context: &str) -> PlatformError {
    let error_lower = error_str.to_lowercase();

    match extract_http_status(error_str) {
        Some(401) | Some(403) => PlatformError::Authentication(format!(
            "Mastodon authentication failed ({}): {}. \
                Suggestion: Verify the mastodonAccessToken is valid and has write scope.",
            context, error_str
        )),
        Some(422) => PlatformError::Validation(format!(
            "Mastodon rejected the request ({}): {}",
            context, error_str
        )),
        Some(429) => PlatformError::RateLimit(format!(
            "Mastodon rate limit exceeded ({}): {}. \
                Suggestion: Run again later; already mirrored posts are not repeated.",
            context, error_str
        )),
        Some(500..=599) => PlatformError::Network(format!(
            "Mastodon server error ({}): {}",
            context, error_str
        )),
        Some(_) => {
            PlatformError::Network(format!("Mastodon HTTP error ({}): {}", context, error_str))
        }
        None if error_lower.contains("unauthorized") || error_lower.contains("forbidden") => {
            PlatformError::Authentication(format!(
                "Mastodon authentication failed ({}): {}",
                context, error_str
            ))
        }
        None if error_lower.contains("rate limit") || error_lower.contains("too many requests") => {
            PlatformError::RateLimit(format!(
                "Mastodon rate limit exceeded ({}): {}",
                context, error_str
            ))
        }
        None => PlatformError::Network(format!(
            "Mastodon error ({}): {}. \
                Suggestion: Check your network connection and server availability.",
            context, error_str
        )),
    }
}

/// Extract an HTTP status code from an error message
///
/// Looks for patterns like "HTTP 401", "status 403", "code: 422" or a bare
/// "429:" not embedded in a longer number.
fn extract_http_status(error_str: &str) -> Option<u16> {
    let prefixes = ["HTTP ", "status ", "code: ", "status_code: "];

    for prefix in &prefixes {
        if let Some(pos) = error_str.find(prefix) {
            let after_prefix = &error_str[pos + prefix.len()..];
            if let Some(code) = after_prefix.get(0..3).and_then(|s| s.parse::<u16>().ok()) {
                if (100..=599).contains(&code) {
                    return Some(code);
                }
            }
        }
    }

    let bytes = error_str.as_bytes();
    for (i, window) in bytes.windows(4).enumerate() {
        let digits = &window[0..3];
        if digits.iter().all(u8::is_ascii_digit)
            && (window[3] == b':' || window[3] == b' ')
            && (i == 0 || !bytes[i - 1].is_ascii_digit())
        {
            let code = std::str::from_utf8(digits).ok()?.parse::<u16>().ok()?;
            if (100..=599).contains(&code) {
                return Some(code);
            }
        }
    }

    None
}
