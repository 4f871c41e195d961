//! Facebook page feed via the Graph API

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{PlatformError, Result};
use crate::feed::FeedSource;
use crate::types::CandidatePost;

const FEED_FIELDS: &str = "id,message,attachments";

/// Graph API error codes meaning the token is invalid or expired
const AUTH_ERROR_CODES: [i64; 2] = [102, 190];

/// Graph API error codes meaning a call quota was hit
const RATE_LIMIT_ERROR_CODES: [i64; 4] = [4, 17, 32, 613];

#[derive(Debug, Deserialize)]
struct FeedResponse {
    data: Vec<FeedPost>,
}

#[derive(Debug, Deserialize)]
struct FeedPost {
    id: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    attachments: Option<AttachmentList>,
}

#[derive(Debug, Deserialize)]
struct AttachmentList {
    #[serde(default)]
    data: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    #[serde(default)]
    media: Option<Media>,
    #[serde(default)]
    subattachments: Option<AttachmentList>,
}

#[derive(Debug, Deserialize)]
struct Media {
    #[serde(default)]
    image: Option<Image>,
}

#[derive(Debug, Deserialize)]
struct Image {
    src: String,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

impl Attachment {
    /// Albums list their photos as subattachments; the top-level media is
    /// then only the album cover, which repeats the first photo.
    fn image_urls(&self) -> Vec<String> {
        match &self.subattachments {
            Some(sub) if !sub.data.is_empty() => {
                sub.data.iter().flat_map(Attachment::image_urls).collect()
            }
            _ => self
                .media
                .as_ref()
                .and_then(|media| media.image.as_ref())
                .map(|image| vec![image.src.clone()])
                .unwrap_or_default(),
        }
    }
}

impl From<FeedPost> for CandidatePost {
    fn from(post: FeedPost) -> Self {
        let image_urls = post
            .attachments
            .map(|list| list.data.iter().flat_map(Attachment::image_urls).collect())
            .unwrap_or_default();

        CandidatePost {
            id: post.id,
            message: post.message.unwrap_or_default(),
            image_urls,
        }
    }
}

/// Reads a page feed from the Facebook Graph API
pub struct FacebookFeed {
    client: Client,
    graph_api_url: String,
    access_token: String,
}

impl FacebookFeed {
    /// Create a feed reader
    ///
    /// `graph_api_url` is the versioned API root, e.g.
    /// `https://graph.facebook.com/v5.0`.
    pub fn new(graph_api_url: String, access_token: String) -> Self {
        Self {
            client: Client::new(),
            graph_api_url: graph_api_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }
}

#[async_trait]
impl FeedSource for FacebookFeed {
    async fn fetch_posts(&self, page_id: &str) -> Result<Vec<CandidatePost>> {
        let url = format!("{}/{}/feed", self.graph_api_url, page_id);

        // The access token rides in the query string, so transport errors
        // are stripped of their URL before they reach a log line.
        let response = self
            .client
            .get(&url)
            .query(&[("fields", FEED_FIELDS), ("access_token", self.access_token.as_str())])
            .send()
            .await
            .map_err(|e| transport_error(e, "fetch feed"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, "read feed"))?;

        if !status.is_success() {
            return Err(graph_error(status, &body).into());
        }

        let feed = parse_feed(&body)?;
        debug!(page_id, posts = feed.len(), "fetched page feed");
        Ok(feed)
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(e, "download image"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlatformError::Network(format!(
                "Image download failed with HTTP {}",
                status.as_u16()
            ))
            .into());
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, "download image"))?;

        Ok(bytes.to_vec())
    }
}

fn parse_feed(body: &str) -> Result<Vec<CandidatePost>> {
    let feed: FeedResponse = serde_json::from_str(body).map_err(|e| {
        PlatformError::Network(format!("Unexpected Facebook feed response: {}", e))
    })?;

    Ok(feed.data.into_iter().map(CandidatePost::from).collect())
}

fn transport_error(error: reqwest::Error, context: &str) -> PlatformError {
    let error = error.without_url();
    if error.is_timeout() {
        PlatformError::Network(format!("Facebook request timed out ({})", context))
    } else {
        PlatformError::Network(format!("Facebook request failed ({}): {}", context, error))
    }
}

fn graph_error(status: StatusCode, body: &str) -> PlatformError {
    let detail = serde_json::from_str::<GraphErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
    let code = detail.and_then(|e| e.code);

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || code.is_some_and(|c| AUTH_ERROR_CODES.contains(&c))
    {
        PlatformError::Authentication(format!(
            "Facebook rejected the access token: {}. \
                Suggestion: Generate a new page access token.",
            message
        ))
    } else if status == StatusCode::TOO_MANY_REQUESTS
        || code.is_some_and(|c| RATE_LIMIT_ERROR_CODES.contains(&c))
    {
        PlatformError::RateLimit(format!("Facebook rate limit reached: {}", message))
    } else {
        PlatformError::Network(format!(
            "Facebook feed request failed with HTTP {}: {}",
            status.as_u16(),
            message
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_with_photo_attachment() {
        let body = r#"{
            "data": [
                {
                    "id": "100_2",
                    "message": "Fresh bread",
                    "attachments": {"data": [
                        {"media": {"image": {"src": "https://cdn.example/a.jpg", "height": 720, "width": 720}}, "type": "photo"}
                    ]}
                },
                {"id": "100_1", "message": "Opening soon"}
            ],
            "paging": {"next": "https://graph.facebook.com/..."}
        }"#;

        let posts = parse_feed(body).unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "100_2");
        assert_eq!(posts[0].image_urls, vec!["https://cdn.example/a.jpg"]);
        assert_eq!(posts[1].message, "Opening soon");
        assert!(posts[1].image_urls.is_empty());
    }

    #[test]
    fn test_parse_feed_skips_attachments_without_image() {
        let body = r#"{"data": [{
            "id": "1",
            "message": "Read this",
            "attachments": {"data": [{"type": "share", "url": "https://example.com"}]}
        }]}"#;

        let posts = parse_feed(body).unwrap();
        assert!(posts[0].image_urls.is_empty());
    }

    #[test]
    fn test_parse_feed_album_uses_subattachments() {
        let body = r#"{"data": [{
            "id": "1",
            "attachments": {"data": [{
                "media": {"image": {"src": "cover.jpg"}},
                "subattachments": {"data": [
                    {"media": {"image": {"src": "one.jpg"}}},
                    {"media": {"image": {"src": "two.jpg"}}}
                ]}
            }]}
        }]}"#;

        let posts = parse_feed(body).unwrap();

        assert_eq!(posts[0].image_urls, vec!["one.jpg", "two.jpg"]);
        assert_eq!(posts[0].message, "");
    }

    #[test]
    fn test_parse_feed_unexpected_shape() {
        let result = parse_feed(r#"{"posts": []}"#);

        match result {
            Err(crate::MirrorError::Platform(PlatformError::Network(msg))) => {
                assert!(msg.contains("Unexpected"));
            }
            _ => panic!("Expected network error for malformed feed"),
        }
    }

    #[test]
    fn test_graph_error_expired_token() {
        let body = r#"{"error": {"message": "Error validating access token", "type": "OAuthException", "code": 190}}"#;

        let error = graph_error(StatusCode::BAD_REQUEST, body);

        match error {
            PlatformError::Authentication(msg) => assert!(msg.contains("Error validating access token")),
            other => panic!("Expected authentication error, got {:?}", other),
        }
    }

    #[test]
    fn test_graph_error_rate_limit() {
        let body = r#"{"error": {"message": "Application request limit reached", "code": 4}}"#;
        assert!(matches!(
            graph_error(StatusCode::BAD_REQUEST, body),
            PlatformError::RateLimit(_)
        ));
    }

    #[test]
    fn test_graph_error_unparseable_body() {
        let error = graph_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");

        match error {
            PlatformError::Network(msg) => assert!(msg.contains("502")),
            other => panic!("Expected network error, got {:?}", other),
        }
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let feed = FacebookFeed::new("https://graph.facebook.com/v5.0/".to_string(), "t".to_string());
        assert_eq!(feed.graph_api_url, "https://graph.facebook.com/v5.0");
    }
}
