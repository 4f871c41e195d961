//! Source feed abstraction
//!
//! A [`FeedSource`] lists a page's recent posts, newest first, and downloads
//! the images they reference. [`facebook::FacebookFeed`] reads the Facebook
//! Graph API; [`mock::MockFeed`] serves canned posts for tests.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::CandidatePost;

pub mod facebook;

// Mock feed is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Source platform operations used by the mirror pipeline
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Recent posts of `page_id`, newest first
    ///
    /// # Errors
    ///
    /// `PlatformError::Network` on transport failures, non-success responses
    /// or a response body of unexpected shape; `PlatformError::Authentication`
    /// when the access token is rejected.
    async fn fetch_posts(&self, page_id: &str) -> Result<Vec<CandidatePost>>;

    /// Download one image referenced by a post
    async fn download_image(&self, url: &str) -> Result<Vec<u8>>;
}
