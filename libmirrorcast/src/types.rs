//! Core types for Mirrorcast

use serde::{Deserialize, Serialize};

/// A post as returned by the source feed, newest first.
///
/// Produced fresh on every run and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePost {
    /// Source post id, unique within the source page
    pub id: String,
    /// Post text; empty when the source post carries no message
    pub message: String,
    /// Attached image URLs, in the order the source lists them
    pub image_urls: Vec<String>,
}

impl CandidatePost {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            image_urls: Vec::new(),
        }
    }

    pub fn with_images<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_urls = urls.into_iter().map(Into::into).collect();
        self
    }
}

/// One ledger row: a source post and the destination status mirroring it.
///
/// Written once, right after the mirror succeeds, and never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct MirrorRecord {
    pub source_id: String,
    pub page_id: String,
    pub destination_post_id: String,
    pub destination_server_url: String,
    /// Unix timestamp of the ledger write
    pub mirrored_at: i64,
}

impl MirrorRecord {
    pub fn new(
        source_id: String,
        page_id: String,
        destination_post_id: String,
        destination_server_url: String,
    ) -> Self {
        Self {
            source_id,
            page_id,
            destination_post_id,
            destination_server_url,
            mirrored_at: chrono::Utc::now().timestamp(),
        }
    }
}
