//! Mirror pipeline for one account
//!
//! Fetch the page feed, drop posts already in the ledger, and republish the
//! rest oldest first. Each post is recorded in the ledger as soon as its
//! status exists, so an aborted run never repeats the posts it finished.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::db::Ledger;
use crate::entries::Entry;
use crate::error::{PlatformError, Result};
use crate::feed::FeedSource;
use crate::logging::RunLog;
use crate::platforms::Poster;
use crate::types::{CandidatePost, MirrorRecord};

/// Mirrors one configured account
///
/// Borrows everything it works with; the caller owns the ledger and closes
/// it once the run is over, whether it succeeded or not.
pub struct MirrorPipeline<'a> {
    entry: &'a Entry,
    feed: &'a dyn FeedSource,
    poster: &'a dyn Poster,
    ledger: &'a Ledger,
    log: &'a dyn RunLog,
    request_timeout: Duration,
}

impl<'a> MirrorPipeline<'a> {
    pub fn new(
        entry: &'a Entry,
        feed: &'a dyn FeedSource,
        poster: &'a dyn Poster,
        ledger: &'a Ledger,
        log: &'a dyn RunLog,
    ) -> Self {
        Self {
            entry,
            feed,
            poster,
            ledger,
            log,
            request_timeout: entry.request_timeout(),
        }
    }

    /// Override the per-call timeout taken from the entry
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Posts that a run would mirror, oldest first
    ///
    /// Repeated ids within the fetched batch keep their first occurrence.
    /// Nothing is uploaded, posted or recorded.
    pub async fn plan(&self) -> Result<Vec<CandidatePost>> {
        let page_id = self.entry.page_id.as_str();
        let fetched = self
            .within("fetch feed", self.feed.fetch_posts(page_id))
            .await?;
        let fetched_count = fetched.len();

        let mut seen = HashSet::new();
        let unique: Vec<CandidatePost> = fetched
            .into_iter()
            .filter(|post| seen.insert(post.id.clone()))
            .collect();

        let ids: Vec<String> = unique.iter().map(|post| post.id.clone()).collect();
        let existing = self.ledger.existing_ids(&ids).await?;

        let mut pending: Vec<CandidatePost> = unique
            .into_iter()
            .filter(|post| !existing.contains(&post.id))
            .collect();
        pending.reverse();

        debug!(
            page_id,
            fetched = fetched_count,
            already_mirrored = existing.len(),
            pending = pending.len(),
            "planned mirror run"
        );

        Ok(pending)
    }

    /// Report the plan through the run log without touching the destination
    pub async fn dry_run(&self) -> Result<Vec<CandidatePost>> {
        let pending = self.plan().await?;

        self.log.lazy(&|| {
            format!(
                "{}: {} post(s) would be mirrored",
                self.entry.label(),
                pending.len()
            )
        });
        for post in &pending {
            self.log.lazy(&|| {
                format!(
                    "  {} ({} image(s)): {}",
                    post.id,
                    post.image_urls.len(),
                    preview(&post.message)
                )
            });
        }

        Ok(pending)
    }

    /// Mirror every pending post, strictly one after another
    ///
    /// Returns the new ledger records in mirror order. The first error
    /// aborts the run; posts mirrored before it stay recorded.
    pub async fn run(&self) -> Result<Vec<MirrorRecord>> {
        let pending = self.plan().await?;

        self.log.lazy(&|| {
            format!(
                "{}: mirroring {} new post(s)",
                self.entry.label(),
                pending.len()
            )
        });

        let mut records = Vec::with_capacity(pending.len());
        for post in &pending {
            let record = self.mirror_post(post).await?;
            records.push(record);
        }

        Ok(records)
    }

    async fn mirror_post(&self, post: &CandidatePost) -> Result<MirrorRecord> {
        let mut media_ids = Vec::with_capacity(post.image_urls.len());
        for url in &post.image_urls {
            let bytes = self
                .within("download image", self.feed.download_image(url))
                .await?;
            let media_id = self
                .within("upload media", self.poster.upload_media(bytes))
                .await?;
            media_ids.push(media_id);
        }

        let status_id = self
            .within(
                "create status",
                self.poster.create_status(&post.message, &media_ids),
            )
            .await?;

        let record = MirrorRecord::new(
            post.id.clone(),
            self.entry.page_id.clone(),
            status_id,
            self.poster.server_url().to_string(),
        );

        if let Err(e) = self.ledger.add_record(&record).await {
            warn!(
                source_id = %record.source_id,
                destination_post_id = %record.destination_post_id,
                "status created but not recorded: {}",
                e
            );
            return Err(e);
        }

        debug!(
            page_id = %record.page_id,
            source_id = %record.source_id,
            destination_post_id = %record.destination_post_id,
            media = media_ids.len(),
            destination = self.poster.name(),
            "mirrored post"
        );

        Ok(record)
    }

    async fn within<T, F>(&self, action: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Network(format!(
                "{} timed out after {}ms",
                action,
                self.request_timeout.as_millis()
            ))
            .into()),
        }
    }
}

fn preview(message: &str) -> String {
    const MAX_CHARS: usize = 60;

    let first_line = message.lines().next().unwrap_or("");
    if first_line.chars().count() > MAX_CHARS {
        let cut: String = first_line.chars().take(MAX_CHARS).collect();
        format!("{}...", cut)
    } else {
        first_line.to_string()
    }
}
