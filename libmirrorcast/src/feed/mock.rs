//! Mock feed implementation for testing
//!
//! Serves a configurable list of posts (newest first) and fake image bytes.
//! Clones share state, so a test can change the feed between two runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::feed::FeedSource;
use crate::types::CandidatePost;

#[derive(Debug, Default)]
struct MockFeedState {
    posts: Vec<CandidatePost>,
    images: HashMap<String, Vec<u8>>,
    failing_images: Vec<String>,
    fetch_error: Option<PlatformError>,
    fetch_count: usize,
    downloads: Vec<String>,
}

/// Mock feed for testing
#[derive(Clone, Default)]
pub struct MockFeed {
    state: Arc<Mutex<MockFeedState>>,
    delay: Duration,
}

impl MockFeed {
    /// Feed returning `posts` as given (newest first)
    pub fn new(posts: Vec<CandidatePost>) -> Self {
        let feed = Self::default();
        feed.set_posts(posts);
        feed
    }

    /// Feed whose fetch always fails
    pub fn failing(error: PlatformError) -> Self {
        let feed = Self::default();
        feed.state.lock().unwrap().fetch_error = Some(error);
        feed
    }

    /// Feed that waits before every answer
    pub fn with_delay(posts: Vec<CandidatePost>, delay: Duration) -> Self {
        let mut feed = Self::new(posts);
        feed.delay = delay;
        feed
    }

    pub fn set_posts(&self, posts: Vec<CandidatePost>) {
        self.state.lock().unwrap().posts = posts;
    }

    /// Serve `bytes` for `url`; unknown URLs serve the URL's own bytes
    pub fn set_image(&self, url: &str, bytes: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .images
            .insert(url.to_string(), bytes);
    }

    /// Make downloads of `url` fail with a network error
    pub fn fail_image(&self, url: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_images
            .push(url.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetch_count
    }

    /// Every downloaded URL, in order
    pub fn downloads(&self) -> Vec<String> {
        self.state.lock().unwrap().downloads.clone()
    }

    async fn simulate_latency(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn fetch_posts(&self, _page_id: &str) -> Result<Vec<CandidatePost>> {
        self.simulate_latency().await;

        let mut state = self.state.lock().unwrap();
        state.fetch_count += 1;
        if let Some(error) = &state.fetch_error {
            return Err(error.clone().into());
        }
        Ok(state.posts.clone())
    }

    async fn download_image(&self, url: &str) -> Result<Vec<u8>> {
        self.simulate_latency().await;

        let mut state = self.state.lock().unwrap();
        state.downloads.push(url.to_string());
        if state.failing_images.iter().any(|failing| failing == url) {
            return Err(PlatformError::Network(format!("Mock download failed: {}", url)).into());
        }

        Ok(state
            .images
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.as_bytes().to_vec()))
    }
}
