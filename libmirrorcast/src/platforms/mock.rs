//! Mock poster implementation for testing
//!
//! Records every upload and status creation in call order and can be primed
//! to fail on a given call or to stall, so integration tests can exercise the
//! pipeline's failure and timeout paths without network access. Clones share
//! state, so a test can hand one clone to the pipeline and inspect another.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PlatformError, Result};
use crate::platforms::Poster;

/// One recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosterCall {
    Upload { bytes: Vec<u8> },
    Status { text: String, media_ids: Vec<String> },
}

/// Configuration for mock poster behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Platform name
    pub name: String,

    /// Server URL reported for ledger records
    pub server_url: String,

    /// Fail the n-th upload (1-based) with `error`
    pub fail_upload_at: Option<usize>,

    /// Fail the n-th status creation (1-based) with `error`
    pub fail_status_at: Option<usize>,

    /// Error returned by a primed failure
    pub error: PlatformError,

    /// Delay before completing operations (simulates network latency)
    pub delay: Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            server_url: "https://mock.example".to_string(),
            fail_upload_at: None,
            fail_status_at: None,
            error: PlatformError::Network("Mock network failure".to_string()),
            delay: Duration::from_millis(0),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<PosterCall>,
    uploads: usize,
    statuses: usize,
}

/// Mock poster for testing
#[derive(Clone)]
pub struct MockPoster {
    config: MockConfig,
    state: Arc<Mutex<MockState>>,
}

impl MockPoster {
    /// Create a new mock poster with the given configuration
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Create a mock poster that always succeeds
    pub fn success() -> Self {
        Self::new(MockConfig::default())
    }

    /// Create a mock poster whose n-th upload fails
    pub fn failing_upload(n: usize) -> Self {
        Self::new(MockConfig {
            fail_upload_at: Some(n),
            ..Default::default()
        })
    }

    /// Create a mock poster whose n-th status creation fails
    pub fn failing_status(n: usize) -> Self {
        Self::new(MockConfig {
            fail_status_at: Some(n),
            ..Default::default()
        })
    }

    /// Create a mock poster that waits before answering
    pub fn with_delay(delay: Duration) -> Self {
        Self::new(MockConfig {
            delay,
            ..Default::default()
        })
    }

    /// All calls so far, in order
    pub fn calls(&self) -> Vec<PosterCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn upload_count(&self) -> usize {
        self.state.lock().unwrap().uploads
    }

    pub fn status_count(&self) -> usize {
        self.state.lock().unwrap().statuses
    }

    /// Text of every created status, in creation order
    pub fn status_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PosterCall::Status { text, .. } => Some(text),
                PosterCall::Upload { .. } => None,
            })
            .collect()
    }

    async fn simulate_latency(&self) {
        if !self.config.delay.is_zero() {
            sleep(self.config.delay).await;
        }
    }
}

#[async_trait]
impl Poster for MockPoster {
    async fn upload_media(&self, bytes: Vec<u8>) -> Result<String> {
        self.simulate_latency().await;

        let mut state = self.state.lock().unwrap();
        state.uploads += 1;
        if self.config.fail_upload_at == Some(state.uploads) {
            return Err(self.config.error.clone().into());
        }

        state.calls.push(PosterCall::Upload { bytes });
        Ok(format!("media-{}", state.uploads))
    }

    async fn create_status(&self, text: &str, media_ids: &[String]) -> Result<String> {
        self.simulate_latency().await;

        let mut state = self.state.lock().unwrap();
        state.statuses += 1;
        if self.config.fail_status_at == Some(state.statuses) {
            return Err(self.config.error.clone().into());
        }

        state.calls.push(PosterCall::Status {
            text: text.to_string(),
            media_ids: media_ids.to_vec(),
        });
        Ok(format!("status-{}", state.statuses))
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn server_url(&self) -> &str {
        &self.config.server_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_success_records_calls() {
        let poster = MockPoster::success();

        let media = poster.upload_media(vec![1, 2, 3]).await.unwrap();
        let status = poster
            .create_status("hello", std::slice::from_ref(&media))
            .await
            .unwrap();

        assert_eq!(media, "media-1");
        assert_eq!(status, "status-1");
        assert_eq!(
            poster.calls(),
            vec![
                PosterCall::Upload { bytes: vec![1, 2, 3] },
                PosterCall::Status {
                    text: "hello".to_string(),
                    media_ids: vec!["media-1".to_string()]
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_clones_share_state() {
        let poster = MockPoster::success();
        let observer = poster.clone();

        poster.create_status("a", &[]).await.unwrap();

        assert_eq!(observer.status_count(), 1);
        assert_eq!(observer.status_texts(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_failing_upload() {
        let poster = MockPoster::failing_upload(2);

        assert!(poster.upload_media(vec![]).await.is_ok());
        let err = poster.upload_media(vec![]).await.unwrap_err();
        assert!(err.to_string().contains("Mock network failure"));
        assert!(poster.upload_media(vec![]).await.is_ok());

        assert_eq!(poster.upload_count(), 3);
        assert_eq!(poster.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mock_failing_status() {
        let poster = MockPoster::failing_status(1);

        assert!(poster.create_status("x", &[]).await.is_err());
        assert!(poster.status_texts().is_empty());
    }

    #[tokio::test]
    async fn test_mock_with_delay() {
        let poster = MockPoster::with_delay(Duration::from_millis(50));

        let start = std::time::Instant::now();
        poster.create_status("Test", &[]).await.unwrap();

        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
