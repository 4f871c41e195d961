//! Destination platform abstraction
//!
//! A [`Poster`] is the narrow surface the mirror pipeline needs from the
//! destination: upload one media file, then create one status referencing the
//! uploaded media. Mastodon (and every Fediverse server speaking its API) is
//! implemented in [`mastodon`]; [`mock`] records calls for tests.
//!
//! # Examples
//!
//! ```no_run
//! use libmirrorcast::platforms::{mastodon::MastodonPoster, Poster};
//!
//! # async fn example(image: Vec<u8>) -> libmirrorcast::error::Result<()> {
//! let poster = MastodonPoster::new(
//!     "https://mastodon.social".to_string(),
//!     "your-access-token".to_string(),
//! )?;
//!
//! let media_id = poster.upload_media(image).await?;
//! let status_id = poster.create_status("Fresh bread today", &[media_id]).await?;
//! println!("Posted: {}", status_id);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;

use crate::error::Result;

pub mod mastodon;

// Mock poster is available for all builds (not just tests) to support integration tests
pub mod mock;

/// Destination platform operations used by the mirror pipeline
#[async_trait]
pub trait Poster: Send + Sync {
    /// Upload one media file and return the platform's media id
    ///
    /// # Errors
    ///
    /// - `PlatformError::Network` for transport failures and server errors
    /// - `PlatformError::Authentication` for rejected credentials
    /// - `PlatformError::Validation` if the platform rejects the file
    async fn upload_media(&self, bytes: Vec<u8>) -> Result<String>;

    /// Create a status with the given text and already uploaded media
    ///
    /// `media_ids` keeps the order the images should appear in. Returns the
    /// platform's id for the new status.
    async fn create_status(&self, text: &str, media_ids: &[String]) -> Result<String>;

    /// Lowercase platform identifier (e.g. "mastodon")
    fn name(&self) -> &str;

    /// Base URL recorded alongside each mirrored post
    fn server_url(&self) -> &str;
}
