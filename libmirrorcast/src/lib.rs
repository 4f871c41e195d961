//! Mirrorcast - mirror Facebook page posts to Mastodon
//!
//! This library reads a page's recent posts from the Facebook Graph API,
//! republishes the ones not seen before as Mastodon statuses (images
//! included), and records each mirror in a per-account SQLite ledger so
//! repeated runs never post twice.

pub mod config;
pub mod db;
pub mod entries;
pub mod error;
pub mod feed;
pub mod logging;
pub mod pipeline;
pub mod platforms;
pub mod runner;
pub mod types;

// Re-export commonly used types
pub use db::Ledger;
pub use entries::Entry;
pub use error::{MirrorError, Result};
pub use pipeline::MirrorPipeline;
pub use runner::{run_entries, ClientFactory, HttpClientFactory, RunReport};
pub use types::{CandidatePost, MirrorRecord};
