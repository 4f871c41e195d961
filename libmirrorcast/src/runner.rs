//! Batch runner over configured accounts
//!
//! Accounts run one at a time in configuration order. Each gets its own
//! ledger handle, opened before and closed after its pipeline. A failing
//! account is reported and the batch moves on.

use tracing::{error, info};

use crate::db::Ledger;
use crate::entries::Entry;
use crate::error::{MirrorError, Result};
use crate::feed::facebook::FacebookFeed;
use crate::feed::FeedSource;
use crate::logging::RunLog;
use crate::pipeline::MirrorPipeline;
use crate::platforms::mastodon::MastodonPoster;
use crate::platforms::Poster;
use crate::types::{CandidatePost, MirrorRecord};

/// Builds the source and destination clients for an entry
pub trait ClientFactory: Send + Sync {
    fn feed(&self, entry: &Entry) -> Result<Box<dyn FeedSource>>;
    fn poster(&self, entry: &Entry) -> Result<Box<dyn Poster>>;
}

/// Facebook Graph API feed and Mastodon poster
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpClientFactory;

impl ClientFactory for HttpClientFactory {
    fn feed(&self, entry: &Entry) -> Result<Box<dyn FeedSource>> {
        Ok(Box::new(FacebookFeed::new(
            entry.graph_api_url.clone(),
            entry.facebook_access_token.clone(),
        )))
    }

    fn poster(&self, entry: &Entry) -> Result<Box<dyn Poster>> {
        Ok(Box::new(MastodonPoster::new(
            entry.mastodon_server_url.clone(),
            entry.mastodon_access_token.clone(),
        )?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Upload, post and record
    Mirror,
    /// Only report what would be mirrored
    DryRun,
}

/// An account that finished its run
#[derive(Debug)]
pub struct AccountSuccess {
    pub name: String,
    /// New ledger records, in mirror order (empty for dry runs)
    pub records: Vec<MirrorRecord>,
    /// Posts a dry run would mirror (empty for real runs)
    pub planned: Vec<CandidatePost>,
}

/// An account whose run stopped on an error
#[derive(Debug)]
pub struct AccountFailure {
    pub name: String,
    pub error: MirrorError,
}

/// Outcome of a batch
#[derive(Debug, Default)]
pub struct RunReport {
    pub successes: Vec<AccountSuccess>,
    pub failures: Vec<AccountFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn mirrored_count(&self) -> usize {
        self.successes.iter().map(|s| s.records.len()).sum()
    }

    /// 0 when every account succeeded, else the highest failure code
    pub fn exit_code(&self) -> i32 {
        self.failures
            .iter()
            .map(|f| f.error.exit_code())
            .max()
            .unwrap_or(0)
    }
}

/// Mirror every entry
pub async fn run_entries(
    entries: &[Entry],
    clients: &dyn ClientFactory,
    log: &dyn RunLog,
) -> RunReport {
    process_entries(entries, clients, log, RunMode::Mirror).await
}

/// Plan every entry without posting
pub async fn plan_entries(
    entries: &[Entry],
    clients: &dyn ClientFactory,
    log: &dyn RunLog,
) -> RunReport {
    process_entries(entries, clients, log, RunMode::DryRun).await
}

pub async fn process_entries(
    entries: &[Entry],
    clients: &dyn ClientFactory,
    log: &dyn RunLog,
    mode: RunMode,
) -> RunReport {
    let mut report = RunReport::default();

    for entry in entries {
        let name = entry.label().to_string();
        info!(account = %name, page_id = %entry.page_id, ?mode, "starting account");

        match process_entry(entry, clients, log, mode).await {
            Ok(success) => {
                if mode == RunMode::Mirror {
                    report_success(log, &success);
                }
                report.successes.push(success);
            }
            Err(e) => {
                error!(account = %name, "account run failed: {}", e);
                log.lazy(&|| format!("Failed for {}: {}", name, e));
                report.failures.push(AccountFailure { name, error: e });
            }
        }
    }

    if !report.failures.is_empty() {
        log.lazy(&|| format!("{} account(s) failed:", report.failures.len()));
        for failure in &report.failures {
            log.lazy(&|| format!("  {}: {}", failure.name, failure.error));
        }
    }

    info!(
        succeeded = report.successes.len(),
        failed = report.failures.len(),
        mirrored = report.mirrored_count(),
        "batch finished"
    );

    report
}

async fn process_entry(
    entry: &Entry,
    clients: &dyn ClientFactory,
    log: &dyn RunLog,
    mode: RunMode,
) -> Result<AccountSuccess> {
    let feed = clients.feed(entry)?;
    let poster = clients.poster(entry)?;
    let ledger = Ledger::open(&entry.ledger_dir(), &entry.db_name).await?;

    let pipeline = MirrorPipeline::new(entry, feed.as_ref(), poster.as_ref(), &ledger, log);
    let outcome = match mode {
        RunMode::Mirror => pipeline.run().await.map(|records| (records, Vec::new())),
        RunMode::DryRun => pipeline.dry_run().await.map(|planned| (Vec::new(), planned)),
    };

    ledger.close().await;

    let (records, planned) = outcome?;
    Ok(AccountSuccess {
        name: entry.label().to_string(),
        records,
        planned,
    })
}

fn report_success(log: &dyn RunLog, success: &AccountSuccess) {
    log.lazy(&|| format!("All done for {}", success.name));
    for record in &success.records {
        log.lazy(&|| {
            format!(
                "  {} / {}",
                record.source_id, record.destination_post_id
            )
        });
    }
}
