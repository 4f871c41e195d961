use anyhow::{bail, Context, Result};
use clap::Parser;
use libmirrorcast::config::{load_entries, resolve_config_path};
use libmirrorcast::{Entry, Ledger, MirrorRecord};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "mirror-history")]
#[command(version, about = "Query the mirror ledgers")]
#[command(long_about = r#"List what has been mirrored, newest first, for every configured account.

EXAMPLES:
    # Show the last 20 mirrored posts of every account (default)
    mirror-history --conf config.json

    # One account only
    mirror-history --entry bakery --limit 50

    # JSON output for scripting
    mirror-history --format json | jq '.[] | .destination_post_id'

    # JSONL output (one JSON object per line)
    mirror-history --format jsonl

    # Export to CSV for analysis
    mirror-history --format csv > mirrored.csv

OUTPUT FORMATS:
    text  - Human-readable text grouped by account (default)
    json  - JSON array
    jsonl - JSON lines, one object per line (streaming-friendly)
    csv   - CSV with headers (spreadsheet-compatible)

EXIT CODES:
    0 - Success (including empty results)
    1 - Error (configuration invalid, unknown entry, query failed, etc.)
"#)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "PATH", env = "MIRRORCAST_CONFIG")]
    conf: Option<String>,

    /// Only show this account (entry name, or page id for unnamed entries)
    #[arg(short, long, value_name = "NAME")]
    entry: Option<String>,

    /// Maximum number of records per account
    #[arg(short, long, default_value = "20", value_name = "N")]
    limit: usize,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json", "jsonl", "csv"])]
    format: String,
}

/// One ledger row, tagged with its account
#[derive(Debug, Serialize)]
struct HistoryRow {
    account: String,
    #[serde(flatten)]
    record: MirrorRecord,
}

/// Read the newest records of every selected account
///
/// Accounts whose ledger file does not exist yet have no history; the file
/// is not created.
async fn query_history(entries: &[Entry], limit: usize) -> Result<Vec<HistoryRow>> {
    let mut rows = Vec::new();

    for entry in entries {
        let dir = entry.ledger_dir();
        if !dir.join(&entry.db_name).exists() {
            tracing::debug!(account = entry.label(), "no ledger yet");
            continue;
        }

        let ledger = Ledger::open(&dir, &entry.db_name)
            .await
            .with_context(|| format!("Failed to open ledger for {}", entry.label()))?;
        let records = ledger.list_records(limit).await;
        ledger.close().await;

        let records =
            records.with_context(|| format!("Failed to query ledger for {}", entry.label()))?;
        rows.extend(records.into_iter().map(|record| HistoryRow {
            account: entry.label().to_string(),
            record,
        }));
    }

    Ok(rows)
}

fn select_entries(entries: Vec<Entry>, name: Option<&str>) -> Result<Vec<Entry>> {
    let Some(name) = name else {
        return Ok(entries);
    };

    let selected: Vec<Entry> = entries
        .into_iter()
        .filter(|entry| entry.label() == name)
        .collect();

    if selected.is_empty() {
        bail!("No entry named '{}' in the configuration", name);
    }

    Ok(selected)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn print_rows(rows: &[HistoryRow], format: &str) -> Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(rows)?);
        }
        "jsonl" => {
            for row in rows {
                println!("{}", serde_json::to_string(row)?);
            }
        }
        "csv" => {
            println!("account,source_id,page_id,destination_post_id,destination_server_url,mirrored_at");
            for row in rows {
                println!(
                    "{},{},{},{},{},{}",
                    csv_field(&row.account),
                    csv_field(&row.record.source_id),
                    csv_field(&row.record.page_id),
                    csv_field(&row.record.destination_post_id),
                    csv_field(&row.record.destination_server_url),
                    row.record.mirrored_at
                );
            }
        }
        _ => {
            let mut current: Option<&str> = None;
            for row in rows {
                if current != Some(row.account.as_str()) {
                    if current.is_some() {
                        println!();
                    }
                    println!("{}", row.account);
                    current = Some(row.account.as_str());
                }

                let timestamp = chrono::DateTime::from_timestamp(row.record.mirrored_at, 0)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| row.record.mirrored_at.to_string());

                println!(
                    "  {} | {} -> {}/{}",
                    timestamp,
                    row.record.source_id,
                    row.record.destination_server_url,
                    row.record.destination_post_id
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("mirror-history started with args: {:?}", args);

    let config_path = resolve_config_path(args.conf.as_deref())?;
    let entries = load_entries(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let entries = select_entries(entries, args.entry.as_deref())?;

    let rows = query_history(&entries, args.limit).await?;
    print_rows(&rows, &args.format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_quotes_when_needed() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
