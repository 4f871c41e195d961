//! mirror-run - Mirror Facebook page posts to Mastodon

use clap::Parser;
use libmirrorcast::config::{load_entries, resolve_config_path};
use libmirrorcast::logging::{LogFormat, LoggingConfig, RunLog};
use libmirrorcast::runner::{plan_entries, run_entries};
use libmirrorcast::{HttpClientFactory, Result};

#[derive(Parser, Debug)]
#[command(name = "mirror-run")]
#[command(version, about = "Mirror Facebook page posts to Mastodon")]
#[command(long_about = r#"Mirror Facebook page posts to Mastodon, one account at a time.

Every account listed in the configuration file gets its recent page posts
fetched; posts not yet in the account's ledger are posted to Mastodon,
oldest first, images included. Running again only mirrors what is new.

EXAMPLES:
    # Mirror every configured account
    mirror-run --conf ~/.config/mirrorcast/config.json

    # See what would be mirrored, without posting
    mirror-run --conf config.json --dry-run

    # Structured logs for a scheduler
    mirror-run --log-format json

EXIT CODES:
    0 - Every account mirrored successfully
    1 - An account failed (network, storage, rejected content)
    2 - Authentication failed for an account
    3 - Invalid configuration (missing keys in an entry)
"#)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "PATH", env = "MIRRORCAST_CONFIG")]
    conf: Option<String>,

    /// Report what would be mirrored without posting or recording
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log output format
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json", "pretty"])]
    log_format: String,
}

/// Prints run report lines on stdout
struct StdoutLog;

impl RunLog for StdoutLog {
    fn line(&self, line: &str) {
        println!("{}", line);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let format = cli.log_format.parse().unwrap_or(LogFormat::Text);
    LoggingConfig::new(format, "warn".to_string(), cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = resolve_config_path(cli.conf.as_deref())?;
    tracing::debug!(path = %config_path.display(), "loading configuration");

    let entries = load_entries(&config_path)?;

    let report = if cli.dry_run {
        plan_entries(&entries, &HttpClientFactory, &StdoutLog).await
    } else {
        run_entries(&entries, &HttpClientFactory, &StdoutLog).await
    };

    Ok(report.exit_code())
}
