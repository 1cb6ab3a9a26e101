use clap::{Parser, Subcommand};

use copilotdw::storage::repository;
use copilotdw::{CopilotDW, Database, Metric, Settings};

#[derive(Parser)]
#[command(name = "copilotdw", about = "GitHub Copilot usage metrics warehouse CLI")]
struct Cli {
    /// Database path (default: ~/.copilotdw/copilotdw.db)
    #[arg(long)]
    db: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// GitHub organization (overrides COPILOT_ORGANIZATION and stored config)
    #[arg(long, global = true)]
    org: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Progress reporter that writes to stderr.
struct StderrProgress;

impl copilotdw::SyncProgress for StderrProgress {
    fn on_snapshot_fetched(&self, organization: &str, count: usize) {
        eprintln!("Fetched {count} days of usage for {organization}");
    }

    fn on_watermark(&self, _organization: &str, watermark: Option<chrono::NaiveDate>) {
        match watermark {
            Some(day) => eprintln!("  Last stored day: {day}"),
            None => eprintln!("  No stored days yet"),
        }
    }

    fn on_chunk_inserted(&self, _organization: &str, index: usize, total: usize, size: usize) {
        eprintln!("  [{index}/{total}] Inserted {size} days");
    }

    fn on_complete(&self, report: &copilotdw::SyncReport) {
        eprintln!("  Done: {} new days synced", report.items_synced);
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the usage snapshot and store days not seen before
    Sync,
    /// Run the daily sync schedule until interrupted
    Serve {
        /// Hour of the daily run (UTC)
        #[arg(long, default_value = "2")]
        hour: u32,
        /// Minute of the daily run (UTC)
        #[arg(long, default_value = "0")]
        minute: u32,
        /// Abort a run after this many seconds
        #[arg(long, default_value = "600")]
        timeout_secs: u64,
        /// Delay before the first run is scheduled, in seconds
        #[arg(long, default_value = "60")]
        initial_delay_secs: u64,
    },
    /// Show stored metrics for a date range or named period
    Metrics {
        /// Start date (YYYY-MM-DD)
        #[arg(long, requires = "end", conflicts_with = "period")]
        start: Option<String>,
        /// End date (YYYY-MM-DD)
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Named period: 2024, 2024-Q1, 2024-01, 2024-W05, 30d, ytd, qtd, mtd
        #[arg(long)]
        period: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the earliest and latest stored day
    Range {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show warehouse status
    Status,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a config value
    Get { key: String },
    /// Set a config value
    Set { key: String, value: String },
    /// List all config values
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Commands::Serve { .. });
    let level = match (cli.verbose, serving) {
        (0, false) => "warn",
        (0, true) | (1, _) => "info",
        (2, _) => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let db = match &cli.db {
        Some(path) => Database::open_at(path).await?,
        None => Database::open().await?,
    };

    match cli.command {
        Commands::Status => {
            print_status(&db, cli.org.as_deref()).await?;
        }
        Commands::Config { action } => {
            handle_config(&db, action).await?;
        }
        Commands::Range { json } => {
            let range = copilotdw::QueryService::new(&db).get_available_range().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&range)?);
            } else {
                match range {
                    Some(r) => println!("{} .. {}", r.min, r.max),
                    None => println!("No metrics stored yet."),
                }
            }
        }
        Commands::Metrics {
            start,
            end,
            period,
            json,
        } => {
            let service = copilotdw::QueryService::new(&db);
            let metrics = match (start, end, period) {
                (Some(start), Some(end), _) => service.get_by_period(&start, &end).await?,
                (_, _, Some(period)) => service.get_by_named_period(&period).await?,
                _ => anyhow::bail!("either --start and --end, or --period, is required"),
            };
            print_metrics(&metrics, json)?;
        }
        Commands::Sync => {
            let settings = Settings::resolve(&db, cli.org.as_deref()).await?;
            let dw = CopilotDW::from_settings(db, &settings)?;
            let report = dw.sync(&StderrProgress).await?;
            if let Some(err) = &report.error {
                anyhow::bail!("sync {}: {err}", report.status_str());
            }
        }
        Commands::Serve {
            hour,
            minute,
            timeout_secs,
            initial_delay_secs,
        } => {
            let settings = Settings::resolve(&db, cli.org.as_deref()).await?;
            let dw = CopilotDW::from_settings(db, &settings)?;
            let schedule = copilotdw::Schedule {
                hour,
                minute,
                timeout: std::time::Duration::from_secs(timeout_secs),
                initial_delay: std::time::Duration::from_secs(initial_delay_secs),
                ..Default::default()
            };
            if schedule.next_run_after(chrono::Utc::now()).is_none() {
                anyhow::bail!("invalid schedule time {hour:02}:{minute:02}");
            }
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    log::error!("Failed to listen for Ctrl-C: {e}");
                    std::future::pending::<()>().await;
                }
            };
            copilotdw::scheduler::run_scheduled(dw, schedule, shutdown).await;
        }
    }

    Ok(())
}

async fn print_status(db: &Database, cli_org: Option<&str>) -> anyhow::Result<()> {
    let organization = match Settings::resolve(db, cli_org).await {
        Ok(settings) => Some(settings.organization),
        Err(e) => {
            log::debug!("Settings unavailable: {e}");
            match cli_org {
                Some(org) => Some(org.to_string()),
                None => {
                    db.reader()
                        .call(|conn| {
                            repository::get_config(conn, repository::STORE_ORGANIZATION_KEY)
                        })
                        .await?
                }
            }
        }
    };
    let status = copilotdw::warehouse_status(db, organization.as_deref()).await?;

    println!("Warehouse Status");
    println!(
        "  Organization: {}",
        status.organization.as_deref().unwrap_or("(not configured)")
    );
    println!("  Stored days:  {}", status.stored_days);
    match status.range {
        Some(r) => println!("  Range:        {} .. {}", r.min, r.max),
        None => println!("  Range:        (empty)"),
    }
    println!(
        "  Last sync:    {}",
        status.last_sync.as_deref().unwrap_or("never")
    );
    Ok(())
}

fn print_metrics(metrics: &[Metric], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(metrics)?);
        return Ok(());
    }

    if metrics.is_empty() {
        println!("No metrics in range.");
        return Ok(());
    }

    println!(
        "{:<12} {:>12} {:>12} {:>8} {:>8} {:>10}",
        "Day", "Suggestions", "Acceptances", "Users", "Chat", "ChatTurns"
    );
    for m in metrics {
        println!(
            "{:<12} {:>12} {:>12} {:>8} {:>8} {:>10}",
            m.day.to_string(),
            m.total_suggestions_count,
            m.total_acceptances_count,
            m.total_active_users,
            m.total_active_chat_users,
            m.total_chat_turns
        );
    }

    let summary = copilotdw::summarize(metrics);
    println!();
    println!("Days:             {}", summary.days);
    println!(
        "Acceptance rate:  {}",
        fmt_pct(summary.acceptance_rate_pct)
    );
    println!(
        "Lines accepted:   {}",
        fmt_pct(summary.lines_acceptance_rate_pct)
    );
    println!("Peak active users: {}", summary.peak_active_users);
    Ok(())
}

fn fmt_pct(v: Option<f64>) -> String {
    v.map(|p| format!("{p:.1}%")).unwrap_or_else(|| "n/a".into())
}

async fn handle_config(db: &Database, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let val: Option<String> = db
                .reader()
                .call({
                    let key = key.clone();
                    move |conn| repository::get_config(conn, &key)
                })
                .await?;
            match val {
                Some(v) => println!("{key} = {}", display_value(&key, &v)),
                None => println!("{key} is not set"),
            }
        }
        ConfigAction::Set { key, value } => {
            db.writer()
                .call(move |conn| repository::set_config(conn, &key, &value))
                .await?;
            println!("Config updated.");
        }
        ConfigAction::List => {
            let items: Vec<(String, String)> =
                db.reader().call(|conn| repository::list_config(conn)).await?;
            if items.is_empty() {
                println!("No configuration set.");
            } else {
                for (k, v) in items {
                    println!("{k} = {}", display_value(&k, &v));
                }
            }
        }
    }
    Ok(())
}

/// Mask secrets when echoing config back.
fn display_value(key: &str, value: &str) -> String {
    if key == "token" {
        let tail: String = value.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("****{tail}")
    } else {
        value.to_string()
    }
}
