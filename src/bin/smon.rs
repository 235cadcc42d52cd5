use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use site_monitor::cli::check::CheckConfig;
use site_monitor::cli::feeds::{FeedAction, FeedsConfig};
use site_monitor::cli::games::GamesConfig;
use site_monitor::config::CheckMode;
use site_monitor::database_ops::models::GameFilter;
use site_monitor::logging::{init_tracing, DEFAULT_FILTER};
use site_monitor::util::env;

#[derive(Parser, Debug)]
#[command(name = "smon", version, about = "Sitemap monitor and cross-platform game tracker")]
struct Cli {
    /// Optional override for the database URL
    #[arg(long, global = true)]
    db_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Check every registered feed once and resolve new games
    Check {
        /// sequential or concurrent (defaults to CHECK_MODE)
        #[arg(long)]
        mode: Option<CheckMode>,
        /// Pause between feeds in sequential mode
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Feeds per group in concurrent mode
        #[arg(long)]
        group_size: Option<usize>,
        /// Per-feed timeout
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Check at most this many feeds
        #[arg(long)]
        max_feeds: Option<usize>,
        /// Print the batch report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Manage monitored sitemaps
    Feeds {
        #[command(subcommand)]
        action: FeedsCommand,
        #[arg(long, default_value_t = false, global = true)]
        json: bool,
    },
    /// Classify URLs offline and print the extracted names
    Classify {
        #[arg(required = true)]
        urls: Vec<String>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List tracked games, best score first
    Games {
        #[arg(long)]
        min_platforms: Option<i32>,
        /// Only games hosted on this domain
        #[arg(long)]
        domain: Option<String>,
        /// Case-insensitive name substring
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        offset: Option<i64>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Catalogue totals
    Stats {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Apply bundled schema migrations
    Migrate,
    /// Delete update logs older than the retention window
    CleanLogs {
        /// Defaults to LOG_RETENTION_DAYS (30)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum FeedsCommand {
    /// Registered feeds in creation order
    List,
    /// Check a sitemap once and start monitoring it
    Add { url: String },
    /// Stop monitoring a sitemap; history is kept
    Remove { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("smon");
    let _ = init_tracing(DEFAULT_FILTER);

    if std::env::var_os("SMON_LIST_SUBCOMMANDS").is_some() {
        let names: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|cmd| cmd.get_name().to_string())
            .collect();
        eprintln!("available subcommands: {:?}", names);
        return Ok(());
    }

    let cli = Cli::parse();
    let db_url = cli.db_url;

    match cli.command {
        Commands::Check {
            mode,
            delay_ms,
            group_size,
            timeout_secs,
            max_feeds,
            json,
        } => {
            use site_monitor::cli::check::run;
            let cfg = CheckConfig {
                database_url: db_url,
                mode,
                delay_ms,
                group_size,
                timeout_secs,
                max_feeds,
                json,
            };
            run(cfg).await?;
        }
        Commands::Feeds { action, json } => {
            use site_monitor::cli::feeds::run;
            let action = match action {
                FeedsCommand::List => FeedAction::List,
                FeedsCommand::Add { url } => FeedAction::Add(url),
                FeedsCommand::Remove { url } => FeedAction::Remove(url),
            };
            run(FeedsConfig {
                database_url: db_url,
                action,
                json,
            })
            .await?;
        }
        Commands::Classify { urls, json } => {
            site_monitor::cli::games::run_classify(&urls, json)?;
        }
        Commands::Games {
            min_platforms,
            domain,
            search,
            limit,
            offset,
            json,
        } => {
            use site_monitor::cli::games::run;
            let cfg = GamesConfig {
                database_url: db_url,
                filter: GameFilter {
                    min_platforms,
                    domain,
                    search,
                    limit,
                    offset,
                },
                json,
            };
            run(cfg).await?;
        }
        Commands::Stats { json } => {
            site_monitor::cli::games::run_stats(db_url, json).await?;
        }
        Commands::Migrate => {
            site_monitor::cli::maintenance::run_migrate(db_url).await?;
        }
        Commands::CleanLogs { days } => {
            site_monitor::cli::maintenance::run_clean_logs(db_url, days).await?;
        }
    }

    Ok(())
}
