//! NuSearch Harvester CLI
//!
//! Local execution entry point for harvesting and indexing the feed.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use nusearch::{
    dump::DumpReader,
    error::Result,
    feed::{FeedClient, FeedCrawler, FeedQuery},
    models::Config,
    pipeline,
    sink::JsonLinesSink,
};

/// NuSearch - NuGet Package Feed Harvester
#[derive(Parser, Debug)]
#[command(
    name = "nusearch",
    version,
    about = "NuGet package feed harvester and bulk loader"
)]

struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "nusearch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the feed and dump package versions to partition files
    Harvest {
        /// Dump directory (defaults to the configured data path)
        data_dir: Option<String>,

        /// Package versions to harvest; 0 or absent uses the feed's total
        count: Option<usize>,

        /// Records per partition file; 0 or absent uses the configured size
        partition_size: Option<usize>,
    },

    /// Aggregate dumped versions into packages and bulk-load them
    Index {
        /// Dump directory (defaults to the configured data path)
        data_dir: Option<String>,

        /// Output file for the loaded packages (defaults to the configured one)
        out: Option<PathBuf>,
    },

    /// Fetch a handful of records from the feed and print them
    Peek {
        /// Number of records to fetch
        count: Option<usize>,

        /// Search term; omit to take records from the front of the feed
        #[arg(long)]
        term: Option<String>,
    },

    /// Validate the configuration file
    Validate,

    /// Show current dump info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Block until Enter is pressed. A closed stdin returns immediately.
fn wait_for_enter() {
    use std::io::BufRead;

    log::info!("Press Enter to exit...");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("NuSearch Harvester starting...");

    let mut config = Config::load_or_default(&cli.config);
    log::info!("Loaded configuration from {}", cli.config.display());

    // A first Ctrl-C finishes in-flight work and stops scheduling more.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Ctrl-C received, finishing in-flight work...");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    match cli.command {
        Command::Harvest {
            data_dir,
            count,
            partition_size,
        } => {
            if let Some(dir) = data_dir {
                config.dump.data_dir = dir;
            }
            if let Some(size) = partition_size.filter(|&size| size > 0) {
                config.dump.partition_size = size;
            }
            let count = count.filter(|&count| count > 0);

            let stats = pipeline::run_harvest(&config, count, &cancel).await?;
            log::info!(
                "Harvest finished: {} pages, {} records, {} partitions",
                stats.pages,
                stats.records,
                stats.partitions
            );
            wait_for_enter();
        }

        Command::Index { data_dir, out } => {
            if let Some(dir) = data_dir {
                config.dump.data_dir = dir;
            }
            let out = out.unwrap_or_else(|| PathBuf::from(&config.load.output));

            let sink = JsonLinesSink::new(&out);
            let stats = pipeline::run_index(&config, &sink, &cancel).await?;
            log::info!(
                "Index finished: {} of {} packages loaded into {}",
                stats.loaded,
                stats.packages,
                out.display()
            );
            wait_for_enter();
        }

        Command::Peek { count, term } => {
            let client = FeedClient::from_config(&config.feed)?;
            let query = match term {
                Some(term) => FeedQuery::search(term, config.feed.include_prerelease),
                None => FeedQuery::enumerate_all(),
            };

            let crawler = FeedCrawler::new(client, config.feed.max_concurrent);
            let records = crawler
                .crawl(&query, config.feed.page_size, Some(count.unwrap_or(10)), &cancel)
                .await?;

            for record in &records {
                log::info!(
                    "{} {} ({} downloads)",
                    record.id,
                    record.version,
                    record.download_count
                );
            }
            log::info!("Fetched {} records", records.len());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (feed, dump, and load sections)");

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Config file: {}", cli.config.display());
            log::info!("Feed: {}", config.feed.base_url);
            log::info!("Dump directory: {}", config.dump.data_dir);

            match DumpReader::new(&config.dump.data_dir) {
                Ok(reader) if reader.partition_count() > 0 => {
                    log::info!("Partitions: {}", reader.partition_count());
                    let records = DumpReader::read_partition(&reader.partitions()[0])?;
                    log::info!("First partition: {} records", records.len());
                    if let Some(record) = records.first() {
                        log::info!("Sample record: {} {}", record.id, record.version);
                    }
                }
                _ => log::info!("No dump found yet."),
            }

            let stats_path = Path::new(&config.dump.data_dir).join("stats.json");
            if let Ok(content) = std::fs::read_to_string(&stats_path) {
                if let Ok(stats) = serde_json::from_str::<serde_json::Value>(&content) {
                    if let Some(records) = stats.get("records") {
                        log::info!("Last harvest: {} records", records);
                    }
                    if let Some(finished) = stats.get("finished_at") {
                        log::info!("Finished at: {}", finished);
                    }
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
