use std::path::PathBuf;

use clap::{Parser, Subcommand};

use rss_digest::{App, Config, Result};

#[derive(Debug, Parser)]
#[command(name = "rss-digest", version, about = "Polls RSS feeds and emails a digest of new articles")]
struct Cli {
    /// Path to config.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll on the configured interval until interrupted (default)
    Run,
    /// Run a single poll-and-notify pass
    Once,
    /// Validate and register a feed
    Add { url: String },
    /// Remove a feed and its articles
    Remove { url: String },
    /// List registered feeds
    List,
}

#[tokio::main]
async fn main() {
    // Initialize logging (info by default, RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let app = App::new(config).await?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            app.run_scheduled(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await?;
        }
        Command::Once => {
            let report = app.run_once().await?;
            println!("{}", report);
        }
        Command::Add { url } => {
            let id = app.add_feed(&url).await?;
            println!("Added feed {} ({})", url, id);
        }
        Command::Remove { url } => {
            if app.remove_feed(&url).await? {
                println!("Removed feed {}", url);
            } else {
                println!("No feed registered for {}", url);
            }
        }
        Command::List => {
            let feeds = app.list_feeds().await?;
            if feeds.is_empty() {
                println!("No feeds registered");
            }
            for feed in feeds {
                let checked = feed
                    .last_checked
                    .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!("{:>4}  {}  (last checked: {})", feed.id, feed.url, checked);
            }
        }
    }

    Ok(())
}
