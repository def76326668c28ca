use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use feedscout::config::Config;
use feedscout::feed::{FeedDiscoveryEngine, FeedFetcher};
use feedscout::registry::{SessionCache, SourceRegistry};
use feedscout::storage::{Database, DatabaseError, SessionToken, SHARED_SCOPE};
use feedscout::IngestionCoordinator;

/// Get the config directory path (~/.config/feedscout/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("feedscout"))
}

#[derive(Parser, Debug)]
#[command(name = "feedscout", about = "Find the feed behind a web page and register it once per site")]
struct Args {
    /// Config file (defaults to ~/.config/feedscout/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Locate the feed behind a page without storing anything
    Discover { url: String },
    /// Open a session for a user and print its token
    Session { user: String },
    /// Discover a feed and add it to the user owning the session token
    Add {
        url: String,
        #[arg(long)]
        token: String,
    },
    /// Search registered sources by name or URL prefix
    Search {
        #[arg(default_value = "")]
        keyword: String,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Serialize)]
struct DiscoverOutput<'a> {
    title: &'a str,
    url: &'a str,
    strategy: String,
    fetched_at: i64,
    items: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionOutput<'a> {
    token: &'a str,
    expires_at: i64,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access, the directory holds session tokens
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            std::fs::set_permissions(&config_dir, std::fs::Permissions::from_mode(0o700))
        {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path).context("Failed to load configuration")?;

    let client = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = FeedFetcher::new(client)
        .with_timeout(config.fetch_timeout())
        .with_max_body_bytes(config.max_body_bytes);
    let engine = FeedDiscoveryEngine::new(fetcher);

    if let Command::Discover { url } = &args.command {
        let feed = engine.discover(url).await?;
        return print_json(&DiscoverOutput {
            title: &feed.title,
            url: &feed.url,
            strategy: feed.strategy.to_string(),
            fetched_at: feed.fetched_at,
            items: feed.items.len(),
        });
    }

    let db_path = config.database_path_in(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: The source database is locked by another process. Please try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match db.purge_expired_sessions().await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(purged, "Purged expired sessions"),
        Err(e) => tracing::warn!(error = %e, "Failed to purge expired sessions"),
    }

    let sessions = Arc::new(SessionCache::new(config.session_ttl()));
    let registry =
        SourceRegistry::new(db.clone(), sessions).with_page_size(config.search_page_size);

    let result = match args.command {
        Command::Discover { .. } => Ok(()),
        Command::Session { user } => {
            if user == SHARED_SCOPE {
                anyhow::bail!("'{}' is reserved for the shared registry", SHARED_SCOPE);
            }
            let issued = db
                .open_session(&user, config.session_ttl())
                .await
                .context("Failed to open session")?;
            print_json(&SessionOutput {
                token: issued.token.expose(),
                expires_at: issued.expires_at,
            })
        }
        Command::Add { url, token } => {
            let coordinator = IngestionCoordinator::new(engine, registry, db.clone())
                .allow_private_hosts(config.allow_private_hosts);
            let added = coordinator.add_url(&url, &SessionToken::new(token)).await?;
            print_json(&added)
        }
        Command::Search { keyword, offset } => {
            let page = registry.search(&keyword, offset).await?;
            print_json(&page)
        }
    };

    db.close().await;
    result
}
