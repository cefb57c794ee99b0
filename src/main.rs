use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subsync::config::LoggingConfig;
use subsync::{
    fetch_remote_state, reconcile, review, Config, FailurePolicy, GitHubClient, Manifest,
    Progress, SubscriptionApi, SubsyncError, UpdateOptions,
};

#[derive(Parser)]
#[command(name = "subsync")]
#[command(about = "Sync GitHub notification subscriptions for an organization with a local manifest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Organization to manage (overrides github.organization)
    #[arg(long)]
    org: Option<String>,

    /// Manifest file (overrides manifest_path)
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the current subscription of every repository to the manifest
    Export,

    /// Push the manifest's subscriptions to GitHub
    Update {
        /// Show what would change without calling GitHub
        #[arg(long)]
        dry_run: bool,

        /// Keep going after a failed repository and report failures at the end
        #[arg(long)]
        keep_going: bool,
    },

    /// List the manifest sorted by status
    Review {
        /// Print directly instead of through a pager
        #[arg(long)]
        no_pager: bool,
    },

    /// Mark repositories that are new and subscribed as unsubscribed
    UnsubscribeNew,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config)?;
    if let Some(org) = cli.org {
        config.github.organization = Some(org);
    }
    if let Some(manifest) = cli.manifest {
        config.manifest_path = manifest.to_string_lossy().into_owned();
    }

    init_logging(cli.verbose, &config.logging)?;
    info!("Starting subsync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Export => cmd_export(&config).await,
        Commands::Update {
            dry_run,
            keep_going,
        } => cmd_update(dry_run, keep_going, &config).await,
        Commands::Review { no_pager } => cmd_review(no_pager, &config).await,
        Commands::UnsubscribeNew => cmd_unsubscribe_new(&config).await,
    }
}

/// Initialize logging on stderr; stdout is reserved for command output
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(logging.color);

    if logging.format == "pretty" {
        tracing_subscriber::registry()
            .with(layer.pretty())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(layer.compact())
            .with(filter)
            .init();
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(&path),
        None => Config::load_or_default(),
    }
}

/// Organization from config or `--org`
fn require_org(config: &Config) -> Result<String> {
    config
        .github
        .organization
        .clone()
        .filter(|org| !org.trim().is_empty())
        .ok_or_else(|| SubsyncError::OrganizationNotConfigured.into())
}

/// Authenticate and check that the viewer belongs to `org`
async fn connect(config: &Config, org: &str) -> Result<GitHubClient> {
    let client = GitHubClient::new(config).await?;

    if !client.is_org_member(org).await? {
        return Err(SubsyncError::NotOrgMember {
            user: client.username().to_string(),
            org: org.to_string(),
        }
        .into());
    }

    debug!("{} is a member of {}", client.username(), org);
    Ok(client)
}

/// Replace the manifest with the current remote state
async fn cmd_export(config: &Config) -> Result<()> {
    let org = require_org(config)?;
    let path = config.manifest_path();
    let previous = Manifest::load_or_empty(&path)?;
    let client = connect(config, &org).await?;

    println!("🔍 Fetching subscriptions for {}...", org);
    let remote = fetch_remote_state(&client, &org, config.page_size()).await?;
    if remote.is_empty() {
        warn!("No subscribable repositories visible in {}", org);
    }

    let summary = reconcile::export(&previous, &remote);
    summary.manifest.save(&path)?;

    println!("✅ Exported {} repositories to {}", summary.manifest.len(), path.display());
    println!("   New: {}", summary.added.len());
    for repo in &summary.added {
        println!("     + {}", repo);
    }
    if !summary.dropped.is_empty() {
        println!("   Dropped: {}", summary.dropped.len());
        for repo in &summary.dropped {
            println!("     - {}", repo);
        }
    }

    Ok(())
}

/// Apply the manifest to GitHub
async fn cmd_update(dry_run: bool, keep_going: bool, config: &Config) -> Result<()> {
    let org = require_org(config)?;
    let path = config.manifest_path();
    let manifest = Manifest::load(&path)?;
    let client = connect(config, &org).await?;

    let remote = fetch_remote_state(&client, &org, config.page_size()).await?;

    let options = UpdateOptions {
        on_error: if keep_going {
            FailurePolicy::Continue
        } else {
            config.update.on_error
        },
        dry_run,
    };

    let summary = reconcile::update(&client, &manifest, &remote, options, print_progress)
        .await
        .context("Update aborted")?;

    println!();
    if dry_run {
        println!(
            "📊 {} repositories would change, {} already up-to-date",
            summary.planned, summary.unchanged
        );
        return Ok(());
    }

    println!(
        "📊 {} updated, {} already up-to-date, {} failed",
        summary.updated,
        summary.unchanged,
        summary.failed.len()
    );

    if !summary.failed.is_empty() {
        println!("\n🔍 Failed repositories:");
        for (repo, error) in &summary.failed {
            println!("   ❌ {}: {}", repo, error);
        }
        return Err(SubsyncError::UpdateFailures(summary.failed.len()).into());
    }

    Ok(())
}

fn print_progress(progress: Progress<'_>) {
    match progress {
        Progress::UpToDate { repo } => println!("{}: already up-to-date", repo),
        Progress::Updating { repo, mutation } => println!("{}: ...updating ({})", repo, mutation),
        Progress::Updated { repo } => println!("{}: ...updated", repo),
        Progress::WouldUpdate { repo, mutation } => println!("{}: would {}", repo, mutation),
        Progress::Failed { repo, error } => println!("{}: ...failed: {}", repo, error),
    }
}

/// Show the manifest
async fn cmd_review(no_pager: bool, config: &Config) -> Result<()> {
    let org = require_org(config)?;
    let manifest = Manifest::load(&config.manifest_path())?;
    connect(config, &org).await?;

    review::show(&manifest, &config.review, !no_pager)
}

/// Flip new subscriptions to unsubscribed in the manifest
async fn cmd_unsubscribe_new(config: &Config) -> Result<()> {
    let org = require_org(config)?;
    let path = config.manifest_path();
    let mut manifest = Manifest::load(&path)?;
    connect(config, &org).await?;

    let changed = reconcile::unsubscribe_new(&mut manifest);
    manifest.save(&path)?;

    println!("✅ Marked {} new repositories as UNSUBSCRIBED", changed);
    if changed > 0 {
        println!("   Run 'subsync update' to apply the change on GitHub");
    }

    Ok(())
}
