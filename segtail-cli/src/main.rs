mod cli;
mod config;
mod error;

use crate::{
    cli::{Args, Commands, SourceArgs},
    config::AppConfig,
    error::{AppError, Result},
};
use clap::Parser;
use segtail_engine::{
    LocalStorage, LogStatus, SourceRequest, StreamSession, write_playlist_snapshot,
};
use std::{process, sync::Arc};
use tracing::{Level, error, info, warn};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        error!("Application error: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.verbose, args.quiet)?;
    let mut config = AppConfig::load(args.config.as_deref())?;

    match args.command {
        Commands::Play {
            source,
            poll_interval,
            queue_capacity,
            retries,
        } => {
            if let Some(secs) = poll_interval {
                config.poll_interval_secs = secs;
            }
            if let Some(capacity) = queue_capacity {
                config.queue_capacity = capacity;
            }
            if let Some(attempts) = retries {
                config.max_attempts = attempts;
            }
            play(config, source).await
        }
        Commands::Snapshot { source } => snapshot(config, source).await,
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn play(mut config: AppConfig, source: SourceArgs) -> Result<()> {
    let (storage, request) = prepare(&mut config, source)?;
    let stream = config.stream_config();
    info!(
        "Following {} every {:?} into {}",
        describe(&request),
        stream.poll_interval,
        request.local_path.display()
    );

    let mut session = StreamSession::create(&storage, &request, stream)
        .await?
        .with_status(Arc::new(LogStatus));
    let handle = session.handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, stopping");
                handle.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    session.start().await?;
    let metrics = session.metrics().snapshot();
    info!(
        "Stopped after {} segments ({} bytes, {} failed)",
        metrics.downloads_total, metrics.download_bytes_total, metrics.download_errors
    );
    Ok(())
}

async fn snapshot(mut config: AppConfig, source: SourceArgs) -> Result<()> {
    let (storage, request) = prepare(&mut config, source)?;
    let written = write_playlist_snapshot(&storage, &request, &config.stream_config()).await?;
    info!(
        "Wrote {} entries to {}",
        written,
        request.local_path.display()
    );
    Ok(())
}

/// Applies the source overrides to `config` and builds the storage backend and request.
fn prepare(config: &mut AppConfig, source: SourceArgs) -> Result<(LocalStorage, SourceRequest)> {
    if let Some(root) = source.storage_root {
        config.storage_root = root;
    }
    if let Some(duration) = source.target_duration {
        config.target_duration = duration;
    }
    if !config.storage_root.is_dir() {
        return Err(AppError::InvalidInput(format!(
            "storage root {} is not a directory",
            config.storage_root.display()
        )));
    }

    let request = SourceRequest {
        local_path: source.output,
        remote_path: source.remote_path.unwrap_or_default(),
        allocation_id: source.allocation.unwrap_or_default(),
        share_token: source.share_token.unwrap_or_default(),
        lookup_key: source.lookup_key.unwrap_or_default(),
    };
    Ok((LocalStorage::new(config.storage_root.clone()), request))
}

fn describe(request: &SourceRequest) -> String {
    if request.remote_path.is_empty() {
        "shared directory".to_string()
    } else {
        format!("{}:{}", request.allocation_id, request.remote_path)
    }
}

fn init_logging(verbose: bool, quiet: bool) -> Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let subscriber = tracing_subscriber::registry().with(filter);

    subscriber
        .with(fmt::layer().with_target(false).with_level(verbose))
        .init();
    Ok(())
}
