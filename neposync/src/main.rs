//! neposync - rating and tag synchronization for media trees
//!
//! Parses the command line, loads configuration, opens the stores the action
//! needs and hands over to the driver or one of the inspection actions.
//! The operator report goes to stdout, diagnostics to stderr.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use neposync::actions::{clear_semantic, display_collection, display_semantic, query_collection};
use neposync::cli::{Action, Args};
use neposync::exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use neposync::stores::{AccessMode, CollectionStore, Id3FileStore, ImageFileStore, SemanticStore};
use neposync::{sync_tree, Classifier, RunOptions, Stores};
use neposync_common::config::Config;
use neposync_common::{StoreAdapter, SyncPolicy};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version are printed through the same path
            let _ = e.print();
            return ExitCode::from(if e.use_stderr() { EXIT_USAGE } else { EXIT_SUCCESS });
        }
    };

    init_tracing(args.verbose);

    info!(
        "Starting neposync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let action = match args.action() {
        Ok(Some(action)) => action,
        Ok(None) => {
            Args::print_help();
            return ExitCode::from(EXIT_SUCCESS);
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_USAGE);
        }
    };

    match run(&args, action).await {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// stderr logging; `RUST_LOG` wins over the verbosity flag.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "neposync=debug,neposync_common=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

async fn run(args: &Args, action: Action) -> Result<()> {
    let config = Config::load(&args.overrides()).context("Failed to load configuration")?;
    let root = args.root().context("Cannot determine the working directory")?;
    let classifier = Classifier::from_config(&config);

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.verbose {
        writeln!(out, "Path used: {}", root.display())?;
    }
    if args.force && !action.honours_force() {
        writeln!(out, "In {} mode, --force has no effect.", action.name())?;
    }

    match action {
        Action::Sync(direction) => {
            let index: Box<dyn StoreAdapter> = if direction.uses_semantic() {
                Box::new(SemanticStore::open(&config.semantic_db).await?)
            } else {
                Box::new(CollectionStore::open(&config.collection_db, AccessMode::ReadWrite).await?)
            };
            let image = ImageFileStore::new(config.xmp_scale);
            let audio = Id3FileStore::new(config.popm_user.clone());
            let stores = Stores {
                index: index.as_ref(),
                image: &image,
                audio: &audio,
            };
            let options = RunOptions {
                recursive: args.recursive,
                policy: SyncPolicy { force: args.force },
                verbose: args.verbose,
            };
            sync_tree(&root, direction, stores, &classifier, options, &mut out).await?;
        }
        Action::DisplaySemantic => {
            let semantic = SemanticStore::open_read_only(&config.semantic_db).await?;
            display_semantic(&semantic, &root, &classifier, args.recursive, args.verbose, &mut out).await?;
        }
        Action::ClearSemantic => {
            let semantic = SemanticStore::open(&config.semantic_db).await?;
            clear_semantic(&semantic, &root, &classifier, args.recursive, args.verbose, &mut out).await?;
        }
        Action::DisplayCollection => {
            let collection = CollectionStore::open(&config.collection_db, AccessMode::ReadOnly).await?;
            display_collection(&collection, &root, args.recursive, &mut out).await?;
        }
        Action::QueryCollection(sql) => {
            let collection = CollectionStore::open(&config.collection_db, AccessMode::ReadOnly).await?;
            query_collection(&collection, &sql, &mut out).await?;
        }
    }

    Ok(())
}
