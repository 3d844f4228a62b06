//! kitctl - CLI for the kit update engine
//!
//! Exposes the three operating modes: --check (read-only), --auto
//! (apply with automatic rollback on failure), --rollback. Exit codes
//! distinguish fetch failures, rolled-back applies, and the one
//! unrecoverable case: a failed rollback.

mod cli;
mod exit;
mod report;

use clap::Parser;
use std::path::PathBuf;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

use kit_common::{
    from_origin, AutoOutcome, BackupManager, SnapshotSelector, UpdateError, UpdateOrchestrator,
    DEFAULT_ORIGIN,
};

use cli::Cli;
use exit::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();
    process::exit(run(args));
}

fn installation_root(args: &Cli) -> Option<PathBuf> {
    args.root
        .clone()
        .or_else(|| dirs::home_dir().map(|h| h.join(".kit")))
}

fn origin(args: &Cli) -> String {
    args.source
        .clone()
        .or_else(|| std::env::var("KIT_SOURCE").ok())
        .unwrap_or_else(|| DEFAULT_ORIGIN.to_string())
}

fn run(args: Cli) -> i32 {
    let root = match installation_root(&args) {
        Some(root) => root,
        None => {
            error!("cannot determine installation root; pass --root");
            return EXIT_GENERAL_ERROR;
        }
    };

    if args.list_snapshots {
        return match BackupManager::list(&root) {
            Ok(snapshots) => {
                report::snapshots(&snapshots, args.json);
                EXIT_SUCCESS
            }
            Err(e) => {
                error!("{}", e);
                EXIT_GENERAL_ERROR
            }
        };
    }

    let source = from_origin(&origin(&args));
    let mut orchestrator = UpdateOrchestrator::new(root, source).keep_snapshots(args.keep);

    if args.check {
        return match orchestrator.check() {
            Ok(check) => {
                report::check(&check, args.json);
                EXIT_SUCCESS
            }
            Err(e) => {
                error!("check failed: {}", e);
                exit_code_for(&e)
            }
        };
    }

    if args.auto {
        return match orchestrator.auto() {
            Ok(outcome) => {
                let code = match outcome {
                    AutoOutcome::RolledBack { .. } => EXIT_APPLY_ROLLED_BACK,
                    _ => EXIT_SUCCESS,
                };
                report::auto(&outcome, args.json);
                code
            }
            Err(e) => {
                error!("update failed: {}", e);
                exit_code_for(&e)
            }
        };
    }

    // --rollback
    let selector = match args.snapshot {
        Some(id) => SnapshotSelector::Id(id),
        None => SnapshotSelector::Latest,
    };
    match orchestrator.rollback(&selector) {
        Ok(outcome) => {
            report::rollback(&outcome, args.json);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("rollback failed: {}", e);
            exit_code_for(&e)
        }
    }
}

fn exit_code_for(e: &UpdateError) -> i32 {
    match e {
        UpdateError::Fetch(_) => EXIT_FETCH_FAILED,
        UpdateError::Rollback { .. } => EXIT_ROLLBACK_FAILED,
        _ => EXIT_GENERAL_ERROR,
    }
}
