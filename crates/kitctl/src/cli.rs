//! CLI - command-line argument parsing
//!
//! One operating mode per invocation: check (read-only), auto
//! (non-interactive apply), rollback, or snapshot listing.

use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Kit updater control
#[derive(Parser)]
#[command(name = "kitctl")]
#[command(about = "Transactional updater for a kit installation", long_about = None)]
#[command(version)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["check", "auto", "rollback", "list_snapshots"])
))]
pub struct Cli {
    /// Report current vs latest version without touching anything
    #[arg(long)]
    pub check: bool,

    /// Apply the latest release non-interactively
    #[arg(long)]
    pub auto: bool,

    /// Restore the most recent snapshot (or --snapshot <id>)
    #[arg(long)]
    pub rollback: bool,

    /// List snapshots, newest first
    #[arg(long)]
    pub list_snapshots: bool,

    /// Snapshot id for --rollback (default: most recent)
    #[arg(long, value_name = "ID")]
    pub snapshot: Option<String>,

    /// Installation root (default: ~/.kit)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Release origin: HTTP(S) base URL or local release checkout.
    /// Falls back to $KIT_SOURCE, then the built-in origin.
    #[arg(long, value_name = "URL|PATH")]
    pub source: Option<String>,

    /// After a successful update, keep only this many snapshots
    #[arg(long, value_name = "N")]
    pub keep: Option<usize>,

    /// Machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modes_are_exclusive() {
        assert!(Cli::try_parse_from(["kitctl", "--check", "--auto"]).is_err());
    }

    #[test]
    fn test_a_mode_is_required() {
        assert!(Cli::try_parse_from(["kitctl"]).is_err());
    }

    #[test]
    fn test_rollback_with_snapshot() {
        let cli =
            Cli::try_parse_from(["kitctl", "--rollback", "--snapshot", "20260830-120000"]).unwrap();
        assert!(cli.rollback);
        assert_eq!(cli.snapshot.as_deref(), Some("20260830-120000"));
    }
}
