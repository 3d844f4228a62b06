//! Output rendering - human-readable and --json

use kit_common::{AutoOutcome, CheckReport, RollbackReport, Snapshot};
use owo_colors::OwoColorize;

fn version_or_none(v: &Option<kit_common::Version>) -> String {
    v.as_ref()
        .map(|v| v.to_string())
        .unwrap_or_else(|| "none".to_string())
}

pub fn check(report: &CheckReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "current": report.current.as_ref().map(|v| v.to_string()),
                "latest": report.latest.to_string(),
                "update_available": report.update_available,
                "locally_modified": report.locally_modified,
            })
        );
        return;
    }

    println!("Current Version: {}", version_or_none(&report.current));
    println!("Latest Version:  {}", report.latest);
    if report.locally_modified {
        println!("{}", "Local installation is modified.".yellow());
    }
    if report.update_available {
        println!("{}", "Update available.".green());
    } else {
        println!("Already up to date.");
    }
}

pub fn auto(outcome: &AutoOutcome, json: bool) {
    if json {
        let value = match outcome {
            AutoOutcome::UpToDate { version } => serde_json::json!({
                "result": "up-to-date",
                "version": version.as_ref().map(|v| v.to_string()),
            }),
            AutoOutcome::Updated {
                from,
                to,
                snapshot_id,
                wrote,
                deleted,
                preserved,
                review,
            } => serde_json::json!({
                "result": "updated",
                "from": from.as_ref().map(|v| v.to_string()),
                "to": to.to_string(),
                "snapshot": snapshot_id,
                "wrote": wrote,
                "deleted": deleted,
                "preserved": preserved,
                "review": review.iter()
                    .map(|(p, r)| serde_json::json!({ "path": p, "reason": r }))
                    .collect::<Vec<_>>(),
            }),
            AutoOutcome::RolledBack { snapshot_id, reason } => serde_json::json!({
                "result": "rolled-back",
                "snapshot": snapshot_id,
                "reason": reason,
            }),
        };
        println!("{}", value);
        return;
    }

    match outcome {
        AutoOutcome::UpToDate { version } => {
            println!("Already up to date ({}).", version_or_none(version));
        }
        AutoOutcome::Updated {
            from,
            to,
            snapshot_id,
            wrote,
            deleted,
            preserved,
            review,
        } => {
            println!(
                "{} {} -> {}",
                "Updated".green().bold(),
                version_or_none(from),
                to
            );
            println!("Snapshot: {}", snapshot_id);
            println!("Files written: {}, stale files removed: {}", wrote, deleted);
            if !preserved.is_empty() {
                println!("Preserved (untouched):");
                for path in preserved {
                    println!("  {}", path.display());
                }
            }
            for (path, reason) in review {
                println!(
                    "{} {} ({})",
                    "Review:".yellow().bold(),
                    path.display(),
                    reason
                );
            }
        }
        AutoOutcome::RolledBack { snapshot_id, reason } => {
            println!("{} {}", "Update failed:".red().bold(), reason);
            println!("Installation restored from snapshot {}.", snapshot_id);
        }
    }
}

pub fn rollback(report: &RollbackReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "result": "rolled-back",
                "snapshot": report.snapshot_id,
                "restored_version": report.restored_version.as_ref().map(|v| v.to_string()),
            })
        );
        return;
    }

    println!(
        "{} snapshot {} (version {})",
        "Restored".green().bold(),
        report.snapshot_id,
        version_or_none(&report.restored_version)
    );
}

pub fn snapshots(list: &[Snapshot], json: bool) {
    if json {
        let value: Vec<_> = list
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id,
                    "created_at": s.created_at.to_rfc3339(),
                    "source_version": s.source_version.as_ref().map(|v| v.to_string()),
                    "files": s.files.len(),
                })
            })
            .collect();
        println!("{}", serde_json::json!(value));
        return;
    }

    if list.is_empty() {
        println!("No snapshots.");
        return;
    }
    for s in list {
        println!(
            "{}  {}  version {}  {} files",
            s.id,
            s.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            version_or_none(&s.source_version),
            s.files.len()
        );
    }
}
