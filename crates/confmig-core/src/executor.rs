use confmig_protocol::{Category, DiffEntry, EntryOutcome, ProjectConfig, SkipReason};
use tracing::{info, warn};

use crate::store::SettingsStore;

/// Apply a previously computed (and possibly operator-edited) diff set to
/// the destination project.
///
/// Categories are applied strictly in caller order (the caller may
/// reorder to express dependency preference), entries strictly in the
/// order given. Every entry gets an outcome; nothing aborts the run.
/// Categories that carried a read error from the preview pass through
/// untouched.
pub async fn migrate(
    store: &dyn SettingsStore,
    configs: Vec<ProjectConfig>,
    source_id: &str,
    dest_id: &str,
) -> Vec<ProjectConfig> {
    let mut out = Vec::with_capacity(configs.len());
    for mut config in configs {
        if config.error.is_some() {
            out.push(config);
            continue;
        }
        let category = config.name;
        let mut applied = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;
        for entry in &mut config.diffs {
            let outcome = apply_entry(store, dest_id, category, entry).await;
            match &outcome {
                EntryOutcome::Applied => applied += 1,
                EntryOutcome::Skipped { .. } => skipped += 1,
                EntryOutcome::Failed { reason } => {
                    failed += 1;
                    warn!(%category, key = %entry.key, reason, "entry migration failed");
                }
            }
            entry.outcome = Some(outcome);
        }
        info!(
            %category,
            source = source_id,
            dest = dest_id,
            applied,
            skipped,
            failed,
            "category migration finished"
        );
        out.push(config);
    }
    out
}

/// Re-validate against the live destination before every write: a value
/// the operator never saw is skipped, never overwritten.
async fn apply_entry(
    store: &dyn SettingsStore,
    dest_id: &str,
    category: Category,
    entry: &DiffEntry,
) -> EntryOutcome {
    let current = match store.read_key(dest_id, category, &entry.key).await {
        Ok(value) => value,
        Err(err) => {
            return EntryOutcome::Failed {
                reason: format!("destination re-read failed: {err}"),
            }
        }
    };
    if current == entry.source_value {
        return EntryOutcome::Skipped {
            reason: SkipReason::AlreadyApplied,
        };
    }
    if current != entry.dest_value {
        return EntryOutcome::Skipped {
            reason: SkipReason::ConcurrentModification,
        };
    }
    match store
        .write(dest_id, category, &entry.key, entry.source_value.as_deref())
        .await
    {
        Ok(()) => EntryOutcome::Applied,
        Err(err) => EntryOutcome::Failed {
            reason: err.to_string(),
        },
    }
}
