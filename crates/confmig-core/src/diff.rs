use std::collections::BTreeSet;

use confmig_protocol::{Category, DiffEntry, ProjectConfig};
use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::selection::CategorySelection;
use crate::snapshot::SettingsSnapshot;
use crate::store::SettingsStore;

/// Keys whose values differ between the two snapshots, in lexicographic
/// key order. Comparison is exact string equality; an absent value is a
/// distinct sentinel, never equal to a present value (including `""`).
/// Keys flagged missing on either side were not observed and are skipped.
pub fn diff(source: &SettingsSnapshot, dest: &SettingsSnapshot) -> Vec<DiffEntry> {
    let keys: BTreeSet<&str> = source.keys().chain(dest.keys()).collect();
    keys.into_iter()
        .filter(|k| !source.is_missing(k) && !dest.is_missing(k))
        .filter_map(|key| {
            let src = source.value(key);
            let dst = dest.value(key);
            if src == dst {
                None
            } else {
                Some(DiffEntry::new(
                    key,
                    src.map(str::to_string),
                    dst.map(str::to_string),
                ))
            }
        })
        .collect()
}

/// Preview the migration of every enabled category, in registry order.
///
/// Category reads run concurrently; a failed read degrades that category
/// to an error marker instead of aborting the preview. Categories with an
/// empty diff still appear, so the caller can tell "checked, no
/// difference" from "not checked".
pub async fn generate_preview(
    store: &dyn SettingsStore,
    source_id: &str,
    dest_id: &str,
    selection: &CategorySelection,
) -> Vec<ProjectConfig> {
    let tasks = selection
        .enabled()
        .map(|category| preview_category(store, source_id, dest_id, category));
    join_all(tasks).await
}

async fn preview_category(
    store: &dyn SettingsStore,
    source_id: &str,
    dest_id: &str,
    category: Category,
) -> ProjectConfig {
    let (source, dest) = tokio::join!(
        store.read(source_id, category),
        store.read(dest_id, category)
    );
    let source = match source {
        Ok(snap) => snap,
        Err(err) => {
            warn!(%category, project = source_id, %err, "source settings read failed");
            return ProjectConfig::failed(category, format!("source read failed: {err}"));
        }
    };
    let dest = match dest {
        Ok(snap) => snap,
        Err(err) => {
            warn!(%category, project = dest_id, %err, "destination settings read failed");
            return ProjectConfig::failed(category, format!("destination read failed: {err}"));
        }
    };
    if source.is_partial() || dest.is_partial() {
        debug!(
            %category,
            source_missing = source.missing().count(),
            dest_missing = dest.missing().count(),
            "partial snapshot; unfetched keys excluded from diff"
        );
    }
    ProjectConfig::new(category, diff(&source, &dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::ReadError;

    fn snap(pairs: &[(&str, &str)]) -> SettingsSnapshot {
        pairs.iter().copied().collect()
    }

    #[test]
    fn identical_snapshots_diff_to_empty() {
        let a = snap(&[("k1", "v1"), ("k2", "v2")]);
        assert!(diff(&a, &a.clone()).is_empty());
    }

    #[test]
    fn differing_and_one_sided_keys_are_reported_in_key_order() {
        let source = snap(&[("b_changed", "new"), ("a_only_src", "x"), ("same", "s")]);
        let dest = snap(&[("b_changed", "old"), ("c_only_dst", "y"), ("same", "s")]);
        let entries = diff(&source, &dest);
        assert_eq!(
            entries.iter().map(|e| e.key.as_str()).collect::<Vec<_>>(),
            vec!["a_only_src", "b_changed", "c_only_dst"]
        );
        assert_eq!(entries[0].source_value.as_deref(), Some("x"));
        assert_eq!(entries[0].dest_value, None);
        assert_eq!(entries[2].source_value, None);
        assert_eq!(entries[2].dest_value.as_deref(), Some("y"));
    }

    #[test]
    fn absent_is_not_equal_to_empty_string() {
        let source = snap(&[("k", "")]);
        let dest = snap(&[]);
        let entries = diff(&source, &dest);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].source_value.as_deref(), Some(""));
        assert_eq!(entries[0].dest_value, None);
    }

    #[test]
    fn diff_is_symmetric_with_swapped_direction() {
        let s1 = snap(&[("a", "1"), ("b", "2")]);
        let s2 = snap(&[("a", "9"), ("c", "3")]);
        let forward = diff(&s1, &s2);
        let backward = diff(&s2, &s1);
        assert_eq!(forward.len(), backward.len());
        for (f, b) in forward.iter().zip(backward.iter()) {
            assert_eq!(f.key, b.key);
            assert_eq!(f.source_value, b.dest_value);
            assert_eq!(f.dest_value, b.source_value);
        }
    }

    #[test]
    fn missing_keys_are_excluded_from_the_diff() {
        let mut source = snap(&[("seen", "1")]);
        source.mark_missing("unfetched");
        let dest = snap(&[("unfetched", "present"), ("seen", "1")]);
        assert!(diff(&source, &dest).is_empty());
    }

    #[tokio::test]
    async fn preview_includes_enabled_categories_only() {
        let store = MemoryStore::new();
        store.seed("src", Category::Auth, [("max_sessions", "10")]);
        store.seed("dst", Category::Auth, [("max_sessions", "5")]);
        store.seed("src", Category::Storage, [("bucket", "a")]);
        store.seed("dst", Category::Storage, [("bucket", "b")]);

        let selection = CategorySelection::from_flags(&[true, false, false, false, false]).unwrap();
        let configs = generate_preview(&store, "src", "dst", &selection).await;

        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, Category::Auth);
        assert_eq!(
            configs[0].diffs,
            vec![DiffEntry::new(
                "max_sessions",
                Some("10".into()),
                Some("5".into())
            )]
        );
    }

    #[tokio::test]
    async fn preview_keeps_empty_categories_and_degrades_failed_ones() {
        let store = MemoryStore::new();
        store.seed("src", Category::Auth, [("k", "same")]);
        store.seed("dst", Category::Auth, [("k", "same")]);
        store.fail_reads(
            "src",
            Category::Secrets,
            ReadError::UnreachableBackend("down".into()),
        );

        let selection =
            CategorySelection::from_flags(&[true, false, false, true, false, false, false])
                .unwrap();
        let configs = generate_preview(&store, "src", "dst", &selection).await;

        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, Category::Auth);
        assert!(configs[0].diffs.is_empty());
        assert!(configs[0].error.is_none());

        assert_eq!(configs[1].name, Category::Secrets);
        assert!(configs[1].diffs.is_empty());
        let msg = configs[1].error.as_deref().unwrap();
        assert!(msg.contains("source read failed"), "got: {msg}");
    }
}
