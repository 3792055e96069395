use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// RFC7807-style error payload used at service edges.
#[derive(Debug, Serialize, Deserialize, Clone, ToSchema)]
pub struct ProblemDetails {
    pub r#type: String,
    pub title: String,
    pub status: u16,
    pub detail: Option<String>,
}

/// A project as listed by the management backend. Identity is `id`; the
/// remaining fields are display metadata and may change out of band.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub region: String,
    pub status: String,
}

/// Fixed set of migratable configuration categories, in registry order.
///
/// The declared order is load-bearing: preview output and the boolean
/// selection vector on the wire both align to it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Auth,
    Postgrest,
    EdgeFunctions,
    Secrets,
    Storage,
    Postgres,
    Branches,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Auth,
        Category::Postgrest,
        Category::EdgeFunctions,
        Category::Secrets,
        Category::Storage,
        Category::Postgres,
        Category::Branches,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Auth => "auth",
            Category::Postgrest => "postgrest",
            Category::EdgeFunctions => "edge_functions",
            Category::Secrets => "secrets",
            Category::Storage => "storage",
            Category::Postgres => "postgres",
            Category::Branches => "branches",
        }
    }

    pub fn display_label(&self) -> &'static str {
        match self {
            Category::Auth => "Auth",
            Category::Postgrest => "Postgrest",
            Category::EdgeFunctions => "EdgeFunctions",
            Category::Secrets => "Secrets",
            Category::Storage => "Storage",
            Category::Postgres => "Postgres",
            Category::Branches => "Branches",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One setting key whose value differs between the source and destination
/// snapshots. `None` is the explicit absent marker and is never equal to a
/// present value, including the empty string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct DiffEntry {
    pub key: String,
    pub source_value: Option<String>,
    pub dest_value: Option<String>,
    /// `None` in previews; filled in by the migration executor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EntryOutcome>,
}

impl DiffEntry {
    pub fn new(
        key: impl Into<String>,
        source_value: Option<String>,
        dest_value: Option<String>,
    ) -> Self {
        Self {
            key: key.into(),
            source_value,
            dest_value,
            outcome: None,
        }
    }
}

/// Per-entry migration result.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum EntryOutcome {
    Applied,
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Destination drifted since the preview snapshot was taken.
    ConcurrentModification,
    /// Destination already carries the source value.
    AlreadyApplied,
}

/// Preview or migration result for one category. The two call shapes are
/// identical on purpose: a migration response is a preview response with
/// outcomes attached.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct ProjectConfig {
    pub name: Category,
    #[serde(default)]
    pub diffs: Vec<DiffEntry>,
    /// Category-level failure marker; when set, `diffs` is empty and the
    /// category was not checked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProjectConfig {
    pub fn new(name: Category, diffs: Vec<DiffEntry>) -> Self {
        Self {
            name,
            diffs,
            error: None,
        }
    }

    pub fn failed(name: Category, error: impl Into<String>) -> Self {
        Self {
            name,
            diffs: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// One timestamped metric value pushed over the observation stream.
/// `labels` is an opaque serialized key/value set; the core does not
/// decompose it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, ToSchema)]
pub struct MetricSample {
    pub timestamp: String,
    pub metric_name: String,
    pub labels: String,
    pub value: String,
}
