//! Canonical event topic constants.
//!
//! Centralized so publishers and subscribers stay in sync. Keep the list
//! alphabetized within sections and favor dot.case names.

// Runs (preview / migrate)
pub const TOPIC_RUN_COMPLETED: &str = "run.completed";
pub const TOPIC_RUN_REJECTED: &str = "run.rejected";
pub const TOPIC_RUN_STARTED: &str = "run.started";

// Migration entries
pub const TOPIC_MIGRATE_CATEGORY_DONE: &str = "migrate.category.done";

// Metrics observations
pub const TOPIC_OBSERVATION_STATE: &str = "observation.state";
