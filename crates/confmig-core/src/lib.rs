//! Configuration diff/migration engine and the metrics observation state
//! machine. Everything here is stateless given its inputs except the
//! [`run::RunCoordinator`], which owns the per-pair exclusivity set.

pub mod diff;
pub mod executor;
pub mod memory;
pub mod run;
pub mod selection;
pub mod snapshot;
pub mod store;
pub mod stream;

pub use selection::CategorySelection;
pub use snapshot::SettingsSnapshot;
pub use store::{ReadError, SettingsStore, WriteError};
