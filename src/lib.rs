//! Persistence layer for project-generator configuration: a readable
//! Markdown document codec, scoped on-disk collections for system settings,
//! templates and generation history, keyword search, and a one-shot
//! migration from the legacy flat-JSON layout.

pub mod error;
pub mod store;

pub use error::{ErrorCode, StoreError, StoreResult};
pub use store::codec::{Decoded, Metadata, Payload, SkippedBlock};
pub use store::document::{ConfigDocument, DocumentSummary, SavedDocument, Scope};
pub use store::manager::ConfigStore;
pub use store::migrate::{MigrationResult, Migrator, RollbackOutcome};
pub use store::scoped::ScopedStore;
pub use store::search::{SearchFilter, SearchResults};
