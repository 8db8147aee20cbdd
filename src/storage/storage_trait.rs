//! Storage Trait
//!
//! This module defines the `Storage` trait, the interface for export backends.
//! All methods return a `Result` to handle potential storage errors.

use crate::error_handling::types::StorageError;
use crate::storage::types::ExportDocument;

/// Persists and reads back the export document.
///
/// Implementors must be shareable across threads: the export may be written from a
/// different thread than the one that built the backend.
pub trait Storage: Send + Sync {
    /// Replaces any previously saved export with `document`.
    fn save_export(&self, document: &ExportDocument) -> Result<(), StorageError>;

    /// Reads the last saved export.
    fn load_export(&self) -> Result<ExportDocument, StorageError>;
}
