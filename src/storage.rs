//! Storage subsystem
//!
//! Turns session snapshots into the export document and persists it.
//!
//! Components:
//! - `serializer`: session → export records, including the body inlining policy.
//! - `types`: the export document records.
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `file_storage`: filesystem-backed implementation writing pretty JSON.

pub mod file_storage;
pub mod serializer;
pub mod storage_trait;
pub mod types;

pub use file_storage::FileStorage;
pub use serializer::{build_export_document, export_sessions, BodyPolicy};
pub use storage_trait::Storage;
pub use types::ExportDocument;
