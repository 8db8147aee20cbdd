//! Redaction of sensitive values before sessions leave the process.

pub mod pii_sanitizer;
pub mod policy;

pub use pii_sanitizer::PiiSanitizer;
pub use policy::RedactionPolicy;
