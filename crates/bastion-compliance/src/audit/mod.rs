//! Tamper-evident audit trail.
//!
//! Events are sealed with a SHA-256 checksum of their canonical JSON form
//! and appended to an [`AuditStore`]. [`AuditTrail`] adds typed logging
//! helpers, filtered queries, integrity verification and regulatory reports.

mod event;
mod store;
mod trail;

pub use event::{AuditEvent, AuditEventType, AuditSeverity, ChecksumStatus, DataSensitivity};
pub use store::{AuditStore, JsonlAuditStore, MemoryAuditStore};
pub use trail::{AuditFilter, AuditTrail, ComplianceReport, IntegrityReport, DEFAULT_QUERY_LIMIT};
