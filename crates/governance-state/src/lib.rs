//! Governance-State: audit log persistence for the governance engine
//!
//! This crate owns every byte the audit chain writes. It stores entries that
//! were already hashed and linked by `governance-core`; it never computes
//! hashes itself.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: append-only storage, ordered range reads, archival without deletion.
//!
//! ## Key Components
//!
//! - `AuditStore`: backend-agnostic trait for the audit log
//! - `SurrealAuditStore`: SurrealDB implementation (mem, surrealkv, ws)
//! - `fakes`: in-memory and fault-injecting stores for tests

mod error;
pub mod fakes;
mod handle;
pub mod migrations;
mod schema;
pub mod storage_traits;
pub mod surreal_audit;

pub use error::{StateError, StorageError};
pub use handle::CloudConfig;
pub use storage_traits::{AuditLogEntry, AuditQuery, AuditStore, StorageResult};
pub use surreal_audit::SurrealAuditStore;

/// Result type for governance-state operations
pub type Result<T> = std::result::Result<T, StateError>;
