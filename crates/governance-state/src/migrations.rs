//! SurrealDB schema migrations and initialization
//!
//! Sets up the `audit_log` table with the constraints the chain relies on.

use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info};

/// Initialize all governance tables in SurrealDB
///
/// Safe to call multiple times (idempotent).
pub async fn init_schema(db: &Surreal<Any>) -> Result<()> {
    info!("Initializing governance SurrealDB schema");
    init_audit_log_table(db).await?;
    info!("Governance schema initialization complete");
    Ok(())
}

/// Initialize `audit_log` table with constraints and indexes
///
/// Schema:
/// ```text
/// TABLE audit_log {
///   entry_id:       STRING (unique)
///   sequence:       INT (unique, chain position)
///   timestamp:      DATETIME (indexed)
///   principal_id:   STRING (indexed)
///   action:         STRING (indexed)
///   resource:       STRING
///   resource_id:    STRING (indexed)
///   result:         STRING
///   metadata:       OBJECT
///   previous_hash:  STRING
///   hash:           STRING
///   archived:       BOOL
/// }
/// ```
///
/// Constraints:
/// - `sequence` is unique (a chain position is written once)
/// - rows are never deleted (`FOR delete NONE`)
async fn init_audit_log_table(db: &Surreal<Any>) -> Result<()> {
    debug!("Initializing audit_log table");

    let sql = r#"
        DEFINE TABLE IF NOT EXISTS audit_log AS
            SCHEMALESS
            PERMISSIONS
                FOR create FULL
                FOR read FULL
                FOR update FULL
                FOR delete NONE;

        DEFINE INDEX IF NOT EXISTS idx_audit_sequence ON TABLE audit_log COLUMNS sequence UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_audit_entry_id ON TABLE audit_log COLUMNS entry_id UNIQUE;
        DEFINE INDEX IF NOT EXISTS idx_audit_timestamp ON TABLE audit_log COLUMNS timestamp;
        DEFINE INDEX IF NOT EXISTS idx_audit_principal ON TABLE audit_log COLUMNS principal_id;
        DEFINE INDEX IF NOT EXISTS idx_audit_action ON TABLE audit_log COLUMNS action;
        DEFINE INDEX IF NOT EXISTS idx_audit_resource_id ON TABLE audit_log COLUMNS resource_id;
    "#;

    db.query(sql).await?;
    info!("audit_log table initialized");
    Ok(())
}
