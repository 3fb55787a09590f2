//! Connection configuration for the SurrealDB audit backend

use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{info, instrument};

use crate::error::StateError;
use crate::migrations;
use crate::Result;

/// Default namespace for governance tables
pub const DEFAULT_NAMESPACE: &str = "governance";
/// Default database name
pub const DEFAULT_DATABASE: &str = "audit";
/// Local persistence directory used when nothing else is configured
pub const DEFAULT_LOCAL_PATH: &str = ".governance/db";

/// Remote SurrealDB connection settings
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// WebSocket endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "governance")
    pub namespace: String,
    /// Database name (default: "audit")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl CloudConfig {
    /// Create a new cloud configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "governance")
    /// - SURREALDB_DATABASE (optional, default: "audit")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, String> {
        let endpoint =
            std::env::var("SURREALDB_ENDPOINT").map_err(|_| "SURREALDB_ENDPOINT not set")?;
        let username =
            std::env::var("SURREALDB_USERNAME").map_err(|_| "SURREALDB_USERNAME not set")?;
        let password =
            std::env::var("SURREALDB_PASSWORD").map_err(|_| "SURREALDB_PASSWORD not set")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// Connect to `url`, select the default namespace/database and run migrations.
pub(crate) async fn connect_url(url: &str) -> Result<Surreal<Any>> {
    let db = surrealdb::engine::any::connect(url)
        .await
        .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

    db.use_ns(DEFAULT_NAMESPACE)
        .use_db(DEFAULT_DATABASE)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    Ok(db)
}

/// Connect using authenticated cloud settings and run migrations.
#[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
pub(crate) async fn connect_cloud(config: &CloudConfig) -> Result<Surreal<Any>> {
    info!("Connecting to SurrealDB Cloud (root={})", config.is_root);

    let db = surrealdb::engine::any::connect(&config.endpoint)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    if config.is_root {
        db.signin(Root {
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("Root auth failed: {e}")))?;
    } else {
        db.signin(Database {
            namespace: &config.namespace,
            database: &config.database,
            username: &config.username,
            password: &config.password,
        })
        .await
        .map_err(|e| StateError::Connection(format!("DB auth failed: {e}")))?;
    }

    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await
        .map_err(|e| StateError::Connection(e.to_string()))?;

    migrations::init_schema(&db).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloud_config_defaults() {
        let config = CloudConfig::new("wss://example", "user", "pass");
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert_eq!(config.database, DEFAULT_DATABASE);
        assert!(!config.is_root);

        let config = config
            .with_namespace("ns")
            .with_database("db")
            .with_root(true);
        assert_eq!(config.namespace, "ns");
        assert_eq!(config.database, "db");
        assert!(config.is_root);
    }
}
