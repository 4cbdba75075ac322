//! SurrealDB Handle - Connection and Schema
//!
//! Supports in-memory (`mem://`), embedded on-disk (`surrealkv://<path>`)
//! and remote (`ws://`, `wss://`) endpoints through `surrealdb::engine::any`.

use std::path::Path;

use surrealdb::engine::any::Any;
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

use crate::error::StateError;
use crate::Result;

const NAMESPACE: &str = "buildcast";
const DATABASE: &str = "agent";

/// SurrealDB connection handle for Buildcast
#[derive(Clone)]
pub struct SurrealHandle {
    db: Surreal<Any>,
}

impl SurrealHandle {
    /// Connect to an in-memory database and set up the schema.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("mem://").await
    }

    /// Open (or create) an embedded on-disk database under `path`.
    pub async fn open_local(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::connect(&format!("surrealkv://{}", path.display())).await
    }

    /// Connect to any endpoint understood by `surrealdb::engine::any`.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to SurrealDB");

        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        handle.init_schema().await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    pub(crate) fn db(&self) -> &Surreal<Any> {
        &self.db
    }

    /// Initialize the database schema. Safe to call more than once.
    async fn init_schema(&self) -> Result<()> {
        debug!("Initializing Buildcast schema");

        let schema = r#"
            -- Settings table (one record per key, id = key)
            DEFINE TABLE IF NOT EXISTS settings SCHEMAFULL;
            DEFINE FIELD IF NOT EXISTS key ON settings TYPE string;
            DEFINE FIELD IF NOT EXISTS value ON settings TYPE string;
            DEFINE FIELD IF NOT EXISTS version ON settings TYPE int;
        "#;

        self.db
            .query(schema)
            .await
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?
            .check()
            .map_err(|e| StateError::SchemaSetup(e.to_string()))?;

        debug!("Schema initialized successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_connection_initialises_schema() {
        let handle = SurrealHandle::in_memory().await;
        assert!(handle.is_ok(), "Failed to connect: {:?}", handle.err());
    }

    #[tokio::test]
    async fn local_database_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Data").join("buildcast.db");

        let handle = SurrealHandle::open_local(&path).await;

        assert!(handle.is_ok(), "Failed to open: {:?}", handle.err());
        assert!(path.exists());
    }
}
