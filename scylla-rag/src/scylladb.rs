//! ScyllaDB vector store backend.
//!
//! Provides [`ScyllaVectorStore`] which implements [`VectorStore`] using the
//! [scylla](https://docs.rs/scylla) driver and ScyllaDB vector search.
//!
//! This module is only available when the `scylla` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use scylla_rag::{StoreConfig, scylladb::ScyllaVectorStore};
//!
//! let store = ScyllaVectorStore::connect(&StoreConfig::default()).await?;
//! store.create_collection("md_chunks", 768).await?;
//! let results = store.search("md_chunks", &query_embedding, 3).await?;
//! store.shutdown().await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use scylla::client::execution_profile::ExecutionProfile;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use scylla::errors::{ExecutionError, PrepareError, RequestAttemptError};
use scylla::policies::load_balancing::DefaultPolicy;
use scylla::statement::prepared::PreparedStatement;
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::document::{Record, RetrievedChunk};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "ScyllaDB";

#[derive(Clone)]
struct Statements {
    insert: PreparedStatement,
    search: PreparedStatement,
}

/// A [`VectorStore`] backed by ScyllaDB vector search.
///
/// Each collection is a table `(chunk_id uuid PRIMARY KEY, text text,
/// embedding vector<float, N>)` with a cosine vector index on `embedding`.
/// Collection names may be qualified as `keyspace.table`; unqualified names
/// resolve against the keyspace from [`StoreConfig`].
///
/// The session is released by [`shutdown`](VectorStore::shutdown). Any call
/// after that fails with [`RagError::ConnectionError`].
pub struct ScyllaVectorStore {
    session: RwLock<Option<Session>>,
    statements: RwLock<HashMap<String, Statements>>,
}

impl ScyllaVectorStore {
    /// Connect to the cluster described by `config`.
    ///
    /// Requests are routed token-aware, preferring `config.datacenter` when set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConnectionError`] if no contact point accepts the
    /// connection or the credentials are refused.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let mut policy = DefaultPolicy::builder().token_aware(true);
        if let Some(datacenter) = &config.datacenter {
            policy = policy.prefer_datacenter(datacenter.clone());
        }
        let profile = ExecutionProfile::builder().load_balancing_policy(policy.build()).build();

        let nodes: Vec<String> =
            config.hosts.iter().map(|host| format!("{host}:{}", config.port)).collect();
        let mut builder = SessionBuilder::new()
            .known_nodes(&nodes)
            .default_execution_profile_handle(profile.into_handle())
            .use_keyspace(&config.keyspace, false);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.user(username, password);
        }

        let session = builder.build().await.map_err(|e| {
            error!(backend = BACKEND, nodes = ?nodes, error = %e, "connection failed");
            RagError::ConnectionError { backend: BACKEND.to_string(), message: e.to_string() }
        })?;

        info!(backend = BACKEND, nodes = ?nodes, keyspace = %config.keyspace, "connected");
        Ok(Self { session: RwLock::new(Some(session)), statements: RwLock::new(HashMap::new()) })
    }

    /// Sanitize a collection name for use as a (possibly keyspace-qualified) table name.
    ///
    /// Characters outside `[A-Za-z0-9_]` become underscores in each dot-separated part.
    fn sanitize_table_name(name: &str) -> Result<String> {
        let parts: Vec<String> = name
            .split('.')
            .map(|part| {
                part.chars()
                    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
                    .collect()
            })
            .collect();
        if parts.len() > 2 || parts.iter().any(String::is_empty) {
            return Err(RagError::ConfigError(format!(
                "'{name}' is not a valid table or keyspace.table name"
            )));
        }
        Ok(parts.join("."))
    }

    fn closed() -> RagError {
        RagError::ConnectionError {
            backend: BACKEND.to_string(),
            message: "session has been shut down".to_string(),
        }
    }

    fn connection_error(message: String) -> RagError {
        RagError::ConnectionError { backend: BACKEND.to_string(), message }
    }

    /// Map a driver error, keeping connection loss distinguishable from
    /// failures of the request itself.
    fn classify(e: ExecutionError, otherwise: fn(String) -> RagError) -> RagError {
        let lost = match &e {
            ExecutionError::ConnectionPoolError(_) => true,
            ExecutionError::LastAttemptError(attempt) => lost_connection(attempt),
            _ => false,
        };
        if lost { Self::connection_error(e.to_string()) } else { otherwise(e.to_string()) }
    }

    /// Same as [`classify`](Self::classify) for statement preparation. A
    /// missing table is reported by the server and goes to `otherwise`.
    fn classify_prepare(
        e: PrepareError,
        table: &str,
        otherwise: fn(String) -> RagError,
    ) -> RagError {
        let lost = match &e {
            PrepareError::ConnectionPoolError(_) => true,
            PrepareError::AllAttemptsFailed { first_attempt } => lost_connection(first_attempt),
            _ => false,
        };
        let message = format!("failed to prepare statement for '{table}': {e}");
        if lost { Self::connection_error(message) } else { otherwise(message) }
    }

    fn write_error(message: String) -> RagError {
        RagError::IndexWriteError { backend: BACKEND.to_string(), message }
    }

    fn read_error(message: String) -> RagError {
        RagError::RetrievalError { backend: BACKEND.to_string(), message }
    }

    async fn statements(
        &self,
        session: &Session,
        table: &str,
        otherwise: fn(String) -> RagError,
    ) -> Result<Statements> {
        if let Some(statements) = self.statements.read().await.get(table) {
            return Ok(statements.clone());
        }

        let prepare = |cql: String| async move {
            session.prepare(cql).await.map_err(|e| Self::classify_prepare(e, table, otherwise))
        };
        let statements = Statements {
            insert: prepare(insert_cql(table)).await?,
            search: prepare(search_cql(table)).await?,
        };

        self.statements.write().await.insert(table.to_string(), statements.clone());
        Ok(statements)
    }
}

/// Whether a failed attempt means the connection itself is gone.
fn lost_connection(attempt: &RequestAttemptError) -> bool {
    matches!(
        attempt,
        RequestAttemptError::BrokenConnectionError(_) | RequestAttemptError::UnableToAllocStreamId
    )
}

fn create_table_cql(table: &str, dimensions: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            chunk_id uuid PRIMARY KEY, \
            text text, \
            embedding vector<float, {dimensions}>\
        )"
    )
}

fn create_index_cql(table: &str) -> String {
    let index = format!("{}_embedding_idx", table.rsplit('.').next().unwrap_or(table));
    format!(
        "CREATE INDEX IF NOT EXISTS {index} ON {table} (embedding) \
         USING 'vector_index' WITH OPTIONS = {{'similarity_function': 'COSINE'}}"
    )
}

fn insert_cql(table: &str) -> String {
    format!("INSERT INTO {table} (chunk_id, text, embedding) VALUES (?, ?, ?)")
}

fn search_cql(table: &str) -> String {
    format!(
        "SELECT chunk_id, text, similarity_cosine(embedding, ?) AS score \
         FROM {table} ORDER BY embedding ANN OF ? LIMIT ?"
    )
}

#[async_trait]
impl VectorStore for ScyllaVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let table = Self::sanitize_table_name(name)?;
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(Self::closed)?;

        for cql in [create_table_cql(&table, dimensions), create_index_cql(&table)] {
            session
                .query_unpaged(cql, &[])
                .await
                .map_err(|e| Self::classify(e, Self::write_error))?;
        }

        debug!(collection = name, table = %table, dimensions, "created ScyllaDB table");
        Ok(())
    }

    async fn insert(&self, record: &Record) -> Result<()> {
        let table = Self::sanitize_table_name(&record.collection)?;
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(Self::closed)?;
        let statements = self.statements(session, &table, Self::write_error).await?;

        session
            .execute_unpaged(&statements.insert, (record.id, &record.text, &record.embedding))
            .await
            .map_err(|e| Self::classify(e, Self::write_error))?;

        debug!(table = %table, id = %record.id, "inserted record");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        let table = Self::sanitize_table_name(collection)?;
        let limit = i32::try_from(top_k)
            .map_err(|_| RagError::ConfigError(format!("top_k {top_k} is too large")))?;
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or_else(Self::closed)?;
        let statements = self.statements(session, &table, Self::read_error).await?;

        let embedding = embedding.to_vec();
        let result = session
            .execute_unpaged(&statements.search, (&embedding, &embedding, limit))
            .await
            .map_err(|e| Self::classify(e, Self::read_error))?;

        let rows = result.into_rows_result().map_err(|e| Self::read_error(e.to_string()))?;
        let mut chunks = Vec::new();
        for row in rows.rows::<(Uuid, String, f32)>().map_err(|e| Self::read_error(e.to_string()))? {
            let (id, text, score) = row.map_err(|e| Self::read_error(e.to_string()))?;
            chunks.push(RetrievedChunk { id, text, score });
        }

        debug!(table = %table, result_count = chunks.len(), "ANN search completed");
        Ok(chunks)
    }

    async fn shutdown(&self) -> Result<()> {
        // dropping the session closes its connection pools
        if self.session.write().await.take().is_some() {
            self.statements.write().await.clear();
            info!(backend = BACKEND, "session closed");
        }
        Ok(())
    }
}
