pub mod config;

use crate::core::{RequestError, Row, Value};
use crate::statement::Statement;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutorError {
    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("{0}")]
    Other(String),
}

impl From<ExecutorError> for RequestError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Request(err) => err,
            ExecutorError::Query(msg) | ExecutorError::Database(msg) => RequestError::query(msg),
            ExecutorError::Decoding(msg) => RequestError::codable_decoding(msg),
            ExecutorError::Connection(msg) => RequestError::connection_failed().context(msg),
            ExecutorError::Other(msg) => RequestError::internal(msg),
        }
    }
}

/// Result of running one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Success,
    Rows(Vec<Row>),
}

impl ExecOutcome {
    /// Rows returned, empty for [`ExecOutcome::Success`].
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            ExecOutcome::Success => Vec::new(),
            ExecOutcome::Rows(rows) => rows,
        }
    }
}

/// A live connection able to execute statements.
#[async_trait]
pub trait Connection: Send + Sync {
    async fn execute(&self, statement: &Statement, parameters: &[Value]) -> Result<ExecOutcome, ExecutorError>;
}

/// Hands out connections; pooling and retry live behind this trait.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn acquire(&self) -> Result<Arc<dyn Connection>, ExecutorError>;
}

struct SingleConnection(Arc<dyn Connection>);

#[async_trait]
impl ConnectionProvider for SingleConnection {
    async fn acquire(&self) -> Result<Arc<dyn Connection>, ExecutorError> {
        Ok(Arc::clone(&self.0))
    }
}

/// Cloneable database handle passed to orchestrator operations.
#[derive(Clone)]
pub struct Database {
    provider: Arc<dyn ConnectionProvider>,
}

impl Database {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Wraps one shared connection.
    pub fn single(connection: Arc<dyn Connection>) -> Self {
        Self::new(Arc::new(SingleConnection(connection)))
    }

    pub async fn connection(&self) -> crate::core::Result<Arc<dyn Connection>> {
        self.provider
            .acquire()
            .await
            .map_err(|err| RequestError::connection_failed().context(err))
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
