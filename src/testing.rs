//! In-memory [`Connection`] that records statements and replays canned outcomes.

use crate::connection::{Connection, Database, ExecOutcome, ExecutorError};
use crate::core::{Row, Value};
use crate::statement::Statement;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub statement: Statement,
    pub parameters: Vec<Value>,
}

#[derive(Debug, Default)]
struct Recording {
    outcomes: VecDeque<Result<ExecOutcome, ExecutorError>>,
    executed: Vec<ExecutedStatement>,
}

/// Answers each `execute` with the next queued outcome, or
/// [`ExecOutcome::Success`] once the queue is empty.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    state: Mutex<Recording>,
}

impl RecordingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// A [`Database`] whose every acquisition returns this connection.
    pub fn database(self: &Arc<Self>) -> Database {
        Database::single(Arc::clone(self) as Arc<dyn Connection>)
    }

    pub fn push_outcome(&self, outcome: Result<ExecOutcome, ExecutorError>) {
        self.lock().outcomes.push_back(outcome);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push_outcome(Ok(ExecOutcome::Rows(rows)));
    }

    pub fn push_error(&self, error: ExecutorError) {
        self.push_outcome(Err(error));
    }

    pub fn executed(&self) -> Vec<ExecutedStatement> {
        self.lock().executed.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().executed.len()
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        // A panicking test thread must not hide what was recorded.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute(&self, statement: &Statement, parameters: &[Value]) -> Result<ExecOutcome, ExecutorError> {
        let mut state = self.lock();
        state.executed.push(ExecutedStatement {
            statement: statement.clone(),
            parameters: parameters.to_vec(),
        });
        state.outcomes.pop_front().unwrap_or(Ok(ExecOutcome::Success))
    }
}

/// Builds a result row from `(column, value)` pairs.
pub fn row<I, K, V>(pairs: I) -> Row
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(column, value)| (column.into(), value.into()))
        .collect()
}
