//! Recording client used by unit tests.

use crate::client::{GenericClient, QueryOutput};
use crate::error::{OrmError, OrmResult};
use crate::query::Statement;
use crate::row::Record;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Records every statement and answers with scripted replies (empty output once exhausted).
#[derive(Default)]
pub(crate) struct DummyClient {
    calls: Mutex<Vec<Statement>>,
    replies: Mutex<VecDeque<OrmResult<QueryOutput>>>,
}

pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

impl DummyClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply_rows(self, rows: Vec<Value>) -> Self {
        let rows = rows.into_iter().map(record).collect();
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(QueryOutput::from_rows(rows)));
        self
    }

    pub(crate) fn reply_affected(self, row_count: u64) -> Self {
        self.replies.lock().unwrap().push_back(Ok(QueryOutput {
            rows: Vec::new(),
            row_count,
        }));
        self
    }

    pub(crate) fn reply_error(self, err: OrmError) -> Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub(crate) fn calls(&self) -> Vec<Statement> {
        self.calls.lock().unwrap().clone()
    }
}

impl GenericClient for DummyClient {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        self.calls.lock().unwrap().push(Statement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryOutput::default()))
    }
}
