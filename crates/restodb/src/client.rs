//! Generic client trait for unified database access.

use crate::error::{OrmError, OrmResult};
use crate::row::{Record, decode_row};
use crate::value::BindValue;
use futures_util::{TryStreamExt, pin_mut};
use serde_json::Value;
use tokio_postgres::types::ToSql;

/// Rows produced by one statement plus the number of rows it touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOutput {
    /// Decoded result rows (empty for statements without a result set).
    pub rows: Vec<Record>,
    /// Rows returned or affected, as reported by the server.
    pub row_count: u64,
}

impl QueryOutput {
    /// Output of a statement that returned `rows`.
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self {
            row_count: rows.len() as u64,
            rows,
        }
    }
}

/// A trait that unifies database clients and transactions.
///
/// This is the single seam between the query translator and the driver: one
/// parameterized statement in, decoded rows out. Anything accepting
/// `&impl GenericClient` works the same against a pooled connection, a plain
/// connection or an open transaction.
///
/// Parameters are untyped JSON values; each is coerced to the type the server
/// infers for its `$n` placeholder (see [`BindValue`]).
pub trait GenericClient: Send + Sync {
    /// Execute one statement and return its rows and row count.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<QueryOutput>> + Send;
}

async fn run<C>(client: &C, sql: &str, params: &[Value]) -> OrmResult<QueryOutput>
where
    C: tokio_postgres::GenericClient + Sync,
{
    let binds: Vec<BindValue<'_>> = params.iter().map(BindValue).collect();
    let refs: Vec<&(dyn ToSql + Sync)> = binds
        .iter()
        .map(|b| b as &(dyn ToSql + Sync))
        .collect();

    let stream = client
        .query_raw(sql, refs.iter().copied())
        .await
        .map_err(OrmError::from_db_error)?;
    pin_mut!(stream);

    let mut rows = Vec::new();
    while let Some(row) = stream.try_next().await.map_err(OrmError::from_db_error)? {
        rows.push(decode_row(&row)?);
    }
    let row_count = stream.rows_affected().unwrap_or(rows.len() as u64);
    Ok(QueryOutput { rows, row_count })
}

impl GenericClient for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        run(self, sql, params).await
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        run(self, sql, params).await
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        // Delegate to the deref target (ClientWrapper -> tokio_postgres::Client).
        let client: &tokio_postgres::Client = self;
        run(client, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl GenericClient for deadpool_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<QueryOutput> {
        let tx: &tokio_postgres::Transaction<'_> = self;
        run(tx, sql, params).await
    }
}
