//! Fluent query translator.
//!
//! A [`QueryBuilder`] accumulates a table, a projection, AND-ed predicates,
//! sort keys and pagination, then one terminal call renders a single
//! parameterized statement, runs it through a [`GenericClient`] and returns a
//! [`Response`] envelope:
//!
//! ```ignore
//! use restodb::from;
//!
//! // SELECT
//! let tasks = from("tasks")
//!     .eq("project_id", project_id)
//!     .order("due_date", true)
//!     .limit(20)
//!     .execute(&client)
//!     .await;
//!
//! // SELECT ... LIMIT 1, "PGRST116" on a miss
//! let project = from("projects").eq("id", project_id).single(&client).await;
//!
//! // INSERT ... RETURNING *
//! let created = from("expenses")
//!     .returning()
//!     .insert(&client, &json!({"project_id": project_id, "amount": "120.00"}))
//!     .await;
//!
//! // UPDATE / DELETE
//! from("tasks").eq("id", task_id).update(&client, &json!({"status": "done"})).await;
//! from("tasks").eq("id", task_id).delete(&client).await;
//! ```
//!
//! Terminals take the builder by value, so a descriptor runs at most once.
//!
//! # Identifiers
//!
//! Table, column and projection strings are spliced into the SQL text as
//! given. They are `&'static str` so they come from the program, never from
//! request input. Values are always bound as `$n` parameters.
//!
//! # Returning rows from mutations
//!
//! `insert`, `update` and `delete` return rows when [`QueryBuilder::returning`]
//! was called **or** the projection was changed with [`QueryBuilder::select`];
//! the rows use that projection (`RETURNING <projection>`). Otherwise no
//! RETURNING clause is sent and a successful mutation has `data: None`.

mod filter;
mod statement;

pub use filter::{Filter, Op, SortKey};
pub use statement::Statement;

use crate::client::{GenericClient, QueryOutput};
use crate::error::{OrmError, OrmResult};
use crate::response::{DbError, Response};
use crate::row::Record;
use serde::Serialize;
use serde_json::Value;

/// Projection used when `select` is never called.
pub const DEFAULT_PROJECTION: &str = "*";

const MAX_LOGGED_SQL: usize = 200;

/// Start a query against `table`.
pub fn from(table: &'static str) -> QueryBuilder {
    QueryBuilder::new(table)
}

/// Query descriptor: built up by chaining, consumed by one terminal.
#[derive(Debug, Clone)]
#[must_use = "a query does nothing until a terminal method is awaited"]
pub struct QueryBuilder {
    table: &'static str,
    projection: &'static str,
    filters: Vec<Filter>,
    order: Vec<SortKey>,
    limit: Option<u64>,
    offset: Option<u64>,
    returning: bool,
}

impl QueryBuilder {
    /// Create a new builder bound to `table`.
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            projection: DEFAULT_PROJECTION,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            returning: false,
        }
    }

    // ==================== Projection ====================

    /// Set the projected columns verbatim, e.g. `"id, name"` or `"count(*)"`.
    pub fn select(mut self, columns: &'static str) -> Self {
        self.projection = columns;
        self
    }

    // ==================== Predicates ====================

    /// Add WHERE: column = value
    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(column, Op::Eq, value));
        self
    }

    /// Add WHERE: column >= value
    pub fn gte(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(column, Op::Gte, value));
        self
    }

    /// Add WHERE: column <= value
    pub fn lte(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(column, Op::Lte, value));
        self
    }

    // ==================== Ordering & pagination ====================

    /// Add an ORDER BY key. Keys apply in call order.
    pub fn order(mut self, column: &'static str, ascending: bool) -> Self {
        self.order.push(SortKey { column, ascending });
        self
    }

    /// Add ORDER BY column ASC.
    pub fn asc(self, column: &'static str) -> Self {
        self.order(column, true)
    }

    /// Add ORDER BY column DESC.
    pub fn desc(self, column: &'static str) -> Self {
        self.order(column, false)
    }

    /// Set LIMIT. The last call wins.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET. The last call wins.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Ask mutation terminals to return the affected rows.
    pub fn returning(mut self) -> Self {
        self.returning = true;
        self
    }

    // ==================== Accessors ====================

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn projection(&self) -> &'static str {
        self.projection
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn sort_keys(&self) -> &[SortKey] {
        &self.order
    }

    /// Whether mutation terminals fetch rows: `returning()` was called or the
    /// projection is not `"*"`.
    pub fn returns_rows(&self) -> bool {
        self.returning || self.projection != DEFAULT_PROJECTION
    }

    // ==================== Rendering ====================

    fn push_where(&self, stmt: &mut Statement) {
        for (i, filter) in self.filters.iter().enumerate() {
            stmt.push_sql(if i == 0 { " WHERE " } else { " AND " });
            let idx = stmt.bind(filter.value.clone());
            stmt.push_sql(&format!("{} {} ${}", filter.column, filter.op.as_sql(), idx));
        }
    }

    fn push_returning(&self, stmt: &mut Statement) {
        if self.returns_rows() {
            stmt.push_sql(&format!(" RETURNING {}", self.projection));
        }
    }

    fn render_select(&self, limit: Option<u64>) -> Statement {
        let mut stmt = Statement::new(format!("SELECT {} FROM {}", self.projection, self.table));
        self.push_where(&mut stmt);

        if !self.order.is_empty() {
            let keys: Vec<String> = self.order.iter().map(|k| k.to_sql()).collect();
            stmt.push_sql(" ORDER BY ");
            stmt.push_sql(&keys.join(", "));
        }
        if let Some(limit) = limit {
            stmt.push_sql(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = self.offset {
            stmt.push_sql(&format!(" OFFSET {}", offset));
        }
        stmt
    }

    /// Statement run by [`QueryBuilder::execute`].
    pub fn to_select(&self) -> Statement {
        self.render_select(self.limit)
    }

    /// Statement run by [`QueryBuilder::single`] (`LIMIT 1` forced).
    pub fn to_single(&self) -> Statement {
        self.render_select(Some(1))
    }

    /// Statement run by [`QueryBuilder::insert`]. Payload keys become columns in order.
    pub fn to_insert(&self, data: &Record) -> Statement {
        let mut stmt = if data.is_empty() {
            Statement::new(format!("INSERT INTO {} DEFAULT VALUES", self.table))
        } else {
            let mut stmt = Statement::new(String::new());
            let placeholders: Vec<String> = data
                .values()
                .map(|value| format!("${}", stmt.bind(value.clone())))
                .collect();
            let columns: Vec<&str> = data.keys().map(String::as_str).collect();
            stmt.sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                columns.join(", "),
                placeholders.join(", ")
            );
            stmt
        };
        self.push_returning(&mut stmt);
        stmt
    }

    /// Statement run by [`QueryBuilder::update`]. SET parameters are numbered
    /// first, WHERE parameters continue the same sequence.
    pub fn to_update(&self, data: &Record) -> OrmResult<Statement> {
        if data.is_empty() {
            return Err(OrmError::validation("UPDATE requires at least one column"));
        }
        let mut stmt = Statement::new(format!("UPDATE {} SET ", self.table));
        let assignments: Vec<String> = data
            .iter()
            .map(|(column, value)| format!("{} = ${}", column, stmt.bind(value.clone())))
            .collect();
        stmt.push_sql(&assignments.join(", "));
        self.push_where(&mut stmt);
        self.push_returning(&mut stmt);
        Ok(stmt)
    }

    /// Statement run by [`QueryBuilder::delete`].
    pub fn to_delete(&self) -> Statement {
        let mut stmt = Statement::new(format!("DELETE FROM {}", self.table));
        self.push_where(&mut stmt);
        self.push_returning(&mut stmt);
        stmt
    }

    // ==================== Terminals ====================

    /// Run the SELECT and return every matching row.
    pub async fn execute(self, conn: &impl GenericClient) -> Response<Vec<Record>> {
        let stmt = self.to_select();
        run(conn, "select", self.table, &stmt).await.map(|out| out.rows).into()
    }

    /// Run the SELECT with `LIMIT 1` and return the first row.
    ///
    /// Zero rows yields the `"No rows found"` / `"PGRST116"` error.
    pub async fn single(self, conn: &impl GenericClient) -> Response<Record> {
        let stmt = self.to_single();
        match run(conn, "single", self.table, &stmt).await {
            Ok(out) => match out.rows.into_iter().next() {
                Some(row) => Response::ok(row),
                None => Response::err(DbError::not_found()),
            },
            Err(err) => Response::err(err),
        }
    }

    /// INSERT one row built from `data` (any value serializing to a JSON object).
    pub async fn insert<T>(self, conn: &impl GenericClient, data: &T) -> Response<Vec<Record>>
    where
        T: Serialize + ?Sized,
    {
        let data = match payload(data) {
            Ok(data) => data,
            Err(err) => return Response::err(err),
        };
        let stmt = self.to_insert(&data);
        self.finish_mutation(run(conn, "insert", self.table, &stmt).await)
    }

    /// UPDATE the rows matched by the predicates with the columns in `data`.
    pub async fn update<T>(self, conn: &impl GenericClient, data: &T) -> Response<Vec<Record>>
    where
        T: Serialize + ?Sized,
    {
        let stmt = match payload(data).and_then(|data| self.to_update(&data)) {
            Ok(stmt) => stmt,
            Err(err) => return Response::err(err),
        };
        self.warn_if_unfiltered("update");
        self.finish_mutation(run(conn, "update", self.table, &stmt).await)
    }

    /// DELETE the rows matched by the predicates.
    pub async fn delete(self, conn: &impl GenericClient) -> Response<Vec<Record>> {
        let stmt = self.to_delete();
        self.warn_if_unfiltered("delete");
        self.finish_mutation(run(conn, "delete", self.table, &stmt).await)
    }

    fn finish_mutation(&self, result: OrmResult<QueryOutput>) -> Response<Vec<Record>> {
        match result {
            Ok(out) if self.returns_rows() => Response::ok(out.rows),
            Ok(_) => Response::empty(),
            Err(err) => Response::err(err),
        }
    }

    fn warn_if_unfiltered(&self, op: &'static str) {
        if self.filters.is_empty() {
            tracing::warn!(
                target: "restodb.sql",
                table = self.table,
                op,
                "statement has no WHERE clause and affects every row"
            );
        }
    }
}

fn payload<T: Serialize + ?Sized>(data: &T) -> OrmResult<Record> {
    match serde_json::to_value(data) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(OrmError::validation("payload must serialize to a JSON object")),
        Err(e) => Err(OrmError::validation(e.to_string())),
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

async fn run(
    conn: &impl GenericClient,
    op: &'static str,
    table: &'static str,
    stmt: &Statement,
) -> OrmResult<QueryOutput> {
    tracing::debug!(
        target: "restodb.sql",
        table,
        op,
        param_count = stmt.param_count(),
        sql = %truncate_sql_bytes(&stmt.sql, MAX_LOGGED_SQL),
        "executing statement"
    );
    let result = conn.query(&stmt.sql, &stmt.params).await;
    if let Err(err) = &result {
        tracing::warn!(target: "restodb.sql", table, op, error = %err, "statement failed");
    }
    result
}
