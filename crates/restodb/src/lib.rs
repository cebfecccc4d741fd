//! # restodb
//!
//! Fluent, PostgREST-style data access for PostgreSQL.
//!
//! ## Features
//!
//! - **Fluent builder**: `from(table)` chains predicates, ordering and pagination into one parameterized statement
//! - **Values are always bound**: filter and payload values travel as `$n` parameters, never as SQL text
//! - **Envelope results**: every terminal resolves to `{ data, error }` instead of panicking or returning `Err`
//! - **Transaction-friendly**: pass a transaction anywhere a `GenericClient` is expected
//! - **Traced**: every statement is logged under the `restodb.sql` target
//!
//! ## Query Builder
//!
//! ```ignore
//! use restodb::from;
//!
//! // SELECT
//! let tasks = from("tasks")
//!     .eq("project_id", 4)
//!     .order("due_date", true)
//!     .limit(10)
//!     .execute(&client)
//!     .await;
//!
//! // INSERT ... RETURNING *
//! let created = from("expenses")
//!     .returning()
//!     .insert(&client, &json!({"project_id": 4, "amount": "120.00"}))
//!     .await;
//!
//! // UPDATE
//! from("tasks")
//!     .eq("id", task_id)
//!     .update(&client, &json!({"status": "done"}))
//!     .await;
//!
//! // DELETE
//! from("photos").eq("id", photo_id).delete(&client).await;
//! ```

pub mod budget;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod query;
pub mod response;
pub mod row;
pub mod transaction;
pub mod value;

#[cfg(test)]
mod testing;

pub use client::{GenericClient, QueryOutput};
pub use config::DatabaseConfig;
pub use error::{OrmError, OrmResult};
pub use query::{Filter, Op, QueryBuilder, SortKey, Statement, from};
pub use response::{DbError, NOT_FOUND_CODE, NOT_FOUND_MESSAGE, Response};
pub use row::{Record, from_record};
pub use transaction::transaction;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_config};
