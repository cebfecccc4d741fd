//! Transaction helpers.
//!
//! The query translator never groups statements on its own. Work that must
//! commit or roll back together runs inside [`transaction`] (or the
//! [`transaction!`](crate::transaction!) macro), and every builder terminal in
//! that unit of work is given the transaction handle instead of the plain
//! client:
//!
//! ```ignore
//! use restodb::{from, transaction};
//!
//! let mut client = pool.get().await?;
//! let expense = transaction(&mut client, |tx| {
//!     Box::pin(async move {
//!         let expense = from("expenses")
//!             .returning()
//!             .insert(tx, &new_expense)
//!             .await
//!             .into_result()?;
//!         from("projects")
//!             .eq("id", project_id)
//!             .update(tx, &json!({"updated_at": now}))
//!             .await
//!             .into_result()?;
//!         Ok(expense)
//!     })
//! })
//! .await?;
//! ```

use crate::error::{OrmError, OrmResult};
use futures_util::future::BoxFuture;
use tokio_postgres::{Client, Transaction};

/// Run `f` inside a transaction on `client`.
///
/// - Begins a transaction.
/// - Commits when the callback returns `Ok`.
/// - Rolls back and returns the callback's error when it returns `Err`.
///
/// Pooled connections work too: `&mut deadpool_postgres::Client` derefs to
/// `&mut tokio_postgres::Client`.
pub async fn transaction<T, F>(client: &mut Client, f: F) -> OrmResult<T>
where
    F: for<'t> FnOnce(&'t Transaction<'t>) -> BoxFuture<'t, OrmResult<T>>,
{
    let tx = client
        .transaction()
        .await
        .map_err(OrmError::from_db_error)?;
    tracing::debug!(target: "restodb.tx", "transaction started");

    let result = f(&tx).await;
    finish(tx, result).await
}

/// Commit on `Ok`, roll back on `Err`.
async fn finish<T>(tx: Transaction<'_>, result: OrmResult<T>) -> OrmResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(OrmError::from_db_error)?;
            tracing::debug!(target: "restodb.tx", "transaction committed");
            Ok(value)
        }
        Err(error) => match tx.rollback().await {
            Ok(()) => {
                tracing::debug!(target: "restodb.tx", error = %error, "transaction rolled back");
                Err(error)
            }
            Err(rollback_err) => {
                tracing::warn!(
                    target: "restodb.tx",
                    error = %error,
                    rollback_error = %rollback_err,
                    "rollback failed"
                );
                Err(OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                )))
            }
        },
    }
}

/// Runs the given block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits on `Ok(_)`.
/// - Rolls back on `Err(_)`.
///
/// The block must evaluate to `restodb::OrmResult<T>`. Unlike
/// [`transaction`](crate::transaction::transaction) the body is inline, so it
/// can borrow local state freely.
///
/// ```ignore
/// restodb::transaction!(&mut client, tx, {
///     from("tasks").eq("id", 1).delete(&tx).await.into_result()?;
///     from("task_notes").eq("task_id", 1).delete(&tx).await.into_result()?;
///     Ok(())
/// })?;
/// ```
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err($crate::OrmError::from_db_error)?;

        let __restodb_tx_body_result = async { $body }.await;
        match __restodb_tx_body_result {
            Ok(value) => {
                $tx.commit()
                    .await
                    .map_err($crate::OrmError::from_db_error)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::OrmError::Other(format!(
                    "{error} (rollback failed: {rollback_err})"
                ))),
            },
        }
    }};
}
