//! Convenient imports for typical `restodb` usage.
//!
//! ```ignore
//! use restodb::prelude::*;
//! ```

pub use crate::{DbError, GenericClient, OrmError, OrmResult, Record, Response, from, transaction};

#[cfg(feature = "pool")]
pub use crate::{create_pool, create_pool_with_config};
