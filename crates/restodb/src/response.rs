//! The `{ data, error }` envelope returned by every query terminal.

use crate::error::{OrmError, OrmResult};
use crate::row::{Record, from_record};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Code reported when `single()` matches no rows.
pub const NOT_FOUND_CODE: &str = "PGRST116";
/// Message reported when `single()` matches no rows.
pub const NOT_FOUND_MESSAGE: &str = "No rows found";

/// Error half of the envelope: a message plus the SQLSTATE (or sentinel) code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl DbError {
    pub fn new(message: impl Into<String>, code: Option<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// The `single()` miss sentinel.
    pub fn not_found() -> Self {
        Self::new(NOT_FOUND_MESSAGE, Some(NOT_FOUND_CODE.to_string()))
    }

    /// Whether this is the `single()` miss sentinel rather than a failure.
    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(NOT_FOUND_CODE)
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for DbError {}

impl From<OrmError> for DbError {
    fn from(err: OrmError) -> Self {
        match err {
            OrmError::Database { code, message, .. } => Self::new(message, Some(code)),
            OrmError::NotFound(_) => Self::not_found(),
            other => Self::new(other.to_string(), None),
        }
    }
}

impl From<DbError> for OrmError {
    fn from(err: DbError) -> Self {
        match err.code {
            Some(code) if code == NOT_FOUND_CODE => OrmError::NotFound(err.message),
            Some(code) => OrmError::Database {
                code,
                message: err.message,
                constraint: None,
            },
            None => OrmError::Other(err.message),
        }
    }
}

/// Result envelope. On success `error` is `None`; on failure `data` is `None`.
///
/// Mutations that were not asked to return rows succeed with `data: None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<T> {
    pub data: Option<T>,
    pub error: Option<DbError>,
}

impl<T> Response<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }

    /// Success without a payload.
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn err(error: impl Into<DbError>) -> Self {
        Self {
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// True only for the `single()` miss sentinel.
    pub fn is_not_found(&self) -> bool {
        self.error.as_ref().is_some_and(DbError::is_not_found)
    }

    /// Convert into a `Result`, keeping the optional payload.
    pub fn into_result(self) -> Result<Option<T>, DbError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Response<U> {
        Response {
            data: self.data.map(f),
            error: self.error,
        }
    }
}

impl<T> From<OrmResult<T>> for Response<T> {
    fn from(result: OrmResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(err),
        }
    }
}

impl Response<Record> {
    /// Decode the row into a typed value.
    pub fn decode<T: DeserializeOwned>(self) -> Response<T> {
        match self.into_result() {
            Ok(Some(record)) => from_record(record).into(),
            Ok(None) => Response::empty(),
            Err(error) => Response::err(error),
        }
    }
}

impl Response<Vec<Record>> {
    /// Decode every row into a typed value; the first failure becomes the error.
    pub fn decode<T: DeserializeOwned>(self) -> Response<Vec<T>> {
        match self.into_result() {
            Ok(Some(records)) => records
                .into_iter()
                .map(from_record)
                .collect::<OrmResult<Vec<T>>>()
                .into(),
            Ok(None) => Response::empty(),
            Err(error) => Response::err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn database_errors_keep_their_code() {
        let err: DbError = OrmError::database("23505", "duplicate key value").into();
        assert_eq!(err.message, "duplicate key value");
        assert_eq!(err.code.as_deref(), Some("23505"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn other_errors_have_no_code() {
        let err: DbError = OrmError::Connection("refused".into()).into();
        assert_eq!(err.code, None);
        assert_eq!(err.message, "Connection error: refused");
    }

    #[test]
    fn not_found_sentinel_serializes_like_the_wire_shape() {
        let resp: Response<Record> = Response::err(DbError::not_found());
        assert!(resp.is_not_found());
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"data": null, "error": {"message": "No rows found", "code": "PGRST116"}})
        );
    }

    #[test]
    fn envelope_errors_convert_back_for_question_mark() {
        let err: OrmError = DbError::not_found().into();
        assert!(err.is_not_found());
        assert!(DbError::from(err).is_not_found());

        let err: OrmError = DbError::new("violates foreign key", Some("23503".into())).into();
        assert!(err.is_foreign_key_violation());
    }

    #[test]
    fn empty_success_has_neither_data_nor_error() {
        let resp: Response<Vec<Record>> = Response::empty();
        assert!(resp.is_ok());
        assert_eq!(resp.into_result(), Ok(None));
    }

    #[test]
    fn decode_maps_records() {
        #[derive(Debug, serde::Deserialize, PartialEq)]
        struct Part {
            sku: String,
        }

        let mut record = Record::new();
        record.insert("sku".into(), json!("AB-1"));
        let resp = Response::ok(vec![record]).decode::<Part>();
        assert_eq!(resp.data, Some(vec![Part { sku: "AB-1".into() }]));
    }
}
