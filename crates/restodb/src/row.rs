//! Row decoding into untyped records.
//!
//! Every result row becomes a [`Record`], a JSON object keyed by column name.
//! Column values are mapped by their Postgres type:
//!
//! | Postgres | JSON |
//! |---|---|
//! | `bool` | boolean |
//! | `int2`/`int4`/`int8`/`oid`, `float4`/`float8` | number |
//! | `numeric`, `money` | string (exact decimal text) |
//! | `uuid`, `inet`, `date`, `time`, `timestamp`, `timestamptz` | string |
//! | `interval` | string, Postgres output style (`1 year 2 mons 3 days 04:05:06`) |
//! | `bytea` | string, `\x` hex |
//! | `json`/`jsonb` | the stored JSON |
//! | text-like and enum types | string |
//! | any one-dimensional array | array of decoded elements |
//! | domains | decoded as their base type |
//!
//! Any other type decodes to its raw payload as a `\x` hex string, so an
//! unusual column never fails a statement that has already run.
//!
//! `NULL` is always JSON `null`.

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::error::Error;
use std::net::IpAddr;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};

type BoxError = Box<dyn Error + Sync + Send>;

/// An untyped row: column name to value, in column order.
pub type Record = serde_json::Map<String, Value>;

/// Decode every column of a driver row into a [`Record`].
pub fn decode_row(row: &Row) -> OrmResult<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row
            .try_get::<_, Option<Raw<'_>>>(idx)
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        let value = decode_value(column.type_(), raw.map(|r| r.0))
            .map_err(|e| OrmError::decode(column.name(), e.to_string()))?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

/// Map a record onto a typed struct via `serde`.
pub fn from_record<T: DeserializeOwned>(record: Record) -> OrmResult<T> {
    serde_json::from_value(Value::Object(record)).map_err(|e| OrmError::decode("*", e.to_string()))
}

/// Undecoded binary payload of a value of any type.
struct Raw<'a>(&'a [u8]);

impl<'a> FromSql<'a> for Raw<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        Ok(Raw(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn string(value: impl ToString) -> Value {
    Value::String(value.to_string())
}

fn decode_value(ty: &Type, raw: Option<&[u8]>) -> Result<Value, BoxError> {
    let Some(raw) = raw else {
        return Ok(Value::Null);
    };
    let value = match *ty {
        Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
        Type::INT2 => Value::from(i16::from_sql(ty, raw)?),
        Type::INT4 => Value::from(i32::from_sql(ty, raw)?),
        Type::INT8 => Value::from(i64::from_sql(ty, raw)?),
        Type::OID => Value::from(u32::from_sql(ty, raw)?),
        Type::FLOAT4 => Value::from(f64::from(f32::from_sql(ty, raw)?)),
        Type::FLOAT8 => Value::from(f64::from_sql(ty, raw)?),
        Type::NUMERIC => string(Decimal::from_sql(ty, raw)?),
        Type::MONEY => string(Decimal::new(i64_be(raw)?, 2)),
        Type::UUID => string(uuid::Uuid::from_sql(ty, raw)?),
        Type::INET => string(IpAddr::from_sql(ty, raw)?),
        Type::DATE => string(NaiveDate::from_sql(ty, raw)?),
        Type::TIME => string(NaiveTime::from_sql(ty, raw)?),
        Type::TIMESTAMP => {
            string(NaiveDateTime::from_sql(ty, raw)?.format("%Y-%m-%dT%H:%M:%S%.f"))
        }
        Type::TIMESTAMPTZ => string(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339()),
        Type::INTERVAL => string(interval_text(raw)?),
        Type::BYTEA => string(format!("\\x{}", hex::encode(raw))),
        Type::JSON | Type::JSONB => Value::from_sql(ty, raw)?,
        _ if is_text(ty) => string(std::str::from_utf8(raw)?),
        _ => match ty.kind() {
            Kind::Array(member) => {
                let items = Vec::<Option<Raw<'_>>>::from_sql(ty, raw)?;
                Value::Array(
                    items
                        .into_iter()
                        .map(|item| decode_value(member, item.map(|r| r.0)))
                        .collect::<Result<_, _>>()?,
                )
            }
            Kind::Domain(base) => decode_value(base, Some(raw))?,
            _ => string(format!("\\x{}", hex::encode(raw))),
        },
    };
    Ok(value)
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN | Type::XML
    ) || ty.name() == "citext"
        || matches!(ty.kind(), Kind::Enum(_))
}

fn i64_be(raw: &[u8]) -> Result<i64, BoxError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| "invalid 8-byte value")?;
    Ok(i64::from_be_bytes(bytes))
}

/// Render a binary `interval` (microseconds, days, months) the way Postgres
/// prints it with the default `IntervalStyle`.
fn interval_text(raw: &[u8]) -> Result<String, BoxError> {
    if raw.len() != 16 {
        return Err(format!("invalid interval length {}", raw.len()).into());
    }
    let micros = i64_be(&raw[..8])?;
    let days = i32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]);
    let months = i32::from_be_bytes([raw[12], raw[13], raw[14], raw[15]]);

    fn unit(n: i64, name: &str) -> String {
        format!("{n} {name}{}", if n == 1 { "" } else { "s" })
    }

    let mut parts = Vec::new();
    let (years, mons) = (i64::from(months / 12), i64::from(months % 12));
    if years != 0 {
        parts.push(unit(years, "year"));
    }
    if mons != 0 {
        parts.push(unit(mons, "mon"));
    }
    if days != 0 {
        parts.push(unit(i64::from(days), "day"));
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let (hours, rest) = (total / 3_600_000_000, total % 3_600_000_000);
        let (minutes, rest) = (rest / 60_000_000, rest % 60_000_000);
        let (seconds, fraction) = (rest / 1_000_000, rest % 1_000_000);
        let mut time = format!("{sign}{hours:02}:{minutes:02}:{seconds:02}");
        if fraction != 0 {
            let digits = format!("{fraction:06}");
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }
    Ok(parts.join(" "))
}
