//! Binding untyped JSON values as positional parameters.
//!
//! Payloads and predicate values are `serde_json::Value`s. [`BindValue`] adapts
//! one of them to whatever type the server inferred for its placeholder, so
//! `{"qty": 3}` binds as `int4`, `{"cost": "12.50"}` as `numeric` and
//! `{"id": "..."}` as `uuid`, without the caller spelling out Rust types.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};

type BoxError = Box<dyn Error + Sync + Send>;

/// A borrowed JSON value bound against the server-inferred parameter type.
#[derive(Debug, Clone, Copy)]
pub struct BindValue<'a>(pub &'a Value);

impl ToSql for BindValue<'_> {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self.0 {
            Value::Null => Ok(IsNull::Yes),
            value if is_json(ty) => value.to_sql(ty, out),
            Value::Array(items) => match ty.kind() {
                Kind::Array(_) => items
                    .iter()
                    .map(BindValue)
                    .collect::<Vec<_>>()
                    .to_sql(ty, out),
                _ => Err(mismatch(self.0, ty)),
            },
            Value::Object(_) => Err(mismatch(self.0, ty)),
            Value::Bool(b) => bind_bool(*b, ty, out),
            Value::Number(n) => bind_number(n, ty, out),
            Value::String(s) => bind_text(s, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn is_json(ty: &Type) -> bool {
    *ty == Type::JSON || *ty == Type::JSONB
}

fn is_text(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    ) || matches!(ty.kind(), Kind::Enum(_))
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("cannot bind a JSON {kind} to a parameter of type {ty}").into()
}

fn bind_bool(b: bool, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::BOOL => b.to_sql(ty, out),
        _ if is_text(ty) => (if b { "true" } else { "false" }).to_sql(ty, out),
        _ => Err(mismatch(&Value::Bool(b), ty)),
    }
}

fn integer(n: &Number) -> Result<i64, BoxError> {
    if let Some(i) = n.as_i64() {
        return Ok(i);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
            Ok(f as i64)
        }
        _ => Err(format!("{n} is not an integer").into()),
    }
}

fn float(n: &Number) -> Result<f64, BoxError> {
    n.as_f64()
        .ok_or_else(|| format!("{n} is not representable as a float").into())
}

fn decimal(s: &str) -> Result<Decimal, BoxError> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .map_err(|e| format!("invalid numeric '{s}': {e}").into())
}

fn bind_number(n: &Number, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(integer(n)?)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(integer(n)?)?.to_sql(ty, out),
        Type::INT8 => integer(n)?.to_sql(ty, out),
        Type::OID => u32::try_from(integer(n)?)?.to_sql(ty, out),
        Type::FLOAT4 => (float(n)? as f32).to_sql(ty, out),
        Type::FLOAT8 => float(n)?.to_sql(ty, out),
        Type::NUMERIC => decimal(&n.to_string())?.to_sql(ty, out),
        _ if is_text(ty) => n.to_string().as_str().to_sql(ty, out),
        _ => Err(mismatch(&Value::Number(n.clone()), ty)),
    }
}

fn parse_bool(s: &str) -> Result<bool, BoxError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean '{other}'").into()),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    Ok(date.and_time(NaiveTime::MIN))
}

fn parse_date(s: &str) -> Result<NaiveDate, BoxError> {
    let s = s.trim();
    match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => Ok(parse_timestamp(s)?.date()),
    }
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::BOOL => parse_bool(s)?.to_sql(ty, out),
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => decimal(s)?.to_sql(ty, out),
        Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::DATE => parse_date(s)?.to_sql(ty, out),
        Type::TIME => NaiveTime::from_str(s.trim())?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamp(s)?.and_utc().to_sql(ty, out),
        _ if is_text(ty) => s.to_sql(ty, out),
        _ => Err(mismatch(&Value::String(s.to_string()), ty)),
    }
}
