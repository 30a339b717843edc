//! Byte-level (JSON) encoding of rows and metadata for the persistent
//! store variant, following the grammar of spec.md §6.
//!
//! ```text
//! TIMESTAMP    ::= [ [int,int] (, [int,int])* ]
//! SINGLE-VALUE ::= { ("t": TIMESTAMP ,)? "v": scalar }
//! MULTI-VALUE  ::= [ SINGLE-VALUE (, SINGLE-VALUE)+ ]
//! ```
//!
//! A singleton value's `"t"` is omitted when it equals the timestamp of
//! its enclosing entity — the one elision the wire format performs that
//! the in-memory [`MultiVersionValue`] does not.

use crate::error::{HistoryError, Result};
use crate::row::ArchiveRow;
use crate::schema::{ArchiveColumn, Schema};
use crate::snapshot::{SnapshotDescriptor, SnapshotListing};
use crate::types::{Key, MultiVersionValue, Scalar, Timestamp, TimestampedValue};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub fn encode_timestamp(ts: &Timestamp) -> Value {
    Value::Array(
        ts.intervals()
            .iter()
            .map(|&(a, b)| Value::Array(vec![json!(a), json!(b)]))
            .collect(),
    )
}

pub fn decode_timestamp(v: &Value) -> Result<Timestamp> {
    let arr = v.as_array().ok_or_else(|| HistoryError::Serialization("timestamp must be an array".into()))?;
    let mut intervals = Vec::with_capacity(arr.len());
    for entry in arr {
        let pair = entry.as_array().ok_or_else(|| HistoryError::Serialization("interval must be [a,b]".into()))?;
        if pair.len() != 2 {
            return Err(HistoryError::Serialization("interval must have exactly two elements".into()));
        }
        let a = pair[0].as_i64().ok_or_else(|| HistoryError::Serialization("interval bound must be an integer".into()))?;
        let b = pair[1].as_i64().ok_or_else(|| HistoryError::Serialization("interval bound must be an integer".into()))?;
        intervals.push((a, b));
    }
    Ok(Timestamp::from_intervals(intervals))
}

/// `Null`/`Bool`/`Integer` encode as bare JSON primitives (structurally
/// unambiguous). `Float`, `Text`, and `DateTime` all serialize to JSON
/// strings or numbers that can collide with one another (a NaN sentinel
/// string looks like legitimate text; an RFC3339 string looks like any
/// other string), so each is tagged with its variant to keep scalars
/// distinct and round-trip-preserving (spec.md §6, §7).
pub fn encode_scalar(s: &Scalar) -> Value {
    match s {
        Scalar::Null => Value::Null,
        Scalar::Bool(b) => json!(b),
        Scalar::Integer(i) => json!(i),
        Scalar::Float(f) => {
            let v = if f.is_nan() { json!("NaN") } else { json!(f) };
            json!({ "ty": "f", "v": v })
        }
        Scalar::Text(s) => json!({ "ty": "s", "v": s }),
        Scalar::DateTime(dt) => json!({ "ty": "dt", "v": dt.to_rfc3339() }),
    }
}

pub fn decode_scalar(v: &Value) -> Result<Scalar> {
    match v {
        Value::Null => Ok(Scalar::Null),
        Value::Bool(b) => Ok(Scalar::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Integer(i))
            } else {
                Ok(Scalar::Float(n.as_f64().unwrap_or(f64::NAN)))
            }
        }
        Value::Object(obj) => {
            let ty = obj
                .get("ty")
                .and_then(Value::as_str)
                .ok_or_else(|| HistoryError::Serialization("tagged scalar missing 'ty'".into()))?;
            let inner = obj.get("v").ok_or_else(|| HistoryError::Serialization("tagged scalar missing 'v'".into()))?;
            match ty {
                "f" => match inner {
                    Value::String(s) if s == "NaN" => Ok(Scalar::Float(f64::NAN)),
                    Value::Number(n) => Ok(Scalar::Float(
                        n.as_f64().ok_or_else(|| HistoryError::Serialization("malformed float scalar".into()))?,
                    )),
                    other => Err(HistoryError::Serialization(format!("malformed float scalar: {other}"))),
                },
                "s" => {
                    let text = inner.as_str().ok_or_else(|| HistoryError::Serialization("malformed text scalar".into()))?;
                    Ok(Scalar::Text(text.to_string()))
                }
                "dt" => {
                    let text = inner.as_str().ok_or_else(|| HistoryError::Serialization("malformed datetime scalar".into()))?;
                    let dt = chrono::DateTime::parse_from_rfc3339(text)
                        .map_err(|e| HistoryError::Serialization(format!("malformed datetime scalar: {e}")))?;
                    Ok(Scalar::DateTime(dt.with_timezone(&chrono::Utc)))
                }
                other => Err(HistoryError::Serialization(format!("unknown scalar tag '{other}'"))),
            }
        }
        other => Err(HistoryError::Serialization(format!("cannot decode scalar from {other}"))),
    }
}

fn encode_single<T>(tv: &TimestampedValue<T>, parent_ts: &Timestamp, encode_value: &dyn Fn(&T) -> Value) -> Value {
    if &tv.timestamp == parent_ts {
        json!({ "v": encode_value(&tv.value) })
    } else {
        json!({ "t": encode_timestamp(&tv.timestamp), "v": encode_value(&tv.value) })
    }
}

pub fn encode_mvv<T>(mvv: &MultiVersionValue<T>, parent_ts: &Timestamp, encode_value: &dyn Fn(&T) -> Value) -> Value {
    match mvv {
        MultiVersionValue::Single(tv) => encode_single(tv, parent_ts, encode_value),
        MultiVersionValue::Multi(list) => {
            Value::Array(list.iter().map(|tv| encode_single(tv, parent_ts, encode_value)).collect())
        }
    }
}

fn decode_single<T>(v: &Value, parent_ts: &Timestamp, decode_value: &dyn Fn(&Value) -> Result<T>) -> Result<TimestampedValue<T>> {
    let obj = v.as_object().ok_or_else(|| HistoryError::Serialization("expected a SINGLE-VALUE object".into()))?;
    let timestamp = match obj.get("t") {
        Some(t) => decode_timestamp(t)?,
        None => parent_ts.clone(),
    };
    let value = decode_value(obj.get("v").unwrap_or(&Value::Null))?;
    Ok(TimestampedValue::new(value, timestamp))
}

pub fn decode_mvv<T>(v: &Value, parent_ts: &Timestamp, decode_value: &dyn Fn(&Value) -> Result<T>) -> Result<MultiVersionValue<T>> {
    match v {
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(decode_single(item, parent_ts, decode_value)?);
            }
            if out.len() == 1 {
                Ok(MultiVersionValue::Single(out.remove(0)))
            } else {
                Ok(MultiVersionValue::Multi(out))
            }
        }
        Value::Object(_) => Ok(MultiVersionValue::Single(decode_single(v, parent_ts, decode_value)?)),
        other => Err(HistoryError::Serialization(format!("expected TV, got {other}"))),
    }
}

fn encode_key(key: &Key) -> Value {
    Value::Array(key.iter().map(encode_scalar).collect())
}

fn decode_key(v: &Value) -> Result<Key> {
    let arr = v.as_array().ok_or_else(|| HistoryError::Serialization("key must be an array".into()))?;
    arr.iter().map(decode_scalar).collect()
}

pub fn encode_row(row: &ArchiveRow) -> Value {
    let mut cells = serde_json::Map::new();
    for (col_id, mvv) in &row.cells {
        cells.insert(col_id.to_string(), encode_mvv(mvv, &row.timestamp, &encode_scalar));
    }
    json!({
        "r": row.row_id,
        "t": encode_timestamp(&row.timestamp),
        "k": encode_mvv(&row.key, &row.timestamp, &encode_key),
        "p": encode_mvv(&row.position, &row.timestamp, &|v: &i64| json!(v)),
        "c": cells,
    })
}

pub fn decode_row(v: &Value) -> Result<ArchiveRow> {
    let obj = v.as_object().ok_or_else(|| HistoryError::Serialization("row record must be an object".into()))?;
    let row_id = obj.get("r").and_then(Value::as_u64).ok_or_else(|| HistoryError::Serialization("row missing 'r'".into()))?;
    let timestamp = decode_timestamp(obj.get("t").ok_or_else(|| HistoryError::Serialization("row missing 't'".into()))?)?;
    let key = decode_mvv(obj.get("k").ok_or_else(|| HistoryError::Serialization("row missing 'k'".into()))?, &timestamp, &decode_key)?;
    let position = decode_mvv(
        obj.get("p").ok_or_else(|| HistoryError::Serialization("row missing 'p'".into()))?,
        &timestamp,
        &|v: &Value| v.as_i64().ok_or_else(|| HistoryError::Serialization("position must be an integer".into())),
    )?;
    let mut cells = BTreeMap::new();
    if let Some(c) = obj.get("c").and_then(Value::as_object) {
        for (col_id_str, value) in c {
            let col_id: u64 = col_id_str
                .parse()
                .map_err(|_| HistoryError::Serialization(format!("bad column id '{col_id_str}'")))?;
            cells.insert(col_id, decode_mvv(value, &timestamp, &decode_scalar)?);
        }
    }
    Ok(ArchiveRow { row_id, key, timestamp, position, cells })
}

pub fn encode_column(col: &ArchiveColumn) -> Value {
    json!({
        "c": col.col_id,
        "n": encode_mvv(&col.name, &col.timestamp, &|v: &String| json!(v)),
        "p": encode_mvv(&col.position, &col.timestamp, &|v: &i64| json!(v)),
        "t": encode_timestamp(&col.timestamp),
    })
}

pub fn decode_column(v: &Value) -> Result<ArchiveColumn> {
    let obj = v.as_object().ok_or_else(|| HistoryError::Serialization("column record must be an object".into()))?;
    let col_id = obj.get("c").and_then(Value::as_u64).ok_or_else(|| HistoryError::Serialization("column missing 'c'".into()))?;
    let timestamp = decode_timestamp(obj.get("t").ok_or_else(|| HistoryError::Serialization("column missing 't'".into()))?)?;
    let name = decode_mvv(
        obj.get("n").ok_or_else(|| HistoryError::Serialization("column missing 'n'".into()))?,
        &timestamp,
        &|v: &Value| v.as_str().map(str::to_string).ok_or_else(|| HistoryError::Serialization("name must be a string".into())),
    )?;
    let position = decode_mvv(
        obj.get("p").ok_or_else(|| HistoryError::Serialization("column missing 'p'".into()))?,
        &timestamp,
        &|v: &Value| v.as_i64().ok_or_else(|| HistoryError::Serialization("position must be an integer".into())),
    )?;
    Ok(ArchiveColumn { col_id, name, position, timestamp })
}

pub fn encode_snapshot(s: &SnapshotDescriptor) -> Value {
    json!({
        "version": s.version,
        "committed_at": s.committed_at.to_rfc3339(),
        "description": s.description,
        "operation": s.operation,
        "source": s.source,
    })
}

pub fn decode_snapshot(v: &Value) -> Result<SnapshotDescriptor> {
    let obj = v.as_object().ok_or_else(|| HistoryError::Serialization("snapshot record must be an object".into()))?;
    let version = obj.get("version").and_then(Value::as_i64).ok_or_else(|| HistoryError::Serialization("snapshot missing 'version'".into()))?;
    let committed_at = obj
        .get("committed_at")
        .and_then(Value::as_str)
        .ok_or_else(|| HistoryError::Serialization("snapshot missing 'committed_at'".into()))?;
    let committed_at = chrono::DateTime::parse_from_rfc3339(committed_at)
        .map_err(|e| HistoryError::Serialization(e.to_string()))?
        .with_timezone(&chrono::Utc);
    Ok(SnapshotDescriptor {
        version,
        committed_at,
        description: obj.get("description").and_then(Value::as_str).map(str::to_string),
        operation: obj.get("operation").and_then(Value::as_str).map(str::to_string),
        source: obj.get("source").and_then(Value::as_str).map(str::to_string),
    })
}

pub fn encode_snapshots(listing: &SnapshotListing) -> Value {
    Value::Array(listing.as_slice().iter().map(encode_snapshot).collect())
}

pub fn decode_snapshots(v: &Value) -> Result<SnapshotListing> {
    let arr = v.as_array().ok_or_else(|| HistoryError::Serialization("snapshots must be an array".into()))?;
    let mut listing = SnapshotListing::new();
    for item in arr {
        listing.push(decode_snapshot(item)?);
    }
    Ok(listing)
}

pub fn encode_schema(schema: &Schema) -> Value {
    Value::Array(schema.columns().iter().map(encode_column).collect())
}

pub fn decode_schema(v: &Value) -> Result<Vec<ArchiveColumn>> {
    let arr = v.as_array().ok_or_else(|| HistoryError::Serialization("schema must be an array".into()))?;
    arr.iter().map(decode_column).collect()
}
