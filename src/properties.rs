//! Property value rules and the typed boundary to the row store.
//!
//! Graph properties are JSON values restricted to scalars (string, finite
//! number, boolean, null) and arrays of scalars. Anything else is rejected
//! before it reaches the store. Property maps use `serde_json::Map`, which
//! preserves insertion order (the `preserve_order` feature).

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PropertyError {
    #[error("Invalid property type for '{key}': nested objects are not allowed")]
    NestedObject { key: String },
    #[error("Invalid property type for '{key}': arrays may only contain scalar values")]
    NonScalarArrayElement { key: String },
    #[error("Invalid property value for '{key}': number is not finite")]
    NonFiniteNumber { key: String },
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_)
    )
}

fn check_finite(key: &str, value: &Value) -> Result<(), PropertyError> {
    if let Value::Number(n) = value {
        // serde_json only produces non-finite f64 through from_f64 misuse,
        // but reject defensively for values arriving via parameters.
        if n.as_f64().map(|f| !f.is_finite()).unwrap_or(false) {
            return Err(PropertyError::NonFiniteNumber {
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a single property value against the data-model rules.
pub fn validate_property_value(key: &str, value: &Value) -> Result<(), PropertyError> {
    match value {
        Value::Object(_) => Err(PropertyError::NestedObject {
            key: key.to_string(),
        }),
        Value::Array(items) => {
            for item in items {
                if !is_scalar(item) {
                    return Err(PropertyError::NonScalarArrayElement {
                        key: key.to_string(),
                    });
                }
                check_finite(key, item)?;
            }
            Ok(())
        }
        scalar => check_finite(key, scalar),
    }
}

/// Validate a whole property map. Used by CREATE / MERGE / SET before persist.
pub fn validate_properties(props: &Map<String, Value>) -> Result<(), PropertyError> {
    for (key, value) in props {
        validate_property_value(key, value)?;
    }
    Ok(())
}

/// A positionally-bound SQL parameter.
///
/// Booleans cross the store boundary as 0/1 integers; they are rebuilt as
/// booleans on the way out by the JSON-tagged projections (see the result
/// formatter). Strings bind byte-for-byte. Arrays bind as JSON text for use
/// inside `json(?)` contexts.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlParam {
    /// Convert a JSON value into its store-boundary representation.
    pub fn from_json(value: &Value) -> SqlParam {
        match value {
            Value::Null => SqlParam::Null,
            Value::Bool(b) => SqlParam::Integer(if *b { 1 } else { 0 }),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlParam::Integer(i)
                } else {
                    SqlParam::Real(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => SqlParam::Text(s.clone()),
            // Arrays and objects travel as JSON text and are wrapped in
            // json(?) by the SQL that binds them.
            other => SqlParam::Text(other.to_string()),
        }
    }
}

impl rusqlite::ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
        use rusqlite::types::{ToSqlOutput, Value as SqliteValue, ValueRef};
        Ok(match self {
            SqlParam::Null => ToSqlOutput::Owned(SqliteValue::Null),
            SqlParam::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            SqlParam::Real(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            SqlParam::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}
