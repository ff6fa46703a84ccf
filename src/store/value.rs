use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue};
use serde_json::Value;

/// A positional statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(opt: Option<String>) -> Self {
        opt.map(SqlValue::Text).unwrap_or(SqlValue::Null)
    }
}

/// Query console parameters arrive as JSON. Arrays and objects are passed
/// through as their JSON text.
impl From<Value> for SqlValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s),
            Value::Array(_) | Value::Object(_) => SqlValue::Text(v.to_string()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            SqlValue::Null => SqliteValue::Null,
            SqlValue::Bool(b) => SqliteValue::Integer(i64::from(*b)),
            SqlValue::Integer(i) => SqliteValue::Integer(*i),
            SqlValue::Real(f) => SqliteValue::Real(*f),
            SqlValue::Text(s) => return Ok(ToSqlOutput::from(s.as_str())),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        assert_eq!(SqlValue::from(json!(null)), SqlValue::Null);
        assert_eq!(SqlValue::from(json!(true)), SqlValue::Bool(true));
        assert_eq!(SqlValue::from(json!(42)), SqlValue::Integer(42));
        assert_eq!(SqlValue::from(json!(1.5)), SqlValue::Real(1.5));
        assert_eq!(SqlValue::from(json!("Doe")), SqlValue::Text("Doe".to_string()));
        assert_eq!(
            SqlValue::from(json!({"a": 1})),
            SqlValue::Text("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn test_from_option() {
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Null);
        assert_eq!(
            SqlValue::from(Some("x".to_string())),
            SqlValue::Text("x".to_string())
        );
    }
}
