//! Schema inference over sample records and PostgreSQL DDL generation

use crate::domain::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

/// Longest string mapped to `VARCHAR(n)`; longer columns become `TEXT`
pub const MAX_VARCHAR_LENGTH: u64 = 255;

/// Infer a schema from the fields of the first record
///
/// A null in the first record is resolved from the first later record with
/// a value for that field. Every field is nullable. Returns `{}` for an
/// empty sample.
pub fn infer_schema(records: &[Value], inferred_at: DateTime<Utc>) -> Value {
    let Some(first) = records.first().and_then(Value::as_object) else {
        return json!({});
    };

    let mut fields = Map::new();
    for (name, value) in first {
        let value = if value.is_null() {
            records[1..]
                .iter()
                .filter_map(|r| r.get(name))
                .find(|v| !v.is_null())
                .unwrap_or(value)
        } else {
            value
        };

        let definition = match value {
            Value::Bool(_) => json!({"type": "boolean", "nullable": true}),
            Value::Number(n) if n.is_f64() => json!({"type": "float", "nullable": true}),
            Value::Number(_) => json!({"type": "integer", "nullable": true}),
            Value::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => {
                json!({"type": "timestamp", "nullable": true})
            }
            Value::String(_) => json!({
                "type": "string",
                "max_length": max_text_length(records, name),
                "nullable": true,
            }),
            Value::Object(_) => json!({"type": "json", "nullable": true}),
            Value::Array(_) => json!({"type": "array", "nullable": true}),
            Value::Null => json!({"type": "string", "nullable": true}),
        };
        fields.insert(name.clone(), definition);
    }

    json!({
        "fields": fields,
        "inferred_at": inferred_at.to_rfc3339(),
        "sample_size": records.len(),
    })
}

fn max_text_length(records: &[Value], field: &str) -> usize {
    records
        .iter()
        .map(|record| match record.get(field) {
            None | Some(Value::Null) => 0,
            Some(Value::String(s)) => s.chars().count(),
            Some(other) => other.to_string().chars().count(),
        })
        .max()
        .unwrap_or(0)
}

/// `CREATE TABLE IF NOT EXISTS` statement for an inferred schema
///
/// # Errors
///
/// Returns [`SyncError::Validation`] when the table name is not a plain
/// identifier or the schema has no `fields` object.
pub fn create_ddl(table_name: &str, schema: &Value) -> Result<String> {
    if !crate::config::schema::is_identifier(table_name) {
        return Err(SyncError::Validation(format!(
            "Invalid table name '{table_name}'"
        )));
    }

    let fields = schema
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            SyncError::Validation("Schema definition must contain 'fields' key".to_string())
        })?;

    let mut columns = vec!["    id SERIAL PRIMARY KEY".to_string()];
    for (name, definition) in fields {
        let mut column = format!("    {} {}", quote_identifier(name), column_type(definition));
        if definition.get("nullable").and_then(Value::as_bool) == Some(false) {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    columns.push("    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string());
    columns.push("    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP".to_string());

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {table_name} (\n{}\n);",
        columns.join(",\n")
    ))
}

fn column_type(definition: &Value) -> String {
    match definition.get("type").and_then(Value::as_str).unwrap_or("string") {
        "integer" => "INTEGER".to_string(),
        "float" => "DOUBLE PRECISION".to_string(),
        "boolean" => "BOOLEAN".to_string(),
        "timestamp" => "TIMESTAMP".to_string(),
        "json" | "array" => "JSONB".to_string(),
        "string" => {
            let max_length = definition
                .get("max_length")
                .and_then(Value::as_u64)
                .unwrap_or(MAX_VARCHAR_LENGTH);
            if max_length <= MAX_VARCHAR_LENGTH {
                format!("VARCHAR({})", max_length.max(1))
            } else {
                "TEXT".to_string()
            }
        }
        _ => "TEXT".to_string(),
    }
}

fn quote_identifier(name: &str) -> String {
    if crate::config::schema::is_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_infer_schema_types() {
        let records = vec![
            json!({
                "batch_id": 7,
                "quantity": 12.5,
                "depleted": false,
                "name": "B_FLOUR",
                "effective_at": "2025-03-06T08:00:00Z",
                "meta": {"a": 1},
                "tags": [],
                "vessel": null
            }),
            json!({"batch_id": 8, "name": "P_SUGAR_EXTRA", "vessel": "MX01"}),
        ];

        let schema = infer_schema(&records, now());
        let fields = &schema["fields"];
        assert_eq!(fields["batch_id"]["type"], "integer");
        assert_eq!(fields["quantity"]["type"], "float");
        assert_eq!(fields["depleted"]["type"], "boolean");
        assert_eq!(fields["name"]["type"], "string");
        assert_eq!(fields["name"]["max_length"], 13);
        assert_eq!(fields["effective_at"]["type"], "timestamp");
        assert_eq!(fields["meta"]["type"], "json");
        assert_eq!(fields["tags"]["type"], "array");
        assert_eq!(fields["vessel"]["type"], "string");
        assert_eq!(fields["vessel"]["max_length"], 4);
        assert_eq!(fields["vessel"]["nullable"], true);
        assert_eq!(schema["sample_size"], 2);
        assert_eq!(schema["inferred_at"], "2025-03-07T12:00:00+00:00");
    }

    #[test]
    fn test_infer_empty_sample() {
        assert_eq!(infer_schema(&[], now()), json!({}));
    }

    #[test]
    fn test_create_ddl() {
        let schema = json!({
            "fields": {
                "count": {"type": "integer", "nullable": false},
                "name": {"type": "string", "max_length": 20},
                "notes": {"type": "string", "max_length": 900},
                "payload": {"type": "json"},
                "ratio": {"type": "float"}
            }
        });

        let ddl = create_ddl("dispatches", &schema).unwrap();
        assert_eq!(
            ddl,
            "CREATE TABLE IF NOT EXISTS dispatches (\n    \
             id SERIAL PRIMARY KEY,\n    \
             count INTEGER NOT NULL,\n    \
             name VARCHAR(20),\n    \
             notes TEXT,\n    \
             payload JSONB,\n    \
             ratio DOUBLE PRECISION,\n    \
             created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,\n    \
             updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP\n);"
        );
    }

    #[test]
    fn test_create_ddl_quotes_odd_columns() {
        let schema = json!({"fields": {"lot code": {"type": "boolean"}}});
        let ddl = create_ddl("t", &schema).unwrap();
        assert!(ddl.contains("    \"lot code\" BOOLEAN,"));
    }

    #[test]
    fn test_create_ddl_errors() {
        let err = create_ddl("t", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "Schema definition must contain 'fields' key");

        let err = create_ddl("t; DROP TABLE x", &json!({"fields": {}})).unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
    }
}
