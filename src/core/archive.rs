//! Data lake archive of dispatches and inferred schemas
//!
//! Dispatches are written as Snappy-compressed Parquet under a Hive-style
//! date partition:
//!
//! ```text
//! {prefix}/{dispatch_type}/year=YYYY/month=MM/day=DD/dispatch_YYYYmmdd_HHMMSS.parquet
//! ```
//!
//! Each top-level record field becomes a nullable column. A column whose
//! values share one scalar JSON type is stored natively (int64, double,
//! boolean, utf8); anything else is stored as JSON text and tagged with the
//! field metadata `encoding=json` so it reads back as the original value.
//!
//! Schemas land next to the dispatches under `{prefix}/schemas/{table}/`.

use crate::adapters::s3::DataLake;
use crate::domain::{Result, SyncError};
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

const PARQUET: &str = "application/octet-stream";
const DISPATCH_SUFFIX: &str = ".parquet";
const ENCODING_KEY: &str = "encoding";

/// One archived dispatch file as listed by [`DataLakeArchive::list_dispatches`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchListing {
    pub key: String,
    pub dispatch_type: String,
    pub date: NaiveDate,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Archive writer/reader scoped to a key prefix
pub struct DataLakeArchive {
    lake: Arc<dyn DataLake>,
    prefix: String,
}

impl DataLakeArchive {
    pub fn new(lake: Arc<dyn DataLake>, prefix: impl Into<String>) -> Self {
        Self {
            lake,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of a dispatch archived at `at`
    pub fn dispatch_key(&self, dispatch_type: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}/{}/{}/dispatch_{}{DISPATCH_SUFFIX}",
            self.prefix,
            dispatch_type,
            at.format("year=%Y/month=%m/day=%d"),
            at.format("%Y%m%d_%H%M%S")
        )
    }

    /// Write `records` as one Parquet object and return its key
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`] for an empty batch or records
    /// that are not JSON objects.
    pub async fn archive_dispatch(
        &self,
        dispatch_type: &str,
        records: &[Value],
        at: DateTime<Utc>,
    ) -> Result<String> {
        let body = encode_parquet(records)?;

        let key = self.dispatch_key(dispatch_type, at);
        let metadata = HashMap::from([
            ("dispatch_type".to_string(), dispatch_type.to_string()),
            ("transaction_date".to_string(), at.date_naive().to_string()),
            ("record_count".to_string(), records.len().to_string()),
            ("created_at".to_string(), Utc::now().to_rfc3339()),
            ("content_sha256".to_string(), sha256_hex(&body)),
        ]);

        self.lake.put_object(&key, body, PARQUET, metadata).await?;

        tracing::info!(
            key = %key,
            dispatch_type = %dispatch_type,
            records = records.len(),
            "Archived dispatch to data lake"
        );
        Ok(key)
    }

    /// Records of an archived dispatch, `None` when the key does not exist
    pub async fn get_dispatch(&self, key: &str) -> Result<Option<Vec<Value>>> {
        let Some(bytes) = self.lake.get_object(key).await? else {
            return Ok(None);
        };

        decode_parquet(bytes).map(Some)
    }

    /// Archived dispatches, newest first
    ///
    /// Date bounds are inclusive and compared against the partition date.
    pub async fn list_dispatches(
        &self,
        dispatch_type: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DispatchListing>> {
        let search_prefix = match dispatch_type {
            Some(kind) => format!("{}/{kind}/", self.prefix),
            None => format!("{}/", self.prefix),
        };

        let mut listings: Vec<DispatchListing> = self
            .lake
            .list_objects(&search_prefix)
            .await?
            .into_iter()
            .filter_map(|object| {
                let (kind, date) = self.parse_dispatch_key(&object.key)?;
                Some(DispatchListing {
                    key: object.key,
                    dispatch_type: kind,
                    date,
                    size: object.size,
                    last_modified: object.last_modified,
                })
            })
            .filter(|listing| start.map_or(true, |s| listing.date >= s))
            .filter(|listing| end.map_or(true, |e| listing.date <= e))
            .collect();

        listings.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(listings)
    }

    /// Dispatch type and partition date of a dispatch key
    fn parse_dispatch_key(&self, key: &str) -> Option<(String, NaiveDate)> {
        if !key.ends_with(DISPATCH_SUFFIX) {
            return None;
        }
        let relative = key.strip_prefix(&self.prefix)?.strip_prefix('/')?;
        let parts: Vec<&str> = relative.split('/').collect();
        if parts.len() < 5 {
            return None;
        }

        let year = parts[1].strip_prefix("year=")?.parse().ok()?;
        let month = parts[2].strip_prefix("month=")?.parse().ok()?;
        let day = parts[3].strip_prefix("day=")?.parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;

        Some((parts[0].to_string(), date))
    }

    /// Store an inferred schema and return its key
    pub async fn store_schema(
        &self,
        table_name: &str,
        schema: &Value,
        at: DateTime<Utc>,
    ) -> Result<String> {
        let version = at.format("%Y%m%d_%H%M%S").to_string();
        let key = format!("{}/schemas/{table_name}/schema_{version}.json", self.prefix);
        let created_at = at.to_rfc3339();

        let document = json!({
            "table_name": table_name,
            "schema": schema,
            "created_at": created_at,
            "version": version,
        });
        let body = serde_json::to_vec_pretty(&document)?;

        let metadata = HashMap::from([
            ("table_name".to_string(), table_name.to_string()),
            ("created_at".to_string(), created_at),
        ]);

        self.lake
            .put_object(&key, body, "application/json", metadata)
            .await?;

        tracing::info!(key = %key, table = %table_name, "Stored schema in data lake");
        Ok(key)
    }

    /// Most recently stored schema of a table
    pub async fn latest_schema(&self, table_name: &str) -> Result<Option<Value>> {
        let prefix = format!("{}/schemas/{table_name}/", self.prefix);
        let objects = self.lake.list_objects(&prefix).await?;

        let Some(latest) = objects
            .into_iter()
            .filter(|o| o.key.ends_with(".json"))
            .max_by(|a, b| a.last_modified.cmp(&b.last_modified))
        else {
            return Ok(None);
        };

        let Some(bytes) = self.lake.get_object(&latest.key).await? else {
            return Ok(None);
        };
        let mut document: Value = serde_json::from_slice(&bytes)?;
        Ok(Some(document["schema"].take()))
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Storage type of one archived column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Int,
    Float,
    Bool,
    Text,
    Json,
}

impl ColumnKind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Bool),
            Value::Number(n) if n.is_i64() => Some(Self::Int),
            Value::Number(_) => Some(Self::Float),
            Value::String(_) => Some(Self::Text),
            Value::Array(_) | Value::Object(_) => Some(Self::Json),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            _ => Self::Json,
        }
    }

    fn field(self, name: &str) -> Field {
        let data_type = match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Bool => DataType::Boolean,
            Self::Text | Self::Json => DataType::Utf8,
        };
        let field = Field::new(name, data_type, true);
        if self == Self::Json {
            field.with_metadata(HashMap::from([(
                ENCODING_KEY.to_string(),
                "json".to_string(),
            )]))
        } else {
            field
        }
    }

    fn array(self, rows: &[&Map<String, Value>], name: &str) -> ArrayRef {
        let cells = rows.iter().map(|row| row.get(name).filter(|v| !v.is_null()));
        match self {
            Self::Int => Arc::new(cells.map(|v| v.and_then(Value::as_i64)).collect::<Int64Array>()),
            Self::Float => {
                Arc::new(cells.map(|v| v.and_then(Value::as_f64)).collect::<Float64Array>())
            }
            Self::Bool => {
                Arc::new(cells.map(|v| v.and_then(Value::as_bool)).collect::<BooleanArray>())
            }
            Self::Text => Arc::new(cells.map(|v| v.and_then(Value::as_str)).collect::<StringArray>()),
            Self::Json => Arc::new(cells.map(|v| v.map(Value::to_string)).collect::<StringArray>()),
        }
    }
}

fn parquet_error(e: impl std::fmt::Display) -> SyncError {
    SyncError::Serialization(format!("Parquet error: {e}"))
}

/// One Parquet file holding `records`, one row per record
fn encode_parquet(records: &[Value]) -> Result<Vec<u8>> {
    if records.is_empty() {
        return Err(SyncError::Serialization(
            "No records to archive".to_string(),
        ));
    }
    let rows = records
        .iter()
        .map(|record| {
            record.as_object().ok_or_else(|| {
                SyncError::Serialization("Archived records must be JSON objects".to_string())
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // columns in first-seen order; all-null columns fall back to JSON text
    let mut columns: Vec<(String, Option<ColumnKind>)> = Vec::new();
    for row in &rows {
        for (name, value) in *row {
            let kind = ColumnKind::of(value);
            match columns.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => {
                    *existing = match (*existing, kind) {
                        (Some(a), Some(b)) => Some(a.merge(b)),
                        (a, b) => a.or(b),
                    };
                }
                None => columns.push((name.clone(), kind)),
            }
        }
    }

    let (fields, arrays): (Vec<Field>, Vec<ArrayRef>) = columns
        .iter()
        .map(|(name, kind)| {
            let kind = kind.unwrap_or(ColumnKind::Json);
            (kind.field(name), kind.array(&rows, name))
        })
        .unzip();

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(parquet_error)?;

    let properties = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut buffer = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buffer, schema, Some(properties)).map_err(parquet_error)?;
    writer.write(&batch).map_err(parquet_error)?;
    writer.close().map_err(parquet_error)?;

    Ok(buffer)
}

/// Records of a Parquet file written by [`encode_parquet`]
///
/// Null cells are left out of the returned objects.
fn decode_parquet(bytes: Vec<u8>) -> Result<Vec<Value>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(Bytes::from(bytes))
        .map_err(parquet_error)?
        .build()
        .map_err(parquet_error)?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(parquet_error)?;
        let schema = batch.schema();
        let mut rows = vec![Map::new(); batch.num_rows()];

        for (field, column) in schema.fields().iter().zip(batch.columns()) {
            let json_text = field
                .metadata()
                .get(ENCODING_KEY)
                .is_some_and(|e| e == "json");
            for (index, row) in rows.iter_mut().enumerate() {
                if column.is_null(index) {
                    continue;
                }
                row.insert(field.name().clone(), cell(column, index, json_text)?);
            }
        }
        records.extend(rows.into_iter().map(Value::Object));
    }
    Ok(records)
}

fn cell(column: &ArrayRef, index: usize, json_text: bool) -> Result<Value> {
    Ok(match column.data_type() {
        DataType::Int64 => json!(column.as_primitive::<Int64Type>().value(index)),
        DataType::Float64 => json!(column.as_primitive::<Float64Type>().value(index)),
        DataType::Boolean => json!(column.as_boolean().value(index)),
        DataType::Utf8 => {
            let text = column.as_string::<i32>().value(index);
            if json_text {
                serde_json::from_str(text)?
            } else {
                Value::String(text.to_string())
            }
        }
        other => {
            return Err(SyncError::Serialization(format!(
                "Unsupported archived column type {other}"
            )))
        }
    })
}
