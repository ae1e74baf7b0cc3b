//! Request handlers

use super::{ApiError, AppState};
use crate::core::actions::{fetch_batch_records, DEFAULT_DAYS_BACK};
use crate::core::compare::{
    item_master_review as compare_item_master, live_comparison, ITEM_MASTER_DAYS_BACK,
    LIVE_DAYS_BACK,
};
use crate::core::payload::prepare_jde_payload;
use crate::core::schema::{create_ddl, infer_schema};
use crate::core::units::unit_tables;
use crate::domain::{BatchRequest, SyncError};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct DaysBackQuery {
    pub days_back: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ItemMasterQuery {
    pub days_back: Option<i64>,
    pub bu: Option<String>,
    pub gl_cat: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchListQuery {
    pub dispatch_type: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn days_back(value: Option<i64>, default: i64) -> ApiResult<i64> {
    match value.unwrap_or(default) {
        days if days < 0 => Err(SyncError::Validation(
            "days_back must not be negative".to_string(),
        )
        .into()),
        days => Ok(days),
    }
}

/// JDE databrowse date filter (`dd/mm/YYYY`)
fn jde_date(days: i64) -> String {
    (today() - Duration::days(days))
        .format("%d/%m/%Y")
        .to_string()
}

/// `{success: false, error}` with the given status
fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(json!({"success": false, "error": error.into()}))).into_response()
}

/// Render a refused batch as `{success: false, error}`
///
/// Validation failures answer 400 and ledger hits 409; anything else stays
/// an [`ApiError`].
fn refusal(err: SyncError) -> ApiResult<Response> {
    match err {
        SyncError::Validation(msg) => Ok(failure(StatusCode::BAD_REQUEST, msg)),
        err @ SyncError::AlreadyDispatched(_) => {
            Ok(failure(StatusCode::CONFLICT, err.to_string()))
        }
        other => Err(other.into()),
    }
}

/// Truthy in the sense callers use it: not null and not an empty container
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

fn parse_date(value: Option<&str>, field: &str) -> ApiResult<Option<NaiveDate>> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d").map_err(|_| {
                ApiError(SyncError::Validation(format!(
                    "{field} must be a date in YYYY-MM-DD format"
                )))
            })
        })
        .transpose()
}

fn archive(state: &AppState) -> ApiResult<&crate::core::archive::DataLakeArchive> {
    state.archive.as_deref().ok_or_else(|| {
        ApiError(SyncError::Configuration(
            "Data lake is not enabled".to_string(),
        ))
    })
}

pub async fn health() -> Json<Value> {
    Json(json!({"status": "healthy", "message": "Backend is running"}))
}

pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let tokens = state.tokens.as_ref().ok_or_else(|| {
        SyncError::Configuration("Token signing key is not configured".to_string())
    })?;
    let verifier = state.verifier.as_ref().ok_or_else(|| {
        SyncError::Configuration("No credential verifier is configured".to_string())
    })?;

    let user = verifier
        .verify(&request.username, &request.password)
        .await
        .map_err(|e| match e {
            SyncError::Authentication(reason) => {
                tracing::warn!(username = %request.username, reason = %reason, "Login rejected");
                SyncError::Authentication("Invalid username or password".to_string())
            }
            other => other,
        })?;

    let access_token = tokens.issue(&user.username, &user.roles)?;
    tracing::info!(username = %user.username, roles = ?user.roles, "Issued access token");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}

pub async fn units() -> Json<Value> {
    Json(unit_tables())
}

pub async fn batch_actions(
    State(state): State<AppState>,
    Query(query): Query<DaysBackQuery>,
) -> ApiResult<Response> {
    let days = days_back(query.days_back, DEFAULT_DAYS_BACK)?;
    let records =
        fetch_batch_records(&*state.bakery_ops, &*state.ledger, today(), days).await?;

    if records.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No action data found"})),
        )
            .into_response());
    }

    let total = records.len();
    Ok(Json(json!({
        "success": true,
        "data": records,
        "total_records": total,
    }))
    .into_response())
}

/// Missing fields are a `{detail}` 400; a refused batch (zero quantity or
/// already dispatched) is a `{success: false, error}` body
pub async fn prepare_payload(
    State(state): State<AppState>,
    Json(batch): Json<Value>,
) -> ApiResult<Response> {
    BatchRequest::ensure_required_fields(&batch)?;
    match prepare_jde_payload(&batch, &*state.ledger, today()).await {
        Ok(prepared) => Ok(Json(prepared).into_response()),
        Err(e) => refusal(e),
    }
}

pub async fn dispatch_prepared_payload(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Response> {
    let jde_payload = body.get("jde_payload");
    let batch_data = body.get("batch_data");
    let (Some(jde_payload), Some(batch_data)) = (
        jde_payload.filter(|v| is_present(Some(*v))),
        batch_data.filter(|v| is_present(Some(*v))),
    ) else {
        return Err(SyncError::Validation(
            "Both 'jde_payload' and 'batch_data' are required".to_string(),
        )
        .into());
    };

    let outcome = state
        .dispatcher
        .dispatch_prepared_payload(jde_payload, batch_data)
        .await?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(outcome)).into_response())
}

pub async fn dispatch_batch(
    State(state): State<AppState>,
    Json(batch): Json<Value>,
) -> ApiResult<Response> {
    let outcome = state.dispatcher.dispatch_single_batch(&batch, today()).await?;
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    Ok((status, Json(outcome)).into_response())
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(batches): Json<Value>,
) -> ApiResult<Json<Value>> {
    let session_id = state.sessions.create_session(&batches).await?;
    Ok(Json(json!({"success": true, "session_id": session_id})))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Response> {
    match state.sessions.get_session(&session_id).await {
        Ok(session) => Ok(Json(json!({
            "success": true,
            "data": session.batch_data,
        }))
        .into_response()),
        Err(SyncError::NotFound(msg)) => Ok(failure(StatusCode::NOT_FOUND, msg)),
        Err(e) => Err(e.into()),
    }
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state.sessions.delete_session(&session_id).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn live_data(
    State(state): State<AppState>,
    Query(query): Query<DaysBackQuery>,
) -> ApiResult<Json<Value>> {
    let days = days_back(query.days_back, LIVE_DAYS_BACK)?;
    let r_date = jde_date(days);

    let cardex = state.jde.fetch_cardex(&state.business_unit, &r_date).await?;
    let ingredients = state.bakery_ops.list_ingredients().await?;

    let rows = live_comparison(&cardex, &ingredients);
    tracing::info!(since = %r_date, cardex = cardex.len(), rows = rows.len(), "Built live comparison");
    Ok(Json(json!({"data": rows})))
}

pub async fn item_master_review(
    State(state): State<AppState>,
    Query(query): Query<ItemMasterQuery>,
) -> ApiResult<Json<Value>> {
    let days = days_back(query.days_back, ITEM_MASTER_DAYS_BACK)?;
    let r_date = jde_date(days);
    let bu = query
        .bu
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| state.business_unit.clone());
    let gl_cat = query
        .gl_cat
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| state.gl_category.clone());

    let items = state.jde.fetch_item_master(&bu, &r_date, &gl_cat).await?;
    let ingredients = state.bakery_ops.list_ingredients().await?;

    let rows = compare_item_master(&items, &ingredients);
    tracing::info!(bu = %bu, gl_cat = %gl_cat, items = items.len(), "Built item master review");
    Ok(Json(json!({"data": rows})))
}

pub async fn search_ingredient(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Response> {
    let name = query.name.unwrap_or_default();
    match state.ingredients.search(&name).await {
        Ok(ingredient) => Ok(Json(json!({"success": true, "Ingredient": ingredient})).into_response()),
        Err(SyncError::NotFound(msg)) => {
            Ok((StatusCode::NOT_FOUND, Json(json!({"error": msg}))).into_response())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn create_ingredient(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.ingredients.create_from_request(&body).await?))
}

pub async fn prepare_ingredient(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.ingredients.prepare_from_item_master(&body)?))
}

pub async fn create_prepared_ingredient(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.ingredients.create_prepared(&body).await?))
}

pub async fn patch_ingredient_from_jde(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.ingredients.patch_from_jde(&body).await?))
}

pub async fn patch_ingredient(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.ingredients.advanced_patch(&body).await?))
}

pub async fn prepare_transaction(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.transactions.prepare(&body)?))
}

/// Skipped rows still answer 200 with `success: false`
pub async fn dispatch_prepared_transaction(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.transactions.dispatch_prepared(&body).await?))
}

pub async fn dispatch_transaction(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.transactions.dispatch_raw(&body).await?))
}

pub async fn delete_ingredient(
    State(state): State<AppState>,
    Path(ingredient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.ingredients.delete(&ingredient_id).await?))
}

pub async fn list_dispatches(
    State(state): State<AppState>,
    Query(query): Query<DispatchListQuery>,
) -> ApiResult<Json<Value>> {
    let start = parse_date(query.start_date.as_deref(), "start_date")?;
    let end = parse_date(query.end_date.as_deref(), "end_date")?;
    let dispatch_type = query.dispatch_type.as_deref().filter(|t| !t.is_empty());

    let dispatches = archive(&state)?
        .list_dispatches(dispatch_type, start, end)
        .await?;
    let count = dispatches.len();
    Ok(Json(json!({"dispatches": dispatches, "count": count})))
}

pub async fn latest_schema(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> ApiResult<Json<Value>> {
    archive(&state)?
        .latest_schema(&table_name)
        .await?
        .map(Json)
        .ok_or_else(|| {
            SyncError::NotFound(format!("No schema found for table '{table_name}'")).into()
        })
}

/// Infer a schema from sample records, archive and register it
pub async fn store_schema(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Value>> {
    let records = body
        .as_array()
        .filter(|records| !records.is_empty())
        .ok_or_else(|| {
            SyncError::Validation(
                "Request body must be a non-empty array of sample records".to_string(),
            )
        })?;

    let now = Utc::now();
    let schema = infer_schema(records, now);
    let ddl = create_ddl(&table_name, &schema)?;

    let s3_key = match state.archive.as_deref() {
        Some(archive) => Some(archive.store_schema(&table_name, &schema, now).await?),
        None => None,
    };

    let description = format!("Inferred from {} sample records", records.len());
    let version = state
        .schemas
        .register(&table_name, &schema, Some(&description))
        .await?;

    tracing::info!(table = %table_name, version, "Registered inferred schema");
    Ok(Json(json!({
        "success": true,
        "table_name": table_name,
        "version": version,
        "schema": schema,
        "s3_key": s3_key,
        "ddl": ddl,
    })))
}

pub async fn current_schema(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> ApiResult<Json<Value>> {
    let current = state.schemas.current(&table_name).await?.ok_or_else(|| {
        SyncError::NotFound(format!("No schema registered for table '{table_name}'"))
    })?;

    Ok(Json(json!({
        "table_name": table_name,
        "version": current.version,
        "schema": current.schema,
        "created_at": current.created_at.to_rfc3339(),
        "created_by": current.created_by,
        "description": current.description,
    })))
}

pub async fn schema_history(
    State(state): State<AppState>,
    Path(table_name): Path<String>,
) -> ApiResult<Json<Value>> {
    let versions: Vec<Value> = state
        .schemas
        .history(&table_name)
        .await?
        .into_iter()
        .map(|v| {
            json!({
                "version": v.version,
                "schema": v.schema,
                "created_at": v.created_at.to_rfc3339(),
                "created_by": v.created_by,
                "description": v.description,
            })
        })
        .collect();

    Ok(Json(json!({"table_name": table_name, "versions": versions})))
}
