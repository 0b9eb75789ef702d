//! Metric record API handlers
//!
//! `/metric` endpoints: each record drives one `MetricSource` flow.

use crate::api::records;
use crate::api::response::{ApiResponse, ListQuery};
use crate::error::AppError;
use crate::orchestration::{ConfigRecord, MetricConfig, MetricPatch, RecordId, RecordKind, RecordPatch};
use crate::state::AppContext;
use crate::store::StoredRecord;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

/// POST /metric - Register a metric and start its flow
pub async fn create_metric(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<MetricConfig>,
) -> Result<(StatusCode, Json<ApiResponse<StoredRecord>>), AppError> {
    let stored = records::create(&ctx, ConfigRecord::Metric(request)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_status(
            StatusCode::CREATED,
            stored,
            "Metric added successfully",
        )),
    ))
}

/// GET /metric - List metrics, optionally for one site
pub async fn list_metrics(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<StoredRecord>>>, AppError> {
    let metrics = records::list(&ctx, RecordKind::Metric, query.site.as_deref()).await?;
    let message = if metrics.is_empty() {
        "Empty list returned"
    } else {
        "Metrics retrieved successfully"
    };
    Ok(Json(ApiResponse::ok(metrics, message)))
}

/// GET /metric/:id - Get a specific metric
pub async fn get_metric(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<RecordId>,
) -> Result<Json<ApiResponse<StoredRecord>>, AppError> {
    let metric = records::get(&ctx, RecordKind::Metric, &id).await?;
    Ok(Json(ApiResponse::ok(metric, "Metric retrieved successfully")))
}

/// PUT /metric/:id - Update a metric and reconcile its flow
pub async fn update_metric(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<RecordId>,
    Json(request): Json<MetricPatch>,
) -> Result<Json<ApiResponse<StoredRecord>>, AppError> {
    let metric = records::update(&ctx, &id, RecordPatch::Metric(request)).await?;
    Ok(Json(ApiResponse::ok(metric, "Metric updated successfully")))
}

/// DELETE /metric/:id - Stop a metric's flow and delete it
pub async fn delete_metric(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<RecordId>,
) -> Result<Json<ApiResponse<StoredRecord>>, AppError> {
    let metric = records::delete(&ctx, RecordKind::Metric, &id).await?;
    Ok(Json(ApiResponse::ok(metric, "Metric deleted successfully")))
}
