//! UE location record API handlers
//!
//! `/ue-location` endpoints: each record drives one `NDACSource` or
//! `NDACSourceSimple` flow, depending on its mode.

use crate::api::records;
use crate::api::response::{ApiResponse, ListQuery};
use crate::error::AppError;
use crate::orchestration::{
    ConfigRecord, LocationConfig, LocationPatch, RecordId, RecordKind, RecordPatch,
};
use crate::state::AppContext;
use crate::store::StoredRecord;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;

/// POST /ue-location - Register a location intent and start its flow
pub async fn create_location(
    State(ctx): State<Arc<AppContext>>,
    Json(request): Json<LocationConfig>,
) -> Result<(StatusCode, Json<ApiResponse<StoredRecord>>), AppError> {
    let stored = records::create(&ctx, ConfigRecord::Location(request)).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_status(
            StatusCode::CREATED,
            stored,
            "UE location added successfully",
        )),
    ))
}

/// GET /ue-location - List location intents
pub async fn list_locations(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<StoredRecord>>>, AppError> {
    let locations = records::list(&ctx, RecordKind::Location, query.site.as_deref()).await?;
    let message = if locations.is_empty() {
        "Empty list returned"
    } else {
        "UE locations retrieved successfully"
    };
    Ok(Json(ApiResponse::ok(locations, message)))
}

/// GET /ue-location/:id
pub async fn get_location(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<RecordId>,
) -> Result<Json<ApiResponse<StoredRecord>>, AppError> {
    let location = records::get(&ctx, RecordKind::Location, &id).await?;
    Ok(Json(ApiResponse::ok(location, "UE location retrieved successfully")))
}

/// PUT /ue-location/:id
pub async fn update_location(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<RecordId>,
    Json(request): Json<LocationPatch>,
) -> Result<Json<ApiResponse<StoredRecord>>, AppError> {
    let location = records::update(&ctx, &id, RecordPatch::Location(request)).await?;
    Ok(Json(ApiResponse::ok(location, "UE location updated successfully")))
}

/// DELETE /ue-location/:id
pub async fn delete_location(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<RecordId>,
) -> Result<Json<ApiResponse<StoredRecord>>, AppError> {
    let location = records::delete(&ctx, RecordKind::Location, &id).await?;
    Ok(Json(ApiResponse::ok(location, "UE location deleted successfully")))
}
