//! Station HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::application::BookingService;
use crate::interfaces::http::actor::CurrentActor;
use crate::interfaces::http::common::{ApiError, ApiResponse, ApiResult, ValidatedJson};

use super::dto::*;

/// Application state for station handlers.
#[derive(Clone)]
pub struct StationAppState {
    pub service: Arc<BookingService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/stations",
    tag = "Stations",
    params(
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = String, Header, description = "must be admin")
    ),
    request_body = CreateStationRequest,
    responses(
        (status = 201, description = "Station registered", body = ApiResponse<StationDto>),
        (status = 400, description = "Invalid or duplicate code"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn register_station(
    State(state): State<StationAppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(request): ValidatedJson<CreateStationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<StationDto>>), ApiError> {
    let station = state.service.register_station(&actor, &request.code).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(station.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/stations",
    tag = "Stations",
    responses(
        (status = 200, description = "All stations ordered by code", body = ApiResponse<Vec<StationDto>>)
    )
)]
pub async fn list_stations(
    State(state): State<StationAppState>,
    CurrentActor(_actor): CurrentActor,
) -> ApiResult<Vec<StationDto>> {
    let stations = state.service.list_stations().await?;
    Ok(Json(ApiResponse::success(
        stations.into_iter().map(StationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/stations/{id}",
    tag = "Stations",
    params(("id" = String, Path, description = "Station ID")),
    responses(
        (status = 200, description = "Station", body = ApiResponse<StationDto>),
        (status = 404, description = "Station not found")
    )
)]
pub async fn get_station(
    State(state): State<StationAppState>,
    CurrentActor(_actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<StationDto> {
    let station = state.service.get_station(&id).await?;
    Ok(Json(ApiResponse::success(station.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/stations/{id}/availability",
    tag = "Stations",
    params(
        ("id" = String, Path, description = "Station ID"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Whether the window is free", body = ApiResponse<AvailabilityDto>),
        (status = 400, description = "Invalid window"),
        (status = 404, description = "Station not found")
    )
)]
pub async fn check_availability(
    State(state): State<StationAppState>,
    CurrentActor(_actor): CurrentActor,
    Path(id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<AvailabilityDto> {
    let availability = state
        .service
        .check_availability(&id, query.start, query.end)
        .await?;
    Ok(Json(ApiResponse::success(availability.into())))
}
