//! Reservation HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::application::BookingService;
use crate::interfaces::http::actor::CurrentActor;
use crate::interfaces::http::common::{ApiError, ApiResponse, ApiResult, ValidatedJson};

use super::dto::*;

/// Application state for reservation handlers.
#[derive(Clone)]
pub struct ReservationAppState {
    pub service: Arc<BookingService>,
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    params(
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = Option<String>, Header, description = "user | admin")
    ),
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation booked; body carries the arrival PIN", body = ApiResponse<ReservationDto>),
        (status = 400, description = "Invalid window or body"),
        (status = 404, description = "Station not found"),
        (status = 409, description = "Station occupied, window conflict or concurrent admission")
    )
)]
pub async fn create_reservation(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    ValidatedJson(request): ValidatedJson<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ReservationDto>>), ApiError> {
    let reservation = state
        .service
        .create_reservation(&actor, &request.station_id, request.start_time, request.end_time)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(reservation.into())),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    tag = "Reservations",
    params(
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = Option<String>, Header, description = "user | admin")
    ),
    responses(
        (status = 200, description = "Own reservations; every reservation for admins", body = ApiResponse<Vec<ReservationDto>>)
    )
)]
pub async fn list_reservations(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
) -> ApiResult<Vec<ReservationDto>> {
    let reservations = state.service.list_reservations(&actor).await?;
    Ok(Json(ApiResponse::success(
        reservations.into_iter().map(ReservationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    params(
        ("id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = Option<String>, Header, description = "user | admin")
    ),
    responses(
        (status = 200, description = "Reservation", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.service.get_reservation(&actor, &id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/arrival",
    tag = "Reservations",
    params(
        ("id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = Option<String>, Header, description = "user | admin")
    ),
    request_body = ConfirmArrivalRequest,
    responses(
        (status = 200, description = "Arrival confirmed, reservation is InUse", body = ApiResponse<ReservationDto>),
        (status = 409, description = "Reservation is not Booked"),
        (status = 422, description = "Wrong PIN or outside the booked window")
    )
)]
pub async fn confirm_arrival(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
    ValidatedJson(request): ValidatedJson<ConfirmArrivalRequest>,
) -> ApiResult<ReservationDto> {
    let reservation = state
        .service
        .confirm_arrival(&actor, &id, &request.pin)
        .await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/complete",
    tag = "Reservations",
    params(
        ("id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Caller user id")
    ),
    responses(
        (status = 200, description = "Charging session completed", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Reservation is not InUse")
    )
)]
pub async fn complete_reservation(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.service.complete_reservation(&actor, &id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/cancel",
    tag = "Reservations",
    params(
        ("id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Caller user id")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Not the owner"),
        (status = 409, description = "Reservation is not Booked")
    )
)]
pub async fn cancel_reservation(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.service.cancel_reservation(&actor, &id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/reservations/{id}/accept",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = String, Header, description = "must be admin")
    ),
    responses(
        (status = 200, description = "Booking accepted, reservation is InUse", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Reservation is not Booked or the station is occupied")
    )
)]
pub async fn admin_accept_booking(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.service.admin_accept_booking(&actor, &id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/reservations/{id}/cancel",
    tag = "Admin",
    params(
        ("id" = String, Path, description = "Reservation ID"),
        ("X-User-Id" = String, Header, description = "Caller user id"),
        ("X-User-Role" = String, Header, description = "must be admin")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<ReservationDto>),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Reservation already finished")
    )
)]
pub async fn admin_cancel_booking(
    State(state): State<ReservationAppState>,
    CurrentActor(actor): CurrentActor,
    Path(id): Path<String>,
) -> ApiResult<ReservationDto> {
    let reservation = state.service.admin_cancel_booking(&actor, &id).await?;
    Ok(Json(ApiResponse::success(reservation.into())))
}
