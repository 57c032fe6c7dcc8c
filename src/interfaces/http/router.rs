//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::BookingService;
use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::modules::metrics::http_metrics_middleware;
use crate::interfaces::http::modules::{health, reservations, stations};

/// One state for every booking route; handlers pick their own via `FromRef`.
#[derive(Clone)]
pub struct BookingUnifiedState {
    pub service: Arc<BookingService>,
    pub started_at: Arc<Instant>,
}

impl FromRef<BookingUnifiedState> for reservations::ReservationAppState {
    fn from_ref(s: &BookingUnifiedState) -> Self {
        reservations::ReservationAppState {
            service: Arc::clone(&s.service),
        }
    }
}

impl FromRef<BookingUnifiedState> for stations::StationAppState {
    fn from_ref(s: &BookingUnifiedState) -> Self {
        stations::StationAppState {
            service: Arc::clone(&s.service),
        }
    }
}

impl FromRef<BookingUnifiedState> for health::HealthState {
    fn from_ref(s: &BookingUnifiedState) -> Self {
        health::HealthState {
            service: Arc::clone(&s.service),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::confirm_arrival,
        reservations::complete_reservation,
        reservations::cancel_reservation,
        reservations::admin_accept_booking,
        reservations::admin_cancel_booking,
        stations::register_station,
        stations::list_stations,
        stations::get_station,
        stations::check_availability,
    ),
    components(
        schemas(
            ApiResponse<String>,
            health::HealthResponse,
            health::ComponentHealth,
            reservations::CreateReservationRequest,
            reservations::ConfirmArrivalRequest,
            reservations::ReservationDto,
            stations::CreateStationRequest,
            stations::StationDto,
            stations::AvailabilityDto,
        )
    ),
    tags(
        (name = "Health", description = "Liveness"),
        (name = "Reservations", description = "Book a station, confirm arrival, complete or cancel"),
        (name = "Admin", description = "Administrator overrides on reservations"),
        (name = "Stations", description = "Station registry and window availability"),
    ),
    info(
        title = "Station Booking API",
        version = "1.0.0",
        description = "Time-window reservations for charging stations"
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(service: Arc<BookingService>) -> Router {
    let state = BookingUnifiedState {
        service,
        started_at: Arc::new(Instant::now()),
    };

    let reservation_routes = Router::new()
        .route(
            "/",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/{id}", get(reservations::get_reservation))
        .route("/{id}/arrival", post(reservations::confirm_arrival))
        .route("/{id}/complete", post(reservations::complete_reservation))
        .route("/{id}/cancel", post(reservations::cancel_reservation));

    let admin_routes = Router::new()
        .route(
            "/reservations/{id}/accept",
            post(reservations::admin_accept_booking),
        )
        .route(
            "/reservations/{id}/cancel",
            post(reservations::admin_cancel_booking),
        );

    let station_routes = Router::new()
        .route(
            "/",
            get(stations::list_stations).post(stations::register_station),
        )
        .route("/{id}", get(stations::get_station))
        .route("/{id}/availability", get(stations::check_availability));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check))
        .nest("/api/v1/reservations", reservation_routes)
        .nest("/api/v1/admin", admin_routes)
        .nest("/api/v1/stations", station_routes)
        .with_state(state)
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
