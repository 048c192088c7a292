use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bigdecimal::BigDecimal;
use chrono::{FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::availability::AvailabilityChecker;
use crate::cancellation::{CancelBookingRequest, CancellationEngine, CancellationResult};
use crate::checkin::CheckInHandler;
use crate::clock::Clock;
use crate::error::BookingError;
use crate::gateway::PaymentGateway;
use crate::models::{time_of_day, Booking, Table};
use crate::notifications::NotificationDispatcher;
use crate::payments::{PaymentProcessor, PaymentResult, ProcessPaymentRequest};
use crate::reservations::{CreateBookingRequest, ReservationManager};
use crate::store::BookingStore;

pub struct EngineSettings {
    pub currency: String,
    pub slot_offset: FixedOffset,
}

#[derive(Clone)]
pub struct AppState {
    pub availability: Arc<AvailabilityChecker>,
    pub reservations: Arc<ReservationManager>,
    pub payments: Arc<PaymentProcessor>,
    pub cancellations: Arc<CancellationEngine>,
    pub check_ins: Arc<CheckInHandler>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self {
            availability: Arc::new(AvailabilityChecker::new(store.clone())),
            reservations: Arc::new(ReservationManager::new(store.clone(), clock.clone())),
            payments: Arc::new(PaymentProcessor::new(
                store.clone(),
                gateway.clone(),
                notifier.clone(),
                clock.clone(),
                settings.currency.clone(),
            )),
            cancellations: Arc::new(CancellationEngine::new(
                store.clone(),
                gateway,
                notifier.clone(),
                clock.clone(),
                settings.slot_offset,
            )),
            check_ins: Arc::new(CheckInHandler::new(store, notifier, clock)),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    pub party_size: i32,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub restaurant_id: Uuid,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    pub party_size: i32,
    pub tables: Vec<Table>,
}

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub booking_id: Uuid,
    pub deposit_amount: BigDecimal,
    pub booking: Booking,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub error: String,
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match &self {
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::NotFound(_) => StatusCode::NOT_FOUND,
            BookingError::Conflict(_) | BookingError::AlreadyPaid(_) | BookingError::InvalidState(_) => {
                StatusCode::CONFLICT
            }
            BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookingError::Payment(_) => StatusCode::PAYMENT_REQUIRED,
            BookingError::Store(e) => {
                tracing::error!("Storage failure: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                kind: self.kind().to_string(),
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/restaurants/:id/availability", get(check_availability))
        .route("/bookings", post(create_booking))
        .route("/bookings/:id", get(get_booking))
        .route("/users/:id/bookings", get(list_user_bookings))
        .route("/bookings/:id/payment", post(process_payment))
        .route("/bookings/:id/cancel", post(cancel_booking))
        .route("/bookings/:id/check-in", post(check_in))
        .route("/bookings/:id/no-show", post(mark_no_show))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn check_availability(
    State(state): State<AppState>,
    Path(restaurant_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, BookingError> {
    let tables = state
        .availability
        .find_available_tables(restaurant_id, query.date, query.time, query.party_size)
        .await?;

    Ok(Json(AvailabilityResponse {
        restaurant_id,
        date: query.date,
        time: query.time,
        party_size: query.party_size,
        tables,
    }))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreateBookingResponse>), BookingError> {
    let booking = state.reservations.create_booking(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateBookingResponse {
            booking_id: booking.id,
            deposit_amount: booking.deposit_amount.clone(),
            booking,
        }),
    ))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(state.reservations.get_booking(booking_id, owner.user_id).await?))
}

pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, BookingError> {
    Ok(Json(state.reservations.list_bookings_for_user(user_id).await?))
}

pub async fn process_payment(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<Json<PaymentResult>, BookingError> {
    Ok(Json(state.payments.process_payment(booking_id, request).await?))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<CancelBookingRequest>,
) -> Result<Json<CancellationResult>, BookingError> {
    Ok(Json(
        state
            .cancellations
            .cancel_booking(booking_id, request.requesting_user_id)
            .await?,
    ))
}

pub async fn check_in(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(state.check_ins.check_in(booking_id).await?))
}

pub async fn mark_no_show(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(state.check_ins.mark_no_show(booking_id).await?))
}

pub async fn health_check() -> &'static str {
    "OK"
}
