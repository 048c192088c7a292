//! Booking persistence.
//!
//! `BookingStore` is the only shared mutable resource of the engine. The
//! Postgres implementation relies on the `bookings_active_slot` partial unique
//! index for the atomic check-and-insert; every other write is a conditional
//! single-row update.

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{pooled_connection::bb8::Pool, AsyncPgConnection, RunQueryDsl};
use shared::*;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::*;
use crate::schema::*;

pub type DbPool = Pool<AsyncPgConnection>;

pub const ACTIVE_SLOT_INDEX: &str = "bookings_active_slot";

/// Claims older than this are assumed to belong to a crashed attempt.
pub const PAYMENT_ATTEMPT_TTL_MINUTES: i64 = 10;

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError>;

    /// Ids of tables held by an active booking at the given date and time.
    async fn active_table_ids(
        &self,
        restaurant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<String>, StoreError>;

    /// Inserts a booking, failing with `SlotTaken` if its slot already has an
    /// active booking. The check and the insert are a single atomic step.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// Applies `change` only if the row still satisfies `guard`. Returns the
    /// updated booking, or `None` when the row has moved on.
    async fn transition(
        &self,
        id: Uuid,
        guard: &TransitionGuard,
        change: &BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, StoreError>;

    /// Returns false if another payment or refund for the booking is in flight.
    async fn claim_payment_attempt(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn release_payment_attempt(&self, booking_id: Uuid) -> Result<(), StoreError>;
}

fn is_active_slot_violation(e: &DieselError) -> bool {
    match e {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            info.constraint_name() == Some(ACTIVE_SLOT_INDEX)
        }
        _ => false,
    }
}

fn active_statuses() -> Vec<&'static str> {
    BookingStatus::ACTIVE.iter().map(|s| s.as_str()).collect()
}

pub struct PgBookingStore {
    pool: DbPool,
}

impl PgBookingStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError> {
        let mut conn = self.pool.get().await?;

        let restaurant = restaurants::table
            .filter(restaurants::id.eq(id))
            .first::<DbRestaurant>(&mut conn)
            .await
            .optional()?;

        let Some(restaurant) = restaurant else {
            return Ok(None);
        };

        let tables = restaurant_tables::table
            .filter(restaurant_tables::restaurant_id.eq(id))
            .order(restaurant_tables::position.asc())
            .load::<DbRestaurantTable>(&mut conn)
            .await?;

        Ok(Some(restaurant.into_restaurant(tables)))
    }

    async fn active_table_ids(
        &self,
        restaurant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.pool.get().await?;

        let ids = bookings::table
            .filter(bookings::restaurant_id.eq(restaurant_id))
            .filter(bookings::booking_date.eq(date))
            .filter(bookings::booking_time.eq(time))
            .filter(bookings::booking_status.eq_any(active_statuses()))
            .select(bookings::table_id)
            .load::<String>(&mut conn)
            .await?;

        Ok(ids)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let row = DbBooking::from(booking.clone());

        match diesel::insert_into(bookings::table)
            .values(&row)
            .execute(&mut conn)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if is_active_slot_violation(&e) => Err(StoreError::SlotTaken),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.pool.get().await?;

        let row = bookings::table
            .filter(bookings::id.eq(id))
            .first::<DbBooking>(&mut conn)
            .await
            .optional()?;

        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut conn = self.pool.get().await?;

        let rows = bookings::table
            .filter(bookings::user_id.eq(user_id))
            .order(bookings::created_at.desc())
            .load::<DbBooking>(&mut conn)
            .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn transition(
        &self,
        id: Uuid,
        guard: &TransitionGuard,
        change: &BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, StoreError> {
        let mut conn = self.pool.get().await?;

        let booking_statuses: Vec<&str> = guard.booking_statuses.iter().map(|s| s.as_str()).collect();
        let payment_statuses: Vec<&str> = guard.payment_statuses.iter().map(|s| s.as_str()).collect();

        let row = diesel::update(
            bookings::table
                .filter(bookings::id.eq(id))
                .filter(bookings::booking_status.eq_any(booking_statuses))
                .filter(bookings::payment_status.eq_any(payment_statuses)),
        )
        .set(BookingChangeset::new(change, now))
        .get_result::<DbBooking>(&mut conn)
        .await
        .optional()?;

        row.map(Booking::try_from).transpose()
    }

    async fn claim_payment_attempt(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.pool.get().await?;
        let stale_before = now - Duration::minutes(PAYMENT_ATTEMPT_TTL_MINUTES);

        diesel::delete(
            payment_attempts::table
                .filter(payment_attempts::booking_id.eq(booking_id))
                .filter(payment_attempts::started_at.lt(stale_before)),
        )
        .execute(&mut conn)
        .await?;

        let inserted = diesel::insert_into(payment_attempts::table)
            .values((
                payment_attempts::booking_id.eq(booking_id),
                payment_attempts::started_at.eq(now),
            ))
            .on_conflict_do_nothing()
            .execute(&mut conn)
            .await?;

        Ok(inserted == 1)
    }

    async fn release_payment_attempt(&self, booking_id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;

        diesel::delete(payment_attempts::table.filter(payment_attempts::booking_id.eq(booking_id)))
            .execute(&mut conn)
            .await?;

        Ok(())
    }
}
