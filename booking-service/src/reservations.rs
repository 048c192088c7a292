use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use shared::{CustomerInfo, TableSlot};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, Result, StoreError};
use crate::lifecycle;
use crate::models::{time_of_day, Booking};
use crate::store::BookingStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBookingRequest {
    pub restaurant_id: Uuid,
    pub table_id: String,
    pub date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub time: NaiveTime,
    pub party_size: i32,
    pub customer: CustomerInfo,
}

impl CreateBookingRequest {
    fn validate(&self) -> Result<()> {
        let required = [
            ("table_id", &self.table_id),
            ("customer.name", &self.customer.name),
            ("customer.phone", &self.customer.phone),
            ("customer.email", &self.customer.email),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BookingError::Validation(format!("{} is required", field)));
            }
        }
        if self.party_size < 1 {
            return Err(BookingError::Validation(format!(
                "party size must be at least 1, got {}",
                self.party_size
            )));
        }
        Ok(())
    }
}

pub struct ReservationManager {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
}

impl ReservationManager {
    pub fn new(store: Arc<dyn BookingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_booking(&self, request: CreateBookingRequest) -> Result<Booking> {
        request.validate()?;

        let restaurant = self
            .store
            .find_restaurant(request.restaurant_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("restaurant {}", request.restaurant_id)))?;

        let table = restaurant.table(&request.table_id).ok_or_else(|| {
            BookingError::NotFound(format!(
                "table {} in restaurant {}",
                request.table_id, restaurant.id
            ))
        })?;

        if request.party_size > table.capacity {
            return Err(BookingError::Validation(format!(
                "party of {} exceeds capacity {} of table {}",
                request.party_size, table.capacity, table.table_id
            )));
        }

        let deposit = lifecycle::deposit_for(&restaurant.deposit_per_person, request.party_size);
        let slot = TableSlot {
            restaurant_id: restaurant.id,
            table_id: table.table_id.clone(),
            date: request.date,
            time: request.time,
        };
        let booking = Booking::pending(slot, request.party_size, request.customer, deposit, self.clock.now());

        // The insert is the commit-time re-check: the store refuses a second
        // active booking for the same slot atomically.
        match self.store.insert_booking(&booking).await {
            Ok(()) => {
                info!(
                    "Created booking {} for table {} on {} {} (deposit {})",
                    booking.id, booking.table_id, booking.booking_date, booking.booking_time, booking.deposit_amount
                );
                Ok(booking)
            }
            Err(StoreError::SlotTaken) => {
                warn!("Slot {:?} was claimed concurrently", booking.slot());
                Err(BookingError::Conflict("table no longer available".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_booking(&self, booking_id: Uuid, requesting_user_id: Uuid) -> Result<Booking> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))?;

        if booking.user_id != requesting_user_id {
            return Err(BookingError::Forbidden(format!(
                "booking {} belongs to another user",
                booking_id
            )));
        }
        Ok(booking)
    }

    pub async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>> {
        Ok(self.store.list_bookings_for_user(user_id).await?)
    }
}
