use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{BookingError, Result};
use crate::models::Table;
use crate::store::BookingStore;

/// Advisory availability lookup. The answer can be stale by the time a
/// booking is submitted; `ReservationManager` re-checks at commit time.
pub struct AvailabilityChecker {
    store: Arc<dyn BookingStore>,
}

impl AvailabilityChecker {
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    pub async fn find_available_tables(
        &self,
        restaurant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        party_size: i32,
    ) -> Result<Vec<Table>> {
        if party_size < 1 {
            return Err(BookingError::Validation(format!(
                "party size must be at least 1, got {}",
                party_size
            )));
        }

        let restaurant = self
            .store
            .find_restaurant(restaurant_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("restaurant {}", restaurant_id)))?;

        let occupied: HashSet<String> = self
            .store
            .active_table_ids(restaurant_id, date, time)
            .await?
            .into_iter()
            .collect();

        Ok(restaurant
            .tables
            .into_iter()
            .filter(|t| t.capacity >= party_size && !occupied.contains(&t.table_id))
            .collect())
    }
}
