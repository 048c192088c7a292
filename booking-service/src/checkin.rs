use shared::BookingStatus;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, Result};
use crate::lifecycle;
use crate::models::{Booking, BookingChange, TransitionGuard};
use crate::notifications::NotificationDispatcher;
use crate::store::BookingStore;

/// Attendance outcomes: a guest either checks in or is marked a no-show.
pub struct CheckInHandler {
    store: Arc<dyn BookingStore>,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl CheckInHandler {
    pub fn new(store: Arc<dyn BookingStore>, notifier: NotificationDispatcher, clock: Arc<dyn Clock>) -> Self {
        Self { store, notifier, clock }
    }

    pub async fn check_in(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        lifecycle::ensure_can_check_in(&booking)?;

        let now = self.clock.now();
        let change = BookingChange {
            booking_status: Some(BookingStatus::CheckedIn),
            checked_in_at: Some(now),
            ..Default::default()
        };

        let checked_in = self
            .store
            .transition(booking_id, &TransitionGuard::booking(&[BookingStatus::Confirmed]), &change, now)
            .await?
            .ok_or_else(|| {
                BookingError::InvalidState(format!("booking {} is no longer confirmed", booking_id))
            })?;

        info!("Booking {} checked in at table {}", booking_id, checked_in.table_id);
        self.notifier.checked_in(&checked_in);

        Ok(checked_in)
    }

    pub async fn mark_no_show(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self.load(booking_id).await?;
        lifecycle::ensure_transition(&booking, BookingStatus::NoShow)?;

        let change = BookingChange {
            booking_status: Some(BookingStatus::NoShow),
            ..Default::default()
        };

        let marked = self
            .store
            .transition(booking_id, &TransitionGuard::booking(&BookingStatus::ACTIVE), &change, self.clock.now())
            .await?
            .ok_or_else(|| BookingError::InvalidState(format!("booking {} is no longer active", booking_id)))?;

        info!("Booking {} marked as no-show", booking_id);
        Ok(marked)
    }

    async fn load(&self, booking_id: Uuid) -> Result<Booking> {
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))
    }
}
