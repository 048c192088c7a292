use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::Zero;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use shared::{BookingStatus, PaymentStatus};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, Result};
use crate::gateway::{to_minor_units, PaymentGateway, RefundOutcome};
use crate::lifecycle;
use crate::models::{Booking, BookingChange, TransitionGuard};
use crate::notifications::NotificationDispatcher;
use crate::store::BookingStore;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelBookingRequest {
    pub requesting_user_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancellationResult {
    pub refund_amount: BigDecimal,
    pub booking: Booking,
}

/// Refund owed when cancelling at `now` a slot starting at `slot_start`.
///
/// A full refund from 24 hours out; inside that window the deposit is
/// prorated linearly and floored to whole currency units. Cancellations at or
/// after the slot start refund nothing.
pub fn prorated_refund(deposit: &BigDecimal, slot_start: DateTime<Utc>, now: DateTime<Utc>) -> BigDecimal {
    let seconds_left = (slot_start - now).num_seconds();

    if seconds_left >= SECONDS_PER_DAY {
        return deposit.clone();
    }
    if seconds_left <= 0 {
        return BigDecimal::zero();
    }

    (deposit * BigDecimal::from(seconds_left) / BigDecimal::from(SECONDS_PER_DAY))
        .with_scale_round(0, RoundingMode::Floor)
}

pub struct CancellationEngine {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    slot_offset: FixedOffset,
}

impl CancellationEngine {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        slot_offset: FixedOffset,
    ) -> Self {
        Self { store, gateway, notifier, clock, slot_offset }
    }

    pub async fn cancel_booking(&self, booking_id: Uuid, requesting_user_id: Uuid) -> Result<CancellationResult> {
        self.load_cancellable(booking_id, requesting_user_id).await?;

        // Refunds share the payment claim, so at most one money movement per
        // booking is in flight.
        if !self.store.claim_payment_attempt(booking_id, self.clock.now()).await? {
            return Err(BookingError::Conflict(format!(
                "a payment or refund for booking {} is already in progress",
                booking_id
            )));
        }

        let result = self.cancel_claimed(booking_id, requesting_user_id).await;

        if let Err(e) = self.store.release_payment_attempt(booking_id).await {
            error!("Failed to release payment attempt for booking {}: {}", booking_id, e);
        }

        result
    }

    async fn load_cancellable(&self, booking_id: Uuid, requesting_user_id: Uuid) -> Result<Booking> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))?;

        if booking.user_id != requesting_user_id {
            return Err(BookingError::Forbidden(format!(
                "user {} may not cancel booking {}",
                requesting_user_id, booking_id
            )));
        }

        lifecycle::ensure_transition(&booking, BookingStatus::Cancelled)?;
        Ok(booking)
    }

    /// Runs under the claim, against a fresh read of the booking.
    async fn cancel_claimed(&self, booking_id: Uuid, requesting_user_id: Uuid) -> Result<CancellationResult> {
        let booking = self.load_cancellable(booking_id, requesting_user_id).await?;

        let now = self.clock.now();
        let was_paid = booking.payment_status == PaymentStatus::Paid;
        let refund_amount = if was_paid {
            let start = lifecycle::slot_start(booking.booking_date, booking.booking_time, self.slot_offset);
            prorated_refund(&booking.deposit_amount, start, now)
        } else {
            BigDecimal::zero()
        };

        let refunded_reference = match (&booking.payment_reference_id, refund_amount > BigDecimal::zero()) {
            (Some(reference), true) => {
                self.refund(&booking, reference, &refund_amount).await?;
                Some(reference.clone())
            }
            _ => None,
        };

        let guard = TransitionGuard::booking(&BookingStatus::ACTIVE).with_payment(&[booking.payment_status]);
        let change = BookingChange {
            booking_status: Some(BookingStatus::Cancelled),
            payment_status: was_paid.then_some(PaymentStatus::Refunded),
            cancelled_at: Some(now),
            ..Default::default()
        };

        let Some(cancelled) = self.store.transition(booking_id, &guard, &change, now).await? else {
            if let Some(reference) = refunded_reference {
                error!(
                    "Refunded {} against {} but booking {} changed concurrently, reconciliation required",
                    refund_amount, reference, booking_id
                );
            }
            return Err(BookingError::Conflict(format!(
                "booking {} changed while it was being cancelled",
                booking_id
            )));
        };

        info!("Cancelled booking {} with refund {}", booking_id, refund_amount);
        self.notifier.booking_cancelled(&cancelled, &refund_amount);

        Ok(CancellationResult { refund_amount, booking: cancelled })
    }

    async fn refund(&self, booking: &Booking, reference: &str, amount: &BigDecimal) -> Result<()> {
        let amount_minor = to_minor_units(amount)
            .ok_or_else(|| BookingError::Validation(format!("refund {} cannot be issued", amount)))?;

        match self.gateway.refund(reference, amount_minor).await {
            Ok(RefundOutcome::Succeeded) => Ok(()),
            Ok(RefundOutcome::Declined { reason }) => {
                error!("Refund for booking {} declined: {}", booking.id, reason);
                Err(BookingError::Payment(format!("refund declined: {}", reason)))
            }
            Err(e) => {
                error!("Refund for booking {} failed: {}", booking.id, e);
                Err(BookingError::Payment(e.to_string()))
            }
        }
    }
}
