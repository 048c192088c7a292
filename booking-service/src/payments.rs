use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use shared::{BookingStatus, PaymentStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, Result};
use crate::gateway::{to_minor_units, ChargeOutcome, ChargeRequest, PaymentGateway, RefundOutcome};
use crate::lifecycle;
use crate::models::{Booking, BookingChange, TransitionGuard};
use crate::notifications::NotificationDispatcher;
use crate::store::BookingStore;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessPaymentRequest {
    pub payment_method_token: String,
    /// What the client believes it owes. Informational only.
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentResult {
    pub success: bool,
    pub booking: Booking,
}

pub struct PaymentProcessor {
    store: Arc<dyn BookingStore>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
    currency: String,
}

impl PaymentProcessor {
    pub fn new(
        store: Arc<dyn BookingStore>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
        currency: String,
    ) -> Self {
        Self { store, gateway, notifier, clock, currency }
    }

    pub async fn process_payment(&self, booking_id: Uuid, request: ProcessPaymentRequest) -> Result<PaymentResult> {
        if request.payment_method_token.trim().is_empty() {
            return Err(BookingError::Validation("payment_method_token is required".to_string()));
        }

        // Fail fast on obviously unpayable bookings before taking the claim.
        let booking = self.load_payable(booking_id).await?;

        if to_minor_units(&request.amount) != to_minor_units(&booking.deposit_amount) {
            warn!(
                "Client amount {} differs from deposit {} for booking {}; charging the deposit",
                request.amount, booking.deposit_amount, booking_id
            );
        }

        if !self.store.claim_payment_attempt(booking_id, self.clock.now()).await? {
            return Err(BookingError::Conflict(format!(
                "a payment for booking {} is already in progress",
                booking_id
            )));
        }

        let result = self.attempt(booking_id, &request.payment_method_token).await;

        if let Err(e) = self.store.release_payment_attempt(booking_id).await {
            error!("Failed to release payment attempt for booking {}: {}", booking_id, e);
        }

        result
    }

    async fn load_payable(&self, booking_id: Uuid) -> Result<Booking> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::booking_not_found(booking_id))?;

        lifecycle::ensure_payable(&booking)?;
        Ok(booking)
    }

    /// Runs under the payment claim. The booking is re-read here since an
    /// earlier attempt may have committed between the first read and the claim.
    async fn attempt(&self, booking_id: Uuid, token: &str) -> Result<PaymentResult> {
        let booking = self.load_payable(booking_id).await?;
        let amount_minor = to_minor_units(&booking.deposit_amount).ok_or_else(|| {
            BookingError::Validation(format!("deposit {} cannot be charged", booking.deposit_amount))
        })?;

        let payable = TransitionGuard::booking(&[BookingStatus::Pending])
            .with_payment(&[PaymentStatus::Pending, PaymentStatus::Failed]);

        let transaction_id = if amount_minor == 0 {
            // Nothing to capture; a zero deposit confirms straight away.
            None
        } else {
            match self.charge(&booking, amount_minor, token).await? {
                ChargeOutcome::Succeeded { transaction_id } => Some(transaction_id),
                ChargeOutcome::Declined { reason } => {
                    let change = BookingChange {
                        payment_status: Some(PaymentStatus::Failed),
                        ..Default::default()
                    };
                    self.store.transition(booking.id, &payable, &change, self.clock.now()).await?;
                    info!("Payment for booking {} declined: {}", booking.id, reason);
                    return Err(BookingError::Payment(reason));
                }
            }
        };

        let change = BookingChange {
            booking_status: Some(BookingStatus::Confirmed),
            payment_status: Some(PaymentStatus::Paid),
            payment_reference_id: transaction_id.clone(),
            ..Default::default()
        };

        let committed = match self.store.transition(booking.id, &payable, &change, self.clock.now()).await {
            Ok(committed) => committed,
            Err(e) => {
                error!(
                    "Captured {:?} for booking {} but failed to record it, reconciliation required: {}",
                    transaction_id, booking.id, e
                );
                return Err(e.into());
            }
        };

        let Some(confirmed) = committed else {
            if let Some(transaction_id) = &transaction_id {
                self.compensate(booking.id, transaction_id, amount_minor).await;
            }
            return Err(BookingError::Conflict(format!(
                "booking {} changed while the payment was processed",
                booking.id
            )));
        };

        info!(
            "Booking {} confirmed, payment reference {:?}",
            confirmed.id, confirmed.payment_reference_id
        );
        self.notify_confirmed(&confirmed).await;

        Ok(PaymentResult { success: true, booking: confirmed })
    }

    async fn charge(&self, booking: &Booking, amount_minor: i64, token: &str) -> Result<ChargeOutcome> {
        let metadata = HashMap::from([
            ("booking_id".to_string(), booking.id.to_string()),
            ("restaurant_id".to_string(), booking.restaurant_id.to_string()),
            ("user_id".to_string(), booking.user_id.to_string()),
        ]);
        let request = ChargeRequest {
            amount_minor,
            currency: self.currency.clone(),
            payment_method_token: token.to_string(),
            metadata,
        };

        self.gateway.authorize_and_capture(request).await.map_err(|e| {
            warn!("Gateway unavailable for booking {}: {}", booking.id, e);
            BookingError::Payment(e.to_string())
        })
    }

    /// Reverses a capture that could not be recorded locally.
    async fn compensate(&self, booking_id: Uuid, transaction_id: &str, amount_minor: i64) {
        match self.gateway.refund(transaction_id, amount_minor).await {
            Ok(RefundOutcome::Succeeded) => warn!(
                "Booking {} moved on during payment; capture {} refunded",
                booking_id, transaction_id
            ),
            Ok(RefundOutcome::Declined { reason }) => error!(
                "Refund of orphaned capture {} for booking {} declined, reconciliation required: {}",
                transaction_id, booking_id, reason
            ),
            Err(e) => error!(
                "Refund of orphaned capture {} for booking {} failed, reconciliation required: {}",
                transaction_id, booking_id, e
            ),
        }
    }

    async fn notify_confirmed(&self, booking: &Booking) {
        match self.store.find_restaurant(booking.restaurant_id).await {
            Ok(Some(restaurant)) => {
                self.notifier
                    .booking_confirmed(booking, &restaurant.name, restaurant.admin_email.as_deref());
            }
            Ok(None) => self.notifier.booking_confirmed(booking, "the restaurant", None),
            Err(e) => {
                warn!("Could not load restaurant for booking {} notification: {}", booking.id, e);
                self.notifier.booking_confirmed(booking, "the restaurant", None);
            }
        }
    }
}
