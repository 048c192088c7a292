//! Payment gateway contract.
//!
//! The engine only needs two primitives: authorize-and-capture and refund,
//! both in integral minor currency units. Amount conversion happens here,
//! never inside a gateway implementation.

use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode};
use num_traits::ToPrimitive;
use std::collections::HashMap;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method_token: String,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChargeOutcome {
    Succeeded { transaction_id: String },
    Declined { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefundOutcome {
    Succeeded,
    Declined { reason: String },
}

/// The gateway could not be reached or did not answer. Distinct from a
/// decline, which is a definitive answer.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize_and_capture(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError>;

    async fn refund(&self, transaction_id: &str, amount_minor: i64) -> Result<RefundOutcome, GatewayError>;
}

/// Converts a currency amount to minor units (x100, rounded half-up).
pub fn to_minor_units(amount: &BigDecimal) -> Option<i64> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
}

/// Gateway stand-in for local runs: approves a configurable share of charges
/// and every refund.
pub struct SimulatedGateway {
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new(success_rate: f64) -> Self {
        Self {
            success_rate: success_rate.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn authorize_and_capture(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let should_succeed = rand::random::<f64>() < self.success_rate;

        if !should_succeed {
            info!("Simulated gateway declined charge of {} {}", request.amount_minor, request.currency);
            return Ok(ChargeOutcome::Declined {
                reason: "card declined".to_string(),
            });
        }

        let transaction_id = format!("sim_{}", Uuid::new_v4().simple());
        info!(
            "Simulated gateway captured {} {} as {}",
            request.amount_minor, request.currency, transaction_id
        );
        Ok(ChargeOutcome::Succeeded { transaction_id })
    }

    async fn refund(&self, transaction_id: &str, amount_minor: i64) -> Result<RefundOutcome, GatewayError> {
        info!("Simulated gateway refunded {} against {}", amount_minor, transaction_id);
        Ok(RefundOutcome::Succeeded)
    }
}
