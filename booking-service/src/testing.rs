//! Test doubles and fixtures shared by the component tests.

use anyhow::bail;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use shared::*;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::api::{AppState, EngineSettings};
use crate::availability::AvailabilityChecker;
use crate::cancellation::CancellationEngine;
use crate::checkin::CheckInHandler;
use crate::clock::Clock;
use crate::error::StoreError;
use crate::gateway::{ChargeOutcome, ChargeRequest, GatewayError, PaymentGateway, RefundOutcome};
use crate::models::{Booking, BookingChange, Restaurant, Table, TransitionGuard};
use crate::notifications::{NotificationDispatcher, NotificationSink};
use crate::payments::PaymentProcessor;
use crate::reservations::{CreateBookingRequest, ReservationManager};
use crate::store::BookingStore;

pub fn slot_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

pub fn slot_time() -> NaiveTime {
    NaiveTime::from_hms_opt(19, 0, 0).unwrap()
}

pub fn slot_start_utc() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 20, 19, 0, 0).unwrap()
}

pub fn sample_booking() -> Booking {
    Booking::pending(
        TableSlot {
            restaurant_id: Uuid::new_v4(),
            table_id: "T01".to_string(),
            date: slot_date(),
            time: slot_time(),
        },
        2,
        customer(),
        BigDecimal::from(200),
        Utc::now(),
    )
}

fn customer() -> CustomerInfo {
    CustomerInfo {
        user_id: Uuid::new_v4(),
        name: "Ploy Srisuk".to_string(),
        phone: "0891234567".to_string(),
        email: "ploy@example.com".to_string(),
        special_requests: Some("window seat".to_string()),
        dietary_restrictions: None,
    }
}

#[derive(Default)]
struct MemoryState {
    restaurants: HashMap<Uuid, Restaurant>,
    bookings: HashMap<Uuid, Booking>,
    attempts: HashMap<Uuid, DateTime<Utc>>,
}

/// In-memory store. A single mutex makes check-and-insert atomic, matching
/// the guarantee of the partial unique index in Postgres.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    claim_delays: Mutex<VecDeque<Duration>>,
}

impl InMemoryStore {
    pub fn with_restaurant(restaurant: Restaurant) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().restaurants.insert(restaurant.id, restaurant);
        store
    }

    pub fn booking(&self, id: Uuid) -> Booking {
        self.state.lock().unwrap().bookings[&id].clone()
    }

    pub fn active_bookings_for_slot(&self, slot: &TableSlot) -> usize {
        self.state
            .lock()
            .unwrap()
            .bookings
            .values()
            .filter(|b| b.booking_status.is_active() && &b.slot() == slot)
            .count()
    }

    /// Stalls successive `claim_payment_attempt` calls, one delay per call.
    pub fn delay_claims(&self, delays: &[Duration]) {
        self.claim_delays.lock().unwrap().extend(delays.iter().copied());
    }

    pub fn payment_attempt_held(&self, booking_id: Uuid) -> bool {
        self.state.lock().unwrap().attempts.contains_key(&booking_id)
    }

    /// Cancels behind the engine's back, as a concurrent request would.
    pub fn force_cancel(&self, booking_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        if let Some(booking) = state.bookings.get_mut(&booking_id) {
            booking.booking_status = BookingStatus::Cancelled;
        }
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn find_restaurant(&self, id: Uuid) -> Result<Option<Restaurant>, StoreError> {
        Ok(self.state.lock().unwrap().restaurants.get(&id).cloned())
    }

    async fn active_table_ids(
        &self,
        restaurant_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .bookings
            .values()
            .filter(|b| {
                b.restaurant_id == restaurant_id
                    && b.booking_date == date
                    && b.booking_time == time
                    && b.booking_status.is_active()
            })
            .map(|b| b.table_id.clone())
            .collect())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        let slot = booking.slot();
        if state
            .bookings
            .values()
            .any(|b| b.booking_status.is_active() && b.slot() == slot)
        {
            return Err(StoreError::SlotTaken);
        }
        state.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().unwrap().bookings.get(&id).cloned())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .state
            .lock()
            .unwrap()
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn transition(
        &self,
        id: Uuid,
        guard: &TransitionGuard,
        change: &BookingChange,
        now: DateTime<Utc>,
    ) -> Result<Option<Booking>, StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.bookings.get_mut(&id) {
            Some(booking) if admits(guard, booking) => {
                apply(change, booking, now);
                Ok(Some(booking.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn claim_payment_attempt(&self, booking_id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let delay = self.claim_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay.filter(|d| !d.is_zero()) {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.attempts.contains_key(&booking_id) {
            return Ok(false);
        }
        state.attempts.insert(booking_id, now);
        Ok(true)
    }

    async fn release_payment_attempt(&self, booking_id: Uuid) -> Result<(), StoreError> {
        self.state.lock().unwrap().attempts.remove(&booking_id);
        Ok(())
    }
}

fn admits(guard: &TransitionGuard, booking: &Booking) -> bool {
    guard.booking_statuses.contains(&booking.booking_status)
        && guard.payment_statuses.contains(&booking.payment_status)
}

fn apply(change: &BookingChange, booking: &mut Booking, now: DateTime<Utc>) {
    if let Some(status) = change.booking_status {
        booking.booking_status = status;
    }
    if let Some(status) = change.payment_status {
        booking.payment_status = status;
    }
    if let Some(reference) = &change.payment_reference_id {
        booking.payment_reference_id = Some(reference.clone());
    }
    if let Some(at) = change.cancelled_at {
        booking.cancelled_at = Some(at);
    }
    if let Some(at) = change.checked_in_at {
        booking.checked_in_at = Some(at);
    }
    booking.updated_at = now;
}

type ChargeHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct GatewayScript {
    charges: Vec<ChargeRequest>,
    refunds: Vec<(String, i64)>,
    next_charge: VecDeque<Result<ChargeOutcome, GatewayError>>,
    next_refund: VecDeque<Result<RefundOutcome, GatewayError>>,
    delay: Option<Duration>,
    on_charge: Option<ChargeHook>,
    issued: u32,
}

/// Approves everything unless told otherwise, and records every call.
#[derive(Default)]
pub struct ScriptedGateway {
    script: Mutex<GatewayScript>,
}

impl ScriptedGateway {
    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.script.lock().unwrap().charges.clone()
    }

    pub fn refunds(&self) -> Vec<(String, i64)> {
        self.script.lock().unwrap().refunds.clone()
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().unwrap().delay = Some(delay);
    }

    pub fn decline_next(&self, reason: &str) {
        self.script.lock().unwrap().next_charge.push_back(Ok(ChargeOutcome::Declined {
            reason: reason.to_string(),
        }));
    }

    pub fn fail_next(&self, error: GatewayError) {
        self.script.lock().unwrap().next_charge.push_back(Err(error));
    }

    pub fn fail_next_refund(&self, error: GatewayError) {
        self.script.lock().unwrap().next_refund.push_back(Err(error));
    }

    pub fn on_charge(&self, hook: impl FnOnce() + Send + 'static) {
        self.script.lock().unwrap().on_charge = Some(Box::new(hook));
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn authorize_and_capture(&self, request: ChargeRequest) -> Result<ChargeOutcome, GatewayError> {
        let (delay, hook) = {
            let mut script = self.script.lock().unwrap();
            script.charges.push(request);
            (script.delay, script.on_charge.take())
        };
        if let Some(hook) = hook {
            hook();
        }
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        match script.next_charge.pop_front() {
            Some(scripted) => scripted,
            None => {
                script.issued += 1;
                Ok(ChargeOutcome::Succeeded {
                    transaction_id: format!("txn_{}", script.issued),
                })
            }
        }
    }

    async fn refund(&self, transaction_id: &str, amount_minor: i64) -> Result<RefundOutcome, GatewayError> {
        let delay = self.script.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        let outcome = script.next_refund.pop_front().unwrap_or(Ok(RefundOutcome::Succeeded));
        if outcome.is_ok() {
            script.refunds.push((transaction_id.to_string(), amount_minor));
        }
        outcome
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
    failures_left: Mutex<usize>,
}

impl RecordingSink {
    pub fn failing_first(failures: usize) -> Self {
        Self {
            delivered: Mutex::new(Vec::new()),
            failures_left: Mutex::new(failures),
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        {
            let mut failures_left = self.failures_left.lock().unwrap();
            if *failures_left > 0 {
                *failures_left -= 1;
                bail!("sink unavailable");
            }
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// One restaurant with three tables, every component wired to test doubles.
pub struct Harness {
    pub restaurant_id: Uuid,
    pub store: Arc<InMemoryStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub clock: Arc<FixedClock>,
    pub state: AppState,
    pub availability: Arc<AvailabilityChecker>,
    pub reservations: Arc<ReservationManager>,
    pub payments: Arc<PaymentProcessor>,
    pub cancellations: Arc<CancellationEngine>,
    pub check_ins: Arc<CheckInHandler>,
    notifications: Mutex<mpsc::UnboundedReceiver<Notification>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_deposit(BigDecimal::from(100))
    }

    pub fn with_deposit(deposit_per_person: BigDecimal) -> Self {
        let restaurant = Restaurant {
            id: Uuid::new_v4(),
            name: "Baan Suan".to_string(),
            deposit_per_person,
            admin_email: Some("owner@baansuan.example".to_string()),
            tables: vec![
                Table { table_id: "T01".to_string(), capacity: 2, table_type: "window".to_string() },
                Table { table_id: "T02".to_string(), capacity: 4, table_type: "standard".to_string() },
                Table { table_id: "T03".to_string(), capacity: 6, table_type: "booth".to_string() },
            ],
        };
        let restaurant_id = restaurant.id;

        let store = Arc::new(InMemoryStore::with_restaurant(restaurant));
        let gateway = Arc::new(ScriptedGateway::default());
        let clock = Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap()));
        let (notifier, receiver) = NotificationDispatcher::channel();

        let settings = EngineSettings {
            currency: "thb".to_string(),
            slot_offset: FixedOffset::east_opt(0).unwrap(),
        };
        let state = AppState::new(store.clone(), gateway.clone(), notifier, clock.clone(), &settings);

        Self {
            restaurant_id,
            store,
            gateway,
            clock,
            availability: state.availability.clone(),
            reservations: state.reservations.clone(),
            payments: state.payments.clone(),
            cancellations: state.cancellations.clone(),
            check_ins: state.check_ins.clone(),
            state,
            notifications: Mutex::new(receiver),
        }
    }

    pub fn request(&self, table_id: &str, party_size: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            restaurant_id: self.restaurant_id,
            table_id: table_id.to_string(),
            date: slot_date(),
            time: slot_time(),
            party_size,
            customer: customer(),
        }
    }

    pub fn slot(&self, table_id: &str) -> TableSlot {
        TableSlot {
            restaurant_id: self.restaurant_id,
            table_id: table_id.to_string(),
            date: slot_date(),
            time: slot_time(),
        }
    }

    /// Drains and returns everything dispatched so far.
    pub fn notifications(&self) -> Vec<Notification> {
        let mut receiver = self.notifications.lock().unwrap();
        let mut sent = Vec::new();
        while let Ok(notification) = receiver.try_recv() {
            sent.push(notification);
        }
        sent
    }
}
