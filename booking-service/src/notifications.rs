use anyhow::Result;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use rdkafka::producer::{FutureProducer, FutureRecord};
use shared::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::models::Booking;

/// Hands notifications to the background worker. Dispatching never blocks and
/// never fails the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::UnboundedSender<Notification>,
}

impl NotificationDispatcher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn dispatch(&self, notification: Notification) {
        if let Err(e) = self.sender.send(notification) {
            warn!("Notification worker is gone, dropping notification {}", e.0.id);
        }
    }

    pub fn booking_confirmed(&self, booking: &Booking, restaurant_name: &str, admin_email: Option<&str>) {
        let body = format!(
            "Your table {} at {} on {} {} for {} is confirmed. Deposit paid: {}.",
            booking.table_id,
            restaurant_name,
            booking.booking_date,
            booking.booking_time.format("%H:%M"),
            booking.num_guests,
            booking.deposit_amount
        );
        self.dispatch(Notification::new(
            booking.id,
            NotificationKind::BookingConfirmed,
            NotificationChannel::Sms,
            &booking.customer_phone,
            &body,
        ));
        self.dispatch(Notification::new(
            booking.id,
            NotificationKind::BookingConfirmed,
            NotificationChannel::Email,
            &booking.customer_email,
            &body,
        ));

        if let Some(admin) = admin_email {
            self.dispatch(Notification::new(
                booking.id,
                NotificationKind::BookingConfirmed,
                NotificationChannel::Email,
                admin,
                format!(
                    "New booking {}: {} guests at table {} on {} {} ({}, {}).",
                    booking.id,
                    booking.num_guests,
                    booking.table_id,
                    booking.booking_date,
                    booking.booking_time.format("%H:%M"),
                    booking.customer_name,
                    booking.customer_phone
                ),
            ));
        }
    }

    pub fn booking_cancelled(&self, booking: &Booking, refund_amount: &BigDecimal) {
        let body = format!(
            "Your booking for {} {} has been cancelled. Refund: {}.",
            booking.booking_date,
            booking.booking_time.format("%H:%M"),
            refund_amount
        );
        for (channel, recipient) in [
            (NotificationChannel::Sms, &booking.customer_phone),
            (NotificationChannel::Email, &booking.customer_email),
        ] {
            self.dispatch(Notification::new(
                booking.id,
                NotificationKind::BookingCancelled,
                channel,
                recipient,
                &body,
            ));
        }
    }

    pub fn checked_in(&self, booking: &Booking) {
        self.dispatch(Notification::new(
            booking.id,
            NotificationKind::CheckedIn,
            NotificationChannel::Push,
            booking.user_id.to_string(),
            format!("Welcome! You are checked in at table {}.", booking.table_id),
        ));
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

#[async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        (**self).deliver(notification).await
    }
}

pub struct KafkaNotificationSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaNotificationSink {
    pub fn new(producer: FutureProducer, topic: String) -> Self {
        Self { producer, topic }
    }
}

#[async_trait]
impl NotificationSink for KafkaNotificationSink {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let json = serde_json::to_string(notification)?;
        let key = notification.booking_id.to_string();
        let record = FutureRecord::to(&self.topic)
            .payload(&json)
            .key(&key);

        self.producer.send(record, Duration::from_secs(5)).await
            .map_err(|(e, _)| anyhow::anyhow!("Failed to publish notification: {}", e))?;

        Ok(())
    }
}

pub struct NotificationWorker<S> {
    receiver: mpsc::UnboundedReceiver<Notification>,
    sink: S,
}

impl<S: NotificationSink> NotificationWorker<S> {
    pub fn new(receiver: mpsc::UnboundedReceiver<Notification>, sink: S) -> Self {
        Self { receiver, sink }
    }

    /// Runs until every dispatcher has been dropped.
    pub async fn run(mut self) {
        while let Some(notification) = self.receiver.recv().await {
            match self.sink.deliver(&notification).await {
                Ok(()) => info!(
                    "Delivered {:?} {:?} notification for booking {}",
                    notification.kind, notification.channel, notification.booking_id
                ),
                Err(e) => error!(
                    "Failed to deliver notification {} for booking {}: {}",
                    notification.id, notification.booking_id, e
                ),
            }
        }
    }
}
