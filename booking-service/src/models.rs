use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use shared::*;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub table_id: String,
    pub capacity: i32,
    #[serde(rename = "type")]
    pub table_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: Uuid,
    pub name: String,
    pub deposit_per_person: BigDecimal,
    pub admin_email: Option<String>,
    pub tables: Vec<Table>,
}

impl Restaurant {
    pub fn table(&self, table_id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.table_id == table_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: Uuid,
    pub booking_date: NaiveDate,
    #[serde(with = "time_of_day")]
    pub booking_time: NaiveTime,
    pub num_guests: i32,
    pub table_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub special_requests: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub deposit_amount: BigDecimal,
    pub payment_status: PaymentStatus,
    pub payment_reference_id: Option<String>,
    pub booking_status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// A fresh booking holding `slot`, awaiting its deposit.
    pub fn pending(
        slot: TableSlot,
        num_guests: i32,
        customer: CustomerInfo,
        deposit_amount: BigDecimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            restaurant_id: slot.restaurant_id,
            user_id: customer.user_id,
            booking_date: slot.date,
            booking_time: slot.time,
            num_guests,
            table_id: slot.table_id,
            customer_name: customer.name,
            customer_phone: customer.phone,
            customer_email: customer.email,
            special_requests: customer.special_requests,
            dietary_restrictions: customer.dietary_restrictions,
            deposit_amount,
            payment_status: PaymentStatus::Pending,
            payment_reference_id: None,
            booking_status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            checked_in_at: None,
        }
    }

    pub fn slot(&self) -> TableSlot {
        TableSlot {
            restaurant_id: self.restaurant_id,
            table_id: self.table_id.clone(),
            date: self.booking_date,
            time: self.booking_time,
        }
    }
}

/// Conditions a booking row must still satisfy for a transition to apply.
#[derive(Debug, Clone)]
pub struct TransitionGuard {
    pub booking_statuses: Vec<BookingStatus>,
    pub payment_statuses: Vec<PaymentStatus>,
}

impl TransitionGuard {
    pub fn booking(statuses: &[BookingStatus]) -> Self {
        Self {
            booking_statuses: statuses.to_vec(),
            payment_statuses: vec![
                PaymentStatus::Pending,
                PaymentStatus::Paid,
                PaymentStatus::Failed,
                PaymentStatus::Refunded,
            ],
        }
    }

    pub fn with_payment(mut self, statuses: &[PaymentStatus]) -> Self {
        self.payment_statuses = statuses.to_vec();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BookingChange {
    pub booking_status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub payment_reference_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::restaurants)]
pub struct DbRestaurant {
    pub id: Uuid,
    pub name: String,
    pub deposit_per_person: BigDecimal,
    pub admin_email: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::restaurant_tables)]
pub struct DbRestaurantTable {
    pub restaurant_id: Uuid,
    pub table_id: String,
    pub capacity: i32,
    pub table_type: String,
    pub position: i32,
}

impl DbRestaurant {
    pub fn into_restaurant(self, tables: Vec<DbRestaurantTable>) -> Restaurant {
        Restaurant {
            id: self.id,
            name: self.name,
            deposit_per_person: self.deposit_per_person,
            admin_email: self.admin_email,
            tables: tables
                .into_iter()
                .map(|t| Table {
                    table_id: t.table_id,
                    capacity: t.capacity,
                    table_type: t.table_type,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
pub struct DbBooking {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: Uuid,
    pub booking_date: NaiveDate,
    pub booking_time: NaiveTime,
    pub num_guests: i32,
    pub table_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub special_requests: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub deposit_amount: BigDecimal,
    pub payment_status: String,
    pub payment_reference_id: Option<String>,
    pub booking_status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = crate::schema::bookings)]
pub struct BookingChangeset {
    pub booking_status: Option<String>,
    pub payment_status: Option<String>,
    pub payment_reference_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl BookingChangeset {
    pub fn new(change: &BookingChange, now: DateTime<Utc>) -> Self {
        Self {
            booking_status: change.booking_status.map(|s| s.as_str().to_string()),
            payment_status: change.payment_status.map(|s| s.as_str().to_string()),
            payment_reference_id: change.payment_reference_id.clone(),
            cancelled_at: change.cancelled_at,
            checked_in_at: change.checked_in_at,
            updated_at: now,
        }
    }
}

impl From<Booking> for DbBooking {
    fn from(booking: Booking) -> Self {
        Self {
            id: booking.id,
            restaurant_id: booking.restaurant_id,
            user_id: booking.user_id,
            booking_date: booking.booking_date,
            booking_time: booking.booking_time,
            num_guests: booking.num_guests,
            table_id: booking.table_id,
            customer_name: booking.customer_name,
            customer_phone: booking.customer_phone,
            customer_email: booking.customer_email,
            special_requests: booking.special_requests,
            dietary_restrictions: booking.dietary_restrictions,
            deposit_amount: booking.deposit_amount,
            payment_status: booking.payment_status.as_str().to_string(),
            payment_reference_id: booking.payment_reference_id,
            booking_status: booking.booking_status.as_str().to_string(),
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            cancelled_at: booking.cancelled_at,
            checked_in_at: booking.checked_in_at,
        }
    }
}

impl TryFrom<DbBooking> for Booking {
    type Error = StoreError;

    fn try_from(row: DbBooking) -> Result<Self, Self::Error> {
        let payment_status = row
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(|e| StoreError::InvalidRow(format!("booking {}: {}", row.id, e)))?;
        let booking_status = row
            .booking_status
            .parse::<BookingStatus>()
            .map_err(|e| StoreError::InvalidRow(format!("booking {}: {}", row.id, e)))?;

        Ok(Self {
            id: row.id,
            restaurant_id: row.restaurant_id,
            user_id: row.user_id,
            booking_date: row.booking_date,
            booking_time: row.booking_time,
            num_guests: row.num_guests,
            table_id: row.table_id,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            special_requests: row.special_requests,
            dietary_restrictions: row.dietary_restrictions,
            deposit_amount: row.deposit_amount,
            payment_status,
            payment_reference_id: row.payment_reference_id,
            booking_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            cancelled_at: row.cancelled_at,
            checked_in_at: row.checked_in_at,
        })
    }
}

/// Times of day on the wire are `HH:MM`; `HH:MM:SS` is accepted on input.
pub mod time_of_day {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {}", raw)))
    }
}
