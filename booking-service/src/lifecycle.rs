//! Booking state machine.
//!
//! ```text
//! pending ──► confirmed ──► checked-in
//!    │            │
//!    ├──► cancelled ◄┤
//!    └──► no-show ◄──┘
//! ```
//!
//! Payment moves independently: `pending → paid → refunded` and
//! `pending → failed`, where a failed payment may be retried into `paid`.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use shared::{BookingStatus, PaymentStatus};

use crate::error::{BookingError, Result};
use crate::models::Booking;

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed)
            | (Confirmed, CheckedIn)
            | (Pending, Cancelled)
            | (Confirmed, Cancelled)
            | (Pending, NoShow)
            | (Confirmed, NoShow)
    )
}

pub fn can_transition_payment(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Paid) | (Pending, Failed) | (Failed, Paid) | (Failed, Failed) | (Paid, Refunded)
    )
}

pub fn ensure_transition(booking: &Booking, to: BookingStatus) -> Result<()> {
    if can_transition(booking.booking_status, to) {
        Ok(())
    } else {
        Err(BookingError::InvalidState(format!(
            "booking {} cannot move from {} to {}",
            booking.id, booking.booking_status, to
        )))
    }
}

/// Payment may be attempted while the booking holds its slot unpaid.
pub fn ensure_payable(booking: &Booking) -> Result<()> {
    if booking.payment_status == PaymentStatus::Paid {
        return Err(BookingError::AlreadyPaid(booking.id));
    }
    if !can_transition_payment(booking.payment_status, PaymentStatus::Paid) {
        return Err(BookingError::InvalidState(format!(
            "booking {} payment is {}",
            booking.id, booking.payment_status
        )));
    }
    ensure_transition(booking, BookingStatus::Confirmed)
}

pub fn ensure_can_check_in(booking: &Booking) -> Result<()> {
    if booking.booking_status == BookingStatus::CheckedIn {
        return Err(BookingError::InvalidState(format!(
            "booking {} is already checked in",
            booking.id
        )));
    }
    ensure_transition(booking, BookingStatus::CheckedIn)
}

pub fn deposit_for(deposit_per_person: &BigDecimal, num_guests: i32) -> BigDecimal {
    deposit_per_person * BigDecimal::from(num_guests)
}

/// The instant a slot starts, reading its wall-clock date and time at `offset`.
pub fn slot_start(date: NaiveDate, time: NaiveTime, offset: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(time);
    Utc.from_utc_datetime(&(local - Duration::seconds(i64::from(offset.local_minus_utc()))))
}
