use diesel_async::pooled_connection::PoolError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Table slot is already held by an active booking")]
    SlotTaken,

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

impl From<bb8::RunError<PoolError>> for StoreError {
    fn from(e: bb8::RunError<PoolError>) -> Self {
        StoreError::Pool(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Booking {0} is already paid")]
    AlreadyPaid(Uuid),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Payment failed: {0}")]
    Payment(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Stable machine-readable kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation(_) => "validation_error",
            BookingError::NotFound(_) => "not_found",
            BookingError::Conflict(_) => "conflict",
            BookingError::AlreadyPaid(_) => "already_paid",
            BookingError::InvalidState(_) => "invalid_state",
            BookingError::Forbidden(_) => "forbidden",
            BookingError::Payment(_) => "payment_error",
            BookingError::Store(_) => "internal_error",
        }
    }

    pub fn booking_not_found(id: Uuid) -> Self {
        BookingError::NotFound(format!("booking {}", id))
    }
}

pub type Result<T> = std::result::Result<T, BookingError>;
