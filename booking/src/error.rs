//! Error taxonomy for the booking console.
//!
//! Nothing here is fatal: every error is stored as the "last error" of the
//! component that produced it and the user may retry.

use crate::types::BookingStatus;
use thiserror::Error;

/// Problems caught before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Check-in or check-out not provided
    #[error("both check-in and check-out dates are required")]
    MissingDates,

    /// Check-out is not after check-in
    #[error("check-out must be after check-in")]
    InvalidDateRange,

    /// Confirm requested without a quote accepted in this session
    #[error("request a quote before confirming the amendment")]
    MissingAmendId,

    /// Amount is not a decimal number
    #[error("amount must be a number with at most two decimals")]
    NonNumericAmount,

    /// Amount is zero or negative
    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    /// The booking is not in the `confirmed` status
    #[error("booking is {status}; only confirmed bookings can be changed")]
    StatusNotConfirmed {
        /// Current status
        status: BookingStatus,
    },

    /// No booking snapshot has been loaded yet
    #[error("no booking is loaded")]
    NoBookingLoaded,

    /// Cancellation confirmed without the confirmation gate being open
    #[error("cancellation was not requested")]
    CancellationNotRequested,
}

/// Coarse class of an [`ApiError`], used to pick user-facing copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Session expired or missing
    Session,
    /// Authenticated but not allowed
    Permission,
    /// Resource does not exist
    Missing,
    /// Backend failure
    Server,
    /// Request rejected by the backend
    Request,
    /// No response (connection, timeout)
    Network,
}

/// Failures reported by the backend client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// HTTP 401
    #[error("unauthorized")]
    Unauthorized,

    /// HTTP 403
    #[error("forbidden")]
    Forbidden,

    /// HTTP 404
    #[error("not found")]
    NotFound,

    /// HTTP 5xx
    #[error("server error (HTTP {status})")]
    Server {
        /// Status code
        status: u16,
    },

    /// Any other 4xx
    #[error("request rejected (HTTP {status}): {message}")]
    Rejected {
        /// Status code
        status: u16,
        /// Message from the response body, if any
        message: String,
    },

    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a non-success HTTP status to an error.
    #[must_use]
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            500..=599 => Self::Server { status },
            _ => Self::Rejected {
                status,
                message: message.into(),
            },
        }
    }

    /// Coarse category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthorized => ErrorCategory::Session,
            Self::Forbidden => ErrorCategory::Permission,
            Self::NotFound => ErrorCategory::Missing,
            Self::Server { .. } | Self::Decode(_) => ErrorCategory::Server,
            Self::Rejected { .. } => ErrorCategory::Request,
            Self::Transport(_) => ErrorCategory::Network,
        }
    }

    /// Copy suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized => "Your session has expired. Sign in again and retry.".to_string(),
            Self::Forbidden => "You do not have permission to perform this action.".to_string(),
            Self::NotFound => "The booking could not be found.".to_string(),
            Self::Server { .. } | Self::Decode(_) => {
                "The booking service is having trouble. Try again in a moment.".to_string()
            },
            Self::Rejected { message, .. } if !message.is_empty() => {
                format!("The request was rejected: {message}")
            },
            Self::Rejected { .. } => "The request was rejected.".to_string(),
            Self::Transport(_) => {
                "Could not reach the booking service. Check your connection and retry.".to_string()
            },
        }
    }
}

/// Last error of a console component.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    /// Rejected client-side
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Rejected or failed at the backend
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl FlowError {
    /// Copy suitable for showing to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(error) => error.to_string(),
            Self::Api(error) => error.user_message(),
        }
    }
}
