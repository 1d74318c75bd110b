//! # Staydesk Booking
//!
//! Booking lifecycle reconciliation for the staydesk console.
//!
//! A booking is mutated (dates amended, payment captured, booking cancelled)
//! against a remote system of record whose true state only becomes visible
//! later, through payment processor webhooks. This crate keeps the local view
//! honest while that happens:
//!
//! - [`idempotency`]: time-bucketed keys so retried mutations are collapsed
//! - [`sequencer`]: per-resource counters that discard superseded responses
//! - [`timeline`]: normalization of the heterogeneous audit log
//! - [`amendment`]: the quote-then-confirm protocol for date changes
//! - [`payment`]: capture and bounded reconciliation polling
//! - [`cancellation`]: confirmation-gated cancellation
//! - [`view`]: the reducer composing them and the controller that owns the store
//!
//! ## Example
//!
//! ```ignore
//! use staydesk_booking::{api::HttpBookingApi, config::ConsoleConfig, types::BookingId, view::*};
//! use staydesk_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! let config = ConsoleConfig::from_env();
//! let api = Arc::new(HttpBookingApi::new(&config.api)?);
//! let env = BookingEnvironment::from_config(&config, Arc::new(SystemClock), api);
//! let controller = BookingViewController::new(env);
//! controller.open(BookingId::new("bk_42")).await?;
//! ```

pub mod amendment;
pub mod api;
pub mod cancellation;
pub mod config;
pub mod error;
pub mod idempotency;
pub mod payment;
pub mod sequencer;
pub mod timeline;
pub mod types;
pub mod view;

pub use error::{ApiError, FlowError, ValidationError};
pub use types::{BookingId, BookingStatus, Money, Notice, PriceDelta};
pub use view::{BookingAction, BookingEnvironment, BookingViewController, BookingViewState};
