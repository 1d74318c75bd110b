//! The booking view: one store composing every lifecycle flow of a booking.
//!
//! # Architecture
//!
//! ```text
//! rendering layer ──commands──▶ BookingViewController ──▶ Store
//!        ▲                                                  │
//!        │                                         BookingViewReducer
//!        │                                 (amendment / payment / cancellation)
//!        │                                                  │
//!        └──snapshot() / subscribe()◀── result actions ◀── Effects (BookingApi calls, timers)
//! ```
//!
//! Reducers never perform I/O. Every backend call is an `Effect::Future`
//! whose result action carries the sequence token taken before the call,
//! and results whose token has been superseded are dropped.

pub mod actions;
pub mod controller;
pub mod environment;
pub mod reducer;
pub mod state;

pub use actions::BookingAction;
pub use controller::BookingViewController;
pub use environment::BookingEnvironment;
pub use reducer::BookingViewReducer;
pub use state::{BookingViewState, Freshness, TimelineCache};
