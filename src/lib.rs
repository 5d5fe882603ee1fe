//! A circuit breaker decorator for network calls.
//!
//! A [`DecoratedCall`] wraps any [`Call`] and asks a shared [`CircuitBreaker`] for permission
//! before every synchronous execution. Once executed, the outcome is reported back: transport
//! errors and responses rejected by a [`SuccessPredicate`] count as failures, everything else as
//! a success. Responses are always returned to the caller as they came, even when they count as
//! failures, so a decorated call behaves exactly like the undecorated one until the breaker
//! opens and starts rejecting calls with [`Error::Rejected`].
//!
//! The default breaker, [`StateMachine`], keeps the most recent outcomes in a ring buffer and
//! opens once their failure rate reaches a threshold.
//!
//! # Example
//!
//! ```
//! use std::io;
//! use std::time::Duration;
//!
//! use callbreaker::{decorate_call, Call, Config, FnCall, Response, State};
//!
//! let breaker = Config::new()
//!     .ring_buffer_size_in_closed_state(3)
//!     .wait_duration_in_open_state(Duration::from_millis(1000))
//!     .build("greeting");
//!
//! for _ in 0..3 {
//!     let call = FnCall::new("/greeting", |_: &&str| {
//!         Err::<Response<String>, _>(io::Error::new(io::ErrorKind::TimedOut, "read timed out"))
//!     });
//!     let call = decorate_call(breaker.clone(), call);
//!     assert!(call.execute().is_err());
//! }
//!
//! assert_eq!(3, breaker.metrics().failed_calls());
//! assert_eq!(State::Open, breaker.state());
//! ```
//!
//! See https://martinfowler.com/bliki/CircuitBreaker.html

#![deny(missing_debug_implementations)]
#![deny(missing_docs)]
#![cfg_attr(test, deny(warnings))]

mod call;
mod circuit_breaker;
mod config;
mod decorated_call;
mod error;
mod response;
mod ring_buffer;
mod state_machine;
mod stopwatch;
mod success_predicate;

pub mod adapter;
pub mod clock;
#[cfg(feature = "futures-support")]
pub mod futures;

pub use self::call::{Call, FnCall, FnCallError};
pub use self::circuit_breaker::CircuitBreaker;
pub use self::config::Config;
pub use self::decorated_call::{decorate_call, decorate_call_with, DecoratedCall};
pub use self::error::{CallNotPermitted, CallPanicked, ClassifiedFailure, Error, InvalidDeclaration};
pub use self::response::Response;
pub use self::state_machine::{Instrument, Metrics, State, StateMachine};
pub use self::stopwatch::StopWatch;
pub use self::success_predicate::{IsSuccessful, SuccessPredicate};
