use std::any::Any;

use http::StatusCode;
use thiserror::Error;

use super::state_machine::State;

/// A decorated call's error.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// An error from the wrapped call, returned unchanged.
    #[error(transparent)]
    Inner(E),
    /// The circuit breaker did not permit the call; the transport was never touched.
    #[error(transparent)]
    Rejected(CallNotPermitted),
}

impl<E> Error<E> {
    /// Returns `true` if the call was rejected by the circuit breaker.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }

    /// Returns the wrapped call's error, if any.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Error::Inner(err) => Some(err),
            Error::Rejected(_) => None,
        }
    }
}

/// Raised before any transport work when the circuit breaker denies admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit breaker '{name}' is {state} and does not permit further calls")]
pub struct CallNotPermitted {
    name: String,
    state: State,
}

impl CallNotPermitted {
    pub(crate) fn new(name: impl Into<String>, state: State) -> Self {
        CallNotPermitted {
            name: name.into(),
            state,
        }
    }

    /// The name of the circuit breaker which rejected the call.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The breaker's state observed right after the rejection.
    pub fn state(&self) -> State {
        self.state
    }
}

/// Describes a response which the transport delivered but the success predicate rejected.
///
/// Only ever handed to [`CircuitBreaker::on_error`](crate::CircuitBreaker::on_error); a caller
/// still receives the response itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Response error: HTTP {} - {message}", .status.as_u16())]
pub struct ClassifiedFailure {
    status: StatusCode,
    message: String,
}

impl ClassifiedFailure {
    pub(crate) fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ClassifiedFailure {
            status,
            message: message.into(),
        }
    }

    /// The response's status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response's status message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Reported to the circuit breaker when the transport or the success predicate panicked.
///
/// The panic itself is resumed after reporting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("call panicked: {message}")]
pub struct CallPanicked {
    message: String,
}

impl CallPanicked {
    pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "opaque panic payload".to_owned()
        };
        CallPanicked { message }
    }

    /// The panic message, when the payload was a string.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A declared return type is `Call` but not parameterized with a payload type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Call return type must be parameterized as Call<Foo> or Call<? extends Foo>, got {declared}"
)]
pub struct InvalidDeclaration {
    declared: String,
}

impl InvalidDeclaration {
    pub(crate) fn new(declared: impl Into<String>) -> Self {
        InvalidDeclaration {
            declared: declared.into(),
        }
    }

    /// The offending declaration.
    pub fn declared(&self) -> &str {
        &self.declared
    }
}
