use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::call::Call;
use super::circuit_breaker::CircuitBreaker;
use super::error::{CallNotPermitted, CallPanicked, ClassifiedFailure, Error};
use super::response::Response;
use super::stopwatch::StopWatch;
use super::success_predicate::{IsSuccessful, SuccessPredicate};

/// Decorates `call` so that `breaker` sees every synchronous outcome.
///
/// Transport errors and responses without a 2xx status are recorded as failures.
#[inline]
pub fn decorate_call<C, B>(breaker: B, call: C) -> DecoratedCall<C, B, IsSuccessful>
where
    C: Call,
    B: CircuitBreaker,
{
    decorate_call_with(breaker, call, IsSuccessful)
}

/// Decorates `call` so that `breaker` sees every synchronous outcome.
///
/// Transport errors are recorded as failures, responses as decided by `predicate`. For example,
/// to treat only server errors as failures:
///
/// ```
/// # use callbreaker::{decorate_call_with, Config, FnCall, Response};
/// let breaker = Config::new().build("backend");
/// let call = FnCall::new("/greeting", |_: &&str| Ok::<_, std::io::Error>(Response::ok("hi")));
/// let call = decorate_call_with(breaker, call, |r: &Response<&str>| r.code() < 500);
/// ```
#[inline]
pub fn decorate_call_with<C, B, P>(breaker: B, call: C, predicate: P) -> DecoratedCall<C, B, P>
where
    C: Call,
    B: CircuitBreaker,
    P: SuccessPredicate<C::Body>,
{
    DecoratedCall {
        call,
        breaker,
        predicate: Arc::new(predicate),
    }
}

/// A [`Call`] guarded by a circuit breaker.
///
/// Only [`execute`](Call::execute) consults the breaker. [`enqueue`](Call::enqueue) goes straight
/// to the wrapped call and its outcome is never recorded; with the `futures-support` feature,
/// `futures::BreakerFuture` offers breaker aware asynchronous execution.
///
/// Clones made by [`clone_call`](Call::clone_call) share the predicate and a clone of the
/// breaker, which is why a decorated call needs a `Clone` breaker: usually a cheap handle such as
/// [`StateMachine`](crate::StateMachine) or an `Arc`.
pub struct DecoratedCall<C, B, P = IsSuccessful> {
    call: C,
    breaker: B,
    predicate: Arc<P>,
}

impl<C, B, P> DecoratedCall<C, B, P> {
    /// The wrapped call.
    pub fn get_ref(&self) -> &C {
        &self.call
    }

    /// The circuit breaker this call reports to.
    pub fn breaker(&self) -> &B {
        &self.breaker
    }

    /// Replaces the success predicate.
    pub fn with_predicate<Q>(self, predicate: Q) -> DecoratedCall<C, B, Q> {
        DecoratedCall {
            call: self.call,
            breaker: self.breaker,
            predicate: Arc::new(predicate),
        }
    }

    /// Unwraps the call, dropping the decoration.
    pub fn into_inner(self) -> C {
        self.call
    }

    #[cfg(feature = "futures-support")]
    pub(crate) fn into_parts(self) -> (C, B, Arc<P>) {
        (self.call, self.breaker, self.predicate)
    }
}

impl<C, B, P> DecoratedCall<C, B, P>
where
    C: Call,
    B: CircuitBreaker + Clone,
{
    /// Like [`clone_call`](Call::clone_call), but classifies the clone's responses with
    /// `predicate`.
    pub fn clone_with<Q>(&self, predicate: Q) -> DecoratedCall<C, B, Q>
    where
        Q: SuccessPredicate<C::Body>,
    {
        decorate_call_with(self.breaker.clone(), self.call.clone_call(), predicate)
    }
}

impl<C, B, P> Call for DecoratedCall<C, B, P>
where
    C: Call,
    B: CircuitBreaker + Clone,
    P: SuccessPredicate<C::Body>,
{
    type Body = C::Body;
    type Error = Error<C::Error>;
    type Request = C::Request;

    fn execute(&self) -> Result<Response<C::Body>, Error<C::Error>> {
        if !self.breaker.is_call_permitted() {
            let rejected = CallNotPermitted::new(self.breaker.name(), self.breaker.state());
            return Err(Error::Rejected(rejected));
        }

        let stopwatch = StopWatch::start(self.breaker.name());
        // The predicate runs inside the guard too: a panic there is a failed call.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.call.execute().map(|response| {
                let success = self.predicate.is_success(&response);
                (response, success)
            })
        }));
        let elapsed = stopwatch.stop();

        match outcome {
            Ok(Ok((response, true))) => {
                self.breaker.on_success(elapsed);
                Ok(response)
            }
            Ok(Ok((response, false))) => {
                let cause = ClassifiedFailure::new(response.status(), response.message());
                self.breaker.on_error(elapsed, &cause);
                Ok(response)
            }
            Ok(Err(err)) => {
                self.breaker.on_error(elapsed, &err);
                Err(Error::Inner(err))
            }
            Err(payload) => {
                let cause = CallPanicked::from_payload(&*payload);
                self.breaker.on_error(elapsed, &cause);
                panic::resume_unwind(payload)
            }
        }
    }

    fn enqueue<F>(&self, callback: F)
    where
        F: FnOnce(Result<Response<C::Body>, Error<C::Error>>) + Send + 'static,
    {
        self.call
            .enqueue(move |result| callback(result.map_err(Error::Inner)))
    }

    #[inline]
    fn is_executed(&self) -> bool {
        self.call.is_executed()
    }

    #[inline]
    fn cancel(&self) {
        self.call.cancel()
    }

    #[inline]
    fn is_canceled(&self) -> bool {
        self.call.is_canceled()
    }

    fn clone_call(&self) -> Self {
        DecoratedCall {
            call: self.call.clone_call(),
            breaker: self.breaker.clone(),
            predicate: self.predicate.clone(),
        }
    }

    #[inline]
    fn request(&self) -> &C::Request {
        self.call.request()
    }
}

impl<C, B, P> fmt::Debug for DecoratedCall<C, B, P>
where
    C: fmt::Debug,
    B: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratedCall")
            .field("call", &self.call)
            .field("breaker", &self.breaker)
            .finish()
    }
}
