//! Futures aware calls.
//!
//! [`CallFuture`] turns the callback based [`Call::enqueue`] into a future. Like `enqueue` it
//! does not involve any circuit breaker.
//!
//! [`BreakerFuture`] extends the synchronous protocol of [`DecoratedCall`] to any future that
//! yields a response: permission is requested on the first poll, the outcome is classified and
//! reported once the inner future completes.
//!
//! # Example
//!
//! ```
//! # use futures::executor::block_on;
//! use callbreaker::futures::BreakerFuture;
//! use callbreaker::{CircuitBreaker, Config, IsSuccessful, Response};
//!
//! let breaker = Config::new().build("backend");
//! let response = async { Ok::<_, std::io::Error>(Response::ok("hello world")) };
//!
//! let future = BreakerFuture::new(breaker.clone(), IsSuccessful, response);
//! let response = block_on(future).unwrap();
//!
//! assert_eq!("hello world", response.into_body());
//! assert_eq!(1, breaker.metrics().successful_calls());
//! ```

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures_core::future::FusedFuture;
use parking_lot::Mutex;
use pin_project_lite::pin_project;

use super::call::Call;
use super::circuit_breaker::CircuitBreaker;
use super::decorated_call::DecoratedCall;
use super::error::{CallNotPermitted, ClassifiedFailure, Error};
use super::response::Response;
use super::stopwatch::StopWatch;
use super::success_predicate::SuccessPredicate;

type Outcome<T, E> = Result<Response<T>, E>;

#[derive(Debug)]
struct Slot<T, E> {
    outcome: Option<Outcome<T, E>>,
    waker: Option<Waker>,
}

/// A future which enqueues a call on first poll and resolves with its outcome.
#[allow(missing_debug_implementations)]
pub struct CallFuture<C: Call> {
    call: C,
    slot: Arc<Mutex<Slot<C::Body, C::Error>>>,
    enqueued: bool,
    terminated: bool,
}

// The call is never pinned.
impl<C: Call> Unpin for CallFuture<C> {}

impl<C: Call> CallFuture<C> {
    /// Creates a future for `call`, which must not have been executed yet.
    pub fn new(call: C) -> Self {
        CallFuture {
            call,
            slot: Arc::new(Mutex::new(Slot {
                outcome: None,
                waker: None,
            })),
            enqueued: false,
            terminated: false,
        }
    }

    /// The call, e.g. to cancel it while the future is pending.
    pub fn get_ref(&self) -> &C {
        &self.call
    }

    fn take_outcome(&mut self) -> Option<Outcome<C::Body, C::Error>> {
        let outcome = self.slot.lock().outcome.take();
        if outcome.is_some() {
            self.terminated = true;
        }
        outcome
    }
}

impl<C> Future for CallFuture<C>
where
    C: Call,
    C::Body: Send + 'static,
    C::Error: Send + 'static,
{
    type Output = Outcome<C::Body, C::Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if let Some(outcome) = this.take_outcome() {
            return Poll::Ready(outcome);
        }
        this.slot.lock().waker = Some(cx.waker().clone());

        if !this.enqueued {
            this.enqueued = true;
            let slot = this.slot.clone();
            this.call.enqueue(move |outcome| {
                let waker = {
                    let mut slot = slot.lock();
                    slot.outcome = Some(outcome);
                    slot.waker.take()
                };
                if let Some(waker) = waker {
                    waker.wake();
                }
            });

            // The call may have completed on this thread.
            if let Some(outcome) = this.take_outcome() {
                return Poll::Ready(outcome);
            }
        }

        Poll::Pending
    }
}

impl<C> FusedFuture for CallFuture<C>
where
    C: Call,
    C::Body: Send + 'static,
    C::Error: Send + 'static,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

pin_project! {
    /// A circuit breaker's future.
    ///
    /// Resolves with [`Error::Rejected`] without polling the inner future when the breaker does
    /// not permit the call.
    #[allow(missing_debug_implementations)]
    pub struct BreakerFuture<FUT, BREAKER, PREDICATE> {
        #[pin]
        future: FUT,
        breaker: BREAKER,
        predicate: PREDICATE,
        stopwatch: Option<StopWatch>,
        admitted: bool,
        terminated: bool,
    }
}

impl<FUT, BREAKER, PREDICATE> BreakerFuture<FUT, BREAKER, PREDICATE> {
    /// Wraps `future`, reporting its outcome to `breaker` as classified by `predicate`.
    pub fn new(breaker: BREAKER, predicate: PREDICATE, future: FUT) -> Self {
        BreakerFuture {
            future,
            breaker,
            predicate,
            stopwatch: None,
            admitted: false,
            terminated: false,
        }
    }
}

impl<FUT, BREAKER, PREDICATE, T, E> Future for BreakerFuture<FUT, BREAKER, PREDICATE>
where
    FUT: Future<Output = Outcome<T, E>>,
    BREAKER: CircuitBreaker,
    PREDICATE: SuccessPredicate<T>,
    E: StdError + 'static,
{
    type Output = Outcome<T, Error<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();

        if !*this.admitted {
            if !this.breaker.is_call_permitted() {
                *this.terminated = true;
                let rejected = CallNotPermitted::new(this.breaker.name(), this.breaker.state());
                return Poll::Ready(Err(Error::Rejected(rejected)));
            }
            *this.admitted = true;
            *this.stopwatch = Some(StopWatch::start(this.breaker.name()));
        }

        let outcome = match this.future.poll(cx) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => return Poll::Pending,
        };
        *this.terminated = true;
        let elapsed = this.stopwatch.take().map(StopWatch::stop).unwrap_or_default();

        match outcome {
            Ok(response) => {
                if this.predicate.is_success(&response) {
                    this.breaker.on_success(elapsed);
                } else {
                    let cause = ClassifiedFailure::new(response.status(), response.message());
                    this.breaker.on_error(elapsed, &cause);
                }
                Poll::Ready(Ok(response))
            }
            Err(err) => {
                this.breaker.on_error(elapsed, &err);
                Poll::Ready(Err(Error::Inner(err)))
            }
        }
    }
}

impl<FUT, BREAKER, PREDICATE, T, E> FusedFuture for BreakerFuture<FUT, BREAKER, PREDICATE>
where
    FUT: Future<Output = Outcome<T, E>>,
    BREAKER: CircuitBreaker,
    PREDICATE: SuccessPredicate<T>,
    E: StdError + 'static,
{
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<C, B, P> DecoratedCall<C, B, P>
where
    C: Call,
    C::Body: Send + 'static,
    C::Error: Send,
    B: CircuitBreaker,
    P: SuccessPredicate<C::Body>,
{
    /// Enqueues the wrapped call as a future which, unlike [`Call::enqueue`], requests
    /// permission from the breaker and reports the outcome to it.
    pub fn into_breaker_future(
        self,
    ) -> BreakerFuture<CallFuture<C>, B, impl Fn(&Response<C::Body>) -> bool> {
        let (call, breaker, predicate) = self.into_parts();
        let predicate = move |response: &Response<C::Body>| predicate.is_success(response);
        BreakerFuture::new(breaker, predicate, CallFuture::new(call))
    }
}
