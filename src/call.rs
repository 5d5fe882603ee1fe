use std::error::Error as StdError;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use super::response::Response;

/// One invocation of a remote operation.
///
/// A call runs at most once, either via [`execute`](Call::execute) or via
/// [`enqueue`](Call::enqueue). [`clone_call`](Call::clone_call) creates a fresh call for the same
/// request which may run again.
pub trait Call {
    /// The success payload.
    type Body;

    /// The transport's error, reported to a circuit breaker as the cause of a failed call.
    type Error: StdError + 'static;

    /// The description of the request this call sends.
    type Request;

    /// Sends the request and blocks until the response arrives.
    fn execute(&self) -> Result<Response<Self::Body>, Self::Error>;

    /// Sends the request and hands its outcome to `callback`.
    fn enqueue<F>(&self, callback: F)
    where
        F: FnOnce(Result<Response<Self::Body>, Self::Error>) + Send + 'static;

    /// Returns `true` if this call has been executed or enqueued.
    fn is_executed(&self) -> bool;

    /// Cancels this call. An in-flight call fails, a pending one never starts.
    fn cancel(&self);

    /// Returns `true` if [`cancel`](Call::cancel) was invoked.
    fn is_canceled(&self) -> bool;

    /// Creates a new, identical call which has not been executed yet.
    fn clone_call(&self) -> Self
    where
        Self: Sized;

    /// The request this call sends.
    fn request(&self) -> &Self::Request;
}

/// An error of [`FnCall`].
#[derive(Debug, Error)]
pub enum FnCallError<E> {
    /// The call was executed or enqueued before.
    #[error("already executed")]
    AlreadyExecuted,
    /// The call was canceled.
    #[error("canceled")]
    Canceled,
    /// The transport failed.
    #[error(transparent)]
    Transport(E),
}

/// A [`Call`] which sends its request through a transport function.
///
/// The transport runs on the caller's thread, for both `execute` and `enqueue`.
pub struct FnCall<Req, T, E, F> {
    request: Arc<Req>,
    transport: Arc<F>,
    executed: AtomicBool,
    canceled: AtomicBool,
    _marker: PhantomData<fn() -> Result<T, E>>,
}

impl<Req, T, E, F> FnCall<Req, T, E, F>
where
    F: Fn(&Req) -> Result<Response<T>, E>,
{
    /// Creates a new call sending `request` through `transport`.
    pub fn new(request: Req, transport: F) -> Self {
        FnCall {
            request: Arc::new(request),
            transport: Arc::new(transport),
            executed: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    fn run(&self) -> Result<Response<T>, FnCallError<E>> {
        if self.executed.swap(true, Ordering::SeqCst) {
            return Err(FnCallError::AlreadyExecuted);
        }
        if self.canceled.load(Ordering::SeqCst) {
            return Err(FnCallError::Canceled);
        }

        let result = (self.transport)(&self.request).map_err(FnCallError::Transport);

        // Canceled while in flight.
        if self.canceled.load(Ordering::SeqCst) {
            return Err(FnCallError::Canceled);
        }
        result
    }
}

impl<Req, T, E, F> Call for FnCall<Req, T, E, F>
where
    E: StdError + 'static,
    F: Fn(&Req) -> Result<Response<T>, E>,
{
    type Body = T;
    type Error = FnCallError<E>;
    type Request = Req;

    fn execute(&self) -> Result<Response<T>, FnCallError<E>> {
        self.run()
    }

    fn enqueue<CB>(&self, callback: CB)
    where
        CB: FnOnce(Result<Response<T>, FnCallError<E>>) + Send + 'static,
    {
        callback(self.run())
    }

    fn is_executed(&self) -> bool {
        self.executed.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst)
    }

    fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    fn clone_call(&self) -> Self {
        FnCall {
            request: self.request.clone(),
            transport: self.transport.clone(),
            executed: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            _marker: PhantomData,
        }
    }

    fn request(&self) -> &Req {
        &self.request
    }
}

impl<Req, T, E, F> fmt::Debug for FnCall<Req, T, E, F>
where
    Req: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCall")
            .field("request", &self.request)
            .field("executed", &self.executed)
            .field("canceled", &self.canceled)
            .finish()
    }
}
