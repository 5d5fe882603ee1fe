use super::response::Response;

/// Evaluates if a completed response should be recorded as a success.
pub trait SuccessPredicate<T> {
    /// Must return `true` if the response counts as a success, otherwise it must return `false`.
    fn is_success(&self, response: &Response<T>) -> bool;
}

impl<T, F> SuccessPredicate<T> for F
where
    F: Fn(&Response<T>) -> bool,
{
    fn is_success(&self, response: &Response<T>) -> bool {
        self(response)
    }
}

/// Classifies responses with a 2xx status as successes.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsSuccessful;

impl<T> SuccessPredicate<T> for IsSuccessful {
    #[inline]
    fn is_success(&self, response: &Response<T>) -> bool {
        response.is_successful()
    }
}
