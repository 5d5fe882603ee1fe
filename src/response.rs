use http::{HeaderMap, StatusCode};

/// A completed response delivered by a call's transport.
///
/// A response with a 4xx or 5xx status is still a response, not an error; whether it counts as
/// a failure is up to a [`SuccessPredicate`](crate::SuccessPredicate).
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    body: T,
}

impl<T> Response<T> {
    /// Creates a response with the given status; the message is the status' canonical reason.
    pub fn new(status: StatusCode, body: T) -> Self {
        Response {
            status,
            message: status.canonical_reason().unwrap_or_default().to_owned(),
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Creates a `200 OK` response.
    pub fn ok(body: T) -> Self {
        Response::new(StatusCode::OK, body)
    }

    /// Replaces the status message, as sent on the status line.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Replaces the headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The numeric status code.
    pub fn code(&self) -> u16 {
        self.status.as_u16()
    }

    /// The status message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` when the status is in the range [200;300).
    pub fn is_successful(&self) -> bool {
        self.status.is_success()
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The deserialized body.
    pub fn body(&self) -> &T {
        &self.body
    }

    /// Consumes the response, returning the body.
    pub fn into_body(self) -> T {
        self.body
    }
}

impl<T> From<http::Response<T>> for Response<T> {
    fn from(response: http::Response<T>) -> Self {
        let (parts, body) = response.into_parts();
        Response::new(parts.status, body).with_headers(parts.headers)
    }
}
