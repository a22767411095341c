//! The outward answer of a dispatch cycle.

use bytes::Bytes;
use http::StatusCode;
use serde_json::Value;

/// Response payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Plain UTF-8 text.
    Text(String),
    /// A JSON document.
    Json(Value),
}

impl Body {
    /// The `Content-Type` this body should be sent with.
    pub fn content_type(&self) -> Option<&'static str> {
        match self {
            Self::Empty => None,
            Self::Text(_) => Some("text/plain; charset=utf-8"),
            Self::Json(_) => Some("application/json"),
        }
    }

    /// Serializes the body for the wire.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Text(text) => Ok(Bytes::copy_from_slice(text.as_bytes())),
            Self::Json(value) => serde_json::to_vec(value).map(Bytes::from),
        }
    }
}

/// A status code plus a body.
///
/// Each dispatch cycle produces exactly one `Response`: either the one a
/// handler wrote, or the one the error reporter rendered from a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    status: StatusCode,
    body: Body,
}

impl Response {
    /// Fixed body of [`Response::internal_fallback`].
    pub const FALLBACK_TEXT: &'static str = "Internal Server Error";

    /// Creates a response from its parts.
    pub fn new(status: StatusCode, body: Body) -> Self {
        Self { status, body }
    }

    /// A `200 OK` JSON response.
    pub fn ok(value: Value) -> Self {
        Self::json(StatusCode::OK, value)
    }

    /// A JSON response with the given status.
    pub fn json(status: StatusCode, value: Value) -> Self {
        Self::new(status, Body::Json(value))
    }

    /// A plain-text response with the given status.
    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(status, Body::Text(text.into()))
    }

    /// A response with no body.
    pub fn empty(status: StatusCode) -> Self {
        Self::new(status, Body::Empty)
    }

    /// The structured error shape: `{"error": <message>}`.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// Fixed, unformatted `500` used when rendering a failure itself fails
    /// or a cycle is abandoned.
    pub fn internal_fallback() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, Self::FALLBACK_TEXT)
    }

    /// The status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The body.
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// The JSON body, if this is a JSON response.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Splits the response into status and body.
    pub fn into_parts(self) -> (StatusCode, Body) {
        (self.status, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_shape() {
        let resp = Response::error(StatusCode::NOT_FOUND, "not found");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.json_body(), Some(&json!({ "error": "not found" })));
        assert_eq!(resp.body().content_type(), Some("application/json"));
    }

    #[test]
    fn test_body_bytes() {
        let body = Body::Json(json!({ "error": "boom" }));
        assert_eq!(body.to_bytes().unwrap(), Bytes::from_static(br#"{"error":"boom"}"#));
        assert_eq!(Body::Empty.to_bytes().unwrap(), Bytes::new());
        assert_eq!(Body::Empty.content_type(), None);
    }

    #[test]
    fn test_fallback_is_plain_text() {
        let resp = Response::internal_fallback();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(resp.body(), &Body::Text("Internal Server Error".to_string()));
        assert!(resp.json_body().is_none());
    }
}
