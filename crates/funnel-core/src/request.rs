//! Transport-agnostic inbound request.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, IntoHeaderName};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use percent_encoding::percent_decode;
use serde::de::DeserializeOwned;

use crate::failure::Failure;

/// An inbound request as seen by the pipeline.
///
/// A `Request` is built by the transport (or by tests) and is immutable once
/// dispatch begins: handlers only ever receive shared references to it.
///
/// # Example
///
/// ```rust
/// use funnel_core::{Method, Request};
///
/// let req = Request::new(Method::POST, "/users").with_body(r#"{"name":"ada"}"#);
///
/// assert_eq!(req.path(), "/users");
/// assert_eq!(req.body().len(), 14);
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Bytes,
}

impl Request {
    /// Creates a request with no headers and an empty body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Appends a header, keeping earlier values of the same name.
    pub fn with_header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces all headers (builder pattern).
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the body (builder pattern).
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request path, without query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Looks up a header as a string. Non-UTF-8 values are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the media type of the body, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Decodes the body as JSON.
    ///
    /// A request without a `Content-Type` is decoded as-is; one that
    /// declares a non-JSON media type is refused with `415`. Decode errors
    /// become a [`Failure`] classified as `400 Bad Request`, so handlers can
    /// simply use `?`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Failure> {
        if let Some(media_type) = self.content_type() {
            if !is_json_media_type(media_type) {
                return Err(
                    Failure::new(format!("expected a JSON body, got {media_type}"))
                        .with_status(StatusCode::UNSUPPORTED_MEDIA_TYPE),
                );
            }
        }

        serde_json::from_slice(&self.body)
            .map_err(|e| Failure::bad_request(format!("invalid JSON body: {e}")))
    }

    /// Decodes an `application/x-www-form-urlencoded` body.
    ///
    /// Repeated keys keep the last value. A pair that does not decode to
    /// UTF-8 fails the whole body with `400 Bad Request`.
    pub fn form(&self) -> Result<HashMap<String, String>, Failure> {
        self.body
            .split(|&b| b == b'&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = match pair.iter().position(|&b| b == b'=') {
                    Some(eq) => (&pair[..eq], &pair[eq + 1..]),
                    None => (pair, &[][..]),
                };
                Ok::<_, Failure>((decode_form_component(key)?, decode_form_component(value)?))
            })
            .collect()
    }
}

fn is_json_media_type(media_type: &str) -> bool {
    let media_type = media_type.to_ascii_lowercase();
    media_type == "application/json" || media_type.ends_with("+json")
}

fn decode_form_component(raw: &[u8]) -> Result<String, Failure> {
    let spaced: Vec<u8> = raw
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    let decoded: Vec<u8> = percent_decode(&spaced).collect();
    String::from_utf8(decoded)
        .map_err(|e| Failure::bad_request(format!("invalid form body: {e}")))
}
