//! Response translation back into the engine.
//!
//! [`AppResponse`] is the application's side of the contract: status,
//! headers (case preserved, multi-valued), cookies, and a body that is set
//! at most once. [`AppResponse::into_engine_response`] is the terminal
//! translation: it consumes the response, so nothing can be appended after
//! finalization.

use axum::body::Body;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};
use tracing::warn;

/// One cookie to emit as a raw `Set-Cookie` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value, carried verbatim.
    pub value: String,
    /// Lifetime in seconds (`Max-Age`). `None` makes a session cookie.
    pub max_age: Option<u64>,
    /// `Path` attribute.
    pub path: Option<String>,
    /// `Domain` attribute.
    pub domain: Option<String>,
    /// `Secure` attribute.
    pub secure: bool,
    /// `HttpOnly` attribute.
    pub http_only: bool,
}

impl Cookie {
    /// Create a session cookie with no attributes.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: None,
            domain: None,
            secure: false,
            http_only: false,
        }
    }

    /// Set the lifetime in seconds.
    pub fn with_max_age(mut self, secs: u64) -> Self {
        self.max_age = Some(secs);
        self
    }

    /// Set the `Path` attribute.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Set the `Domain` attribute.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Mark the cookie `Secure`.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Mark the cookie `HttpOnly`.
    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    /// Encode as one raw `Set-Cookie` directive.
    pub fn encode(&self) -> String {
        let mut directive = format!("{}={}", self.name, self.value);
        if let Some(max_age) = self.max_age {
            directive.push_str(&format!("; Max-Age={max_age}"));
        }
        if let Some(ref path) = self.path {
            directive.push_str(&format!("; Path={path}"));
        }
        if let Some(ref domain) = self.domain {
            directive.push_str(&format!("; Domain={domain}"));
        }
        if self.secure {
            directive.push_str("; Secure");
        }
        if self.http_only {
            directive.push_str("; HttpOnly");
        }
        directive
    }
}

/// Application response, translated into the engine response exactly once.
#[derive(Debug, Clone)]
pub struct AppResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers as key-value pairs, case preserved.
    pub headers: Vec<(String, String)>,
    /// Cookies to emit, one `Set-Cookie` directive each.
    pub cookies: Vec<Cookie>,
    /// Response body.
    pub body: Vec<u8>,
}

impl AppResponse {
    /// Create an empty response with just a status code.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Create a plain text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![(
                "content-type".to_string(),
                "text/plain; charset=utf-8".to_string(),
            )],
            cookies: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            cookies: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    /// Create an error response with a JSON body.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({
            "error": message
        })
        .to_string();
        Self::json(status, &body)
    }

    /// Add a header. Repeating a name emits the header once per value.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Add a cookie.
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Prepend bytes to the body (used for buffered incidental output).
    pub fn prepend_body(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut combined = Vec::with_capacity(bytes.len() + self.body.len());
        combined.extend_from_slice(bytes);
        combined.append(&mut self.body);
        self.body = combined;
    }

    /// Translate into the engine response. Terminal: consumes the value.
    pub fn into_engine_response(self) -> Response<Body> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = Response::builder().status(status);

        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => response = response.header(name, value),
                _ => warn!(header = %name, "dropping header with invalid name or value"),
            }
        }

        for cookie in &self.cookies {
            match HeaderValue::try_from(cookie.encode()) {
                Ok(value) => response = response.header(SET_COOKIE, value),
                Err(_) => warn!(cookie = %cookie.name, "dropping cookie with invalid encoding"),
            }
        }

        response.body(Body::from(self.body)).unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal server error"))
                .unwrap()
        })
    }
}

impl Default for AppResponse {
    fn default() -> Self {
        Self::text(200, "OK")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_response() {
        let resp = AppResponse::text(200, "Hello, World!");
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"Hello, World!");
    }

    #[test]
    fn test_error_response() {
        let resp = AppResponse::error(404, "Not found");
        assert_eq!(resp.status, 404);
        assert!(String::from_utf8_lossy(&resp.body).contains("Not found"));
    }

    #[test]
    fn test_single_header_preserved() {
        let resp = AppResponse::empty(200).with_header("foo", "hello world");
        let engine_resp = resp.into_engine_response();

        let values: Vec<_> = engine_resp.headers().get_all("foo").iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "hello world");
    }

    #[test]
    fn test_multi_valued_header() {
        let resp = AppResponse::empty(200)
            .with_header("x-tag", "one")
            .with_header("x-tag", "two");
        let engine_resp = resp.into_engine_response();

        let values: Vec<_> = engine_resp.headers().get_all("x-tag").iter().collect();
        assert_eq!(values, vec!["one", "two"]);
    }

    #[test]
    fn test_cookie_encoding() {
        let cookie = Cookie::new("id", "42").http_only();
        assert_eq!(cookie.encode(), "id=42; HttpOnly");

        let full = Cookie::new("session", "abc")
            .with_max_age(3600)
            .with_path("/app")
            .with_domain("example.com")
            .secure()
            .http_only();
        assert_eq!(
            full.encode(),
            "session=abc; Max-Age=3600; Path=/app; Domain=example.com; Secure; HttpOnly"
        );
    }

    #[test]
    fn test_exactly_one_set_cookie_directive() {
        let resp = AppResponse::empty(200).with_cookie(Cookie::new("id", "42").http_only());
        let engine_resp = resp.into_engine_response();

        let values: Vec<_> = engine_resp.headers().get_all(SET_COOKIE).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "id=42; HttpOnly");
    }

    #[test]
    fn test_prepend_body() {
        let mut resp = AppResponse::text(200, "body");
        resp.prepend_body(b"buffered:");
        assert_eq!(resp.body, b"buffered:body");

        resp.prepend_body(b"");
        assert_eq!(resp.body, b"buffered:body");
    }

    #[test]
    fn test_invalid_header_is_dropped() {
        let resp = AppResponse::empty(200)
            .with_header("x-ok", "fine")
            .with_header("x-bad", "line\nbreak");
        let engine_resp = resp.into_engine_response();

        assert_eq!(engine_resp.status(), StatusCode::OK);
        assert_eq!(engine_resp.headers().get("x-ok").unwrap(), "fine");
        assert!(engine_resp.headers().get("x-bad").is_none());
    }

    #[test]
    fn test_invalid_status_falls_back_to_500() {
        let resp = AppResponse::empty(1000).into_engine_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
