//! Per-request context construction.
//!
//! [`RequestContext`] is the explicit value handed to the application for
//! each request: every field the engine received (headers, query, form
//! body, cookies, uploaded files, raw body) copied into one owned struct,
//! built fresh per call. Nothing about a request lives in ambient state.

use axum::body::Body;
use axum::extract::FromRequest;
use axum::http::Request;
use axum_extra::extract::Multipart;
use bytes::Bytes;

use crate::dispatch::OutputBuffer;

/// One file received in a multipart upload, held in memory.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Form field name the file arrived under.
    pub field: String,
    /// Client-supplied file name.
    pub file_name: String,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// File contents.
    pub data: Bytes,
}

/// Explicit request representation consumed by [`Dispatch`](crate::Dispatch).
///
/// Header and cookie names keep the case and order the engine delivered
/// them in; multi-valued headers appear once per value.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// HTTP method (GET, POST, ...).
    pub method: String,
    /// Request path, without the query string.
    pub path: String,
    /// Raw query string (empty if absent).
    pub query_string: String,
    /// Decoded query parameters, in order of appearance.
    pub query: Vec<(String, String)>,
    /// Decoded body parameters (urlencoded form fields or non-file
    /// multipart fields).
    pub form: Vec<(String, String)>,
    /// Request headers as delivered.
    pub headers: Vec<(String, String)>,
    /// Cookies parsed from `Cookie` headers.
    pub cookies: Vec<(String, String)>,
    /// Uploaded files from multipart bodies.
    pub files: Vec<UploadedFile>,
    /// Raw request body (empty for multipart, which is consumed into
    /// `form` and `files`).
    pub body: Bytes,
    /// Buffer for incidental output; drained into the response body.
    pub output: OutputBuffer,
}

impl RequestContext {
    /// Create a bare context. Useful for driving a dispatcher in tests.
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query_string: String::new(),
            query: Vec::new(),
            form: Vec::new(),
            headers: Vec::new(),
            cookies: Vec::new(),
            files: Vec::new(),
            body: Bytes::new(),
            output: OutputBuffer::new(),
        }
    }

    /// Build the context from an engine request, consuming its body.
    ///
    /// Multipart bodies are decoded into `form` and `files`; urlencoded
    /// bodies into `form`; anything else stays raw in `body`, capped at
    /// `max_body_bytes`.
    pub async fn from_engine(
        req: Request<Body>,
        max_body_bytes: usize,
    ) -> Result<Self, String> {
        let method = req.method().to_string();
        let uri = req.uri().clone();
        let path = uri.path().to_string();
        let query_string = uri.query().unwrap_or("").to_string();
        let query = parse_urlencoded(&query_string);

        let headers: Vec<(String, String)> = req
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let mut cookies = Vec::new();
        for (name, value) in &headers {
            if name.eq_ignore_ascii_case("cookie") {
                cookies.extend(parse_cookie_header(value));
            }
        }

        let content_type = headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.to_ascii_lowercase())
            .unwrap_or_default();

        let mut form = Vec::new();
        let mut files = Vec::new();
        let mut body = Bytes::new();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, &())
                .await
                .map_err(|e| format!("invalid multipart body: {e}"))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| format!("invalid multipart field: {e}"))?
            {
                let field_name = field.name().unwrap_or("").to_string();
                if let Some(file_name) = field.file_name().map(str::to_string) {
                    let file_content_type = field.content_type().map(str::to_string);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| format!("failed to read upload: {e}"))?;
                    files.push(UploadedFile {
                        field: field_name,
                        file_name,
                        content_type: file_content_type,
                        data,
                    });
                } else {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| format!("failed to read field: {e}"))?;
                    form.push((field_name, value));
                }
            }
        } else {
            body = axum::body::to_bytes(req.into_body(), max_body_bytes)
                .await
                .map_err(|e| format!("failed to read body: {e}"))?;

            if content_type.starts_with("application/x-www-form-urlencoded") {
                form = url::form_urlencoded::parse(&body)
                    .into_owned()
                    .collect();
            }
        }

        Ok(Self {
            method,
            path,
            query_string,
            query,
            form,
            headers,
            cookies,
            files,
            body,
            output: OutputBuffer::new(),
        })
    }

    /// Get a header value by name (case-insensitive). First match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name. First match wins.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a body parameter by name. First match wins.
    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a cookie value by name.
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The Content-Type header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

fn parse_urlencoded(input: &str) -> Vec<(String, String)> {
    url::form_urlencoded::parse(input.as_bytes())
        .into_owned()
        .collect()
}

fn parse_cookie_header(value: &str) -> Vec<(String, String)> {
    value
        .split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            let (name, value) = pair.split_once('=')?;
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}
