//! Request input extraction.
//!
//! Normalizes a request into the four channels the detection modules scan.

use super::modules::Channel;
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, header};
use mime::Mime;
use multipart::server::Multipart;
use serde_json::Value;
use std::io::Read;
use tracing::debug;

/// Methods whose body is parsed and scanned.
const PAYLOAD_METHODS: [Method; 4] = [Method::POST, Method::PUT, Method::DELETE, Method::PATCH];

/// Content types the body parser understands.
const BODY_CONTENT_TYPES: [&str; 4] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
];

/// Extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Keep the query string in the `url` channel.
    pub scan_query: bool,
    /// Bodies above this size are not parsed.
    pub body_max_size: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scan_query: false,
            body_max_size: 1024 * 1024,
        }
    }
}

/// One flattened body entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyField {
    /// Dotted / bracket-indexed key path (`user.tags[0]`).
    pub key: String,
    /// Stringified leaf value; empty for multipart file parts.
    pub value: String,
}

impl BodyField {
    fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Channel values extracted from a single request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInputs {
    pub url: String,
    pub headers: Vec<String>,
    pub ua: String,
    pub body: Vec<BodyField>,
}

impl RequestInputs {
    /// Extracts channel values.
    ///
    /// `target` is the request path, optionally followed by a query string.
    /// The body is only parsed when [`carries_body`] holds; any parse failure
    /// yields an empty body.
    #[must_use]
    pub fn extract(
        method: &Method,
        target: &str,
        headers: &HeaderMap,
        body: &[u8],
        options: &ExtractOptions,
    ) -> Self {
        let url = if options.scan_query {
            target.to_string()
        } else {
            strip_query(target).to_string()
        };

        let header_values = headers.values().map(header_text).collect();

        let ua = headers
            .get(header::USER_AGENT)
            .map(header_text)
            .unwrap_or_default();

        let body = match content_type(headers) {
            Some(ct) if carries_body(method, headers) => parse_body(body, ct, options.body_max_size)
                .unwrap_or_else(|e| {
                    debug!(error = %e, "Request body not scannable");
                    Vec::new()
                }),
            _ => Vec::new(),
        };

        Self {
            url,
            headers: header_values,
            ua,
            body,
        }
    }

    /// Non-empty values of a channel. The body channel yields every field's
    /// key path followed by its value.
    #[must_use]
    pub fn channel(&self, channel: Channel) -> Vec<&str> {
        let values: Vec<&str> = match channel {
            Channel::Url => vec![self.url.as_str()],
            Channel::Ua => vec![self.ua.as_str()],
            Channel::Headers => self.headers.iter().map(String::as_str).collect(),
            Channel::Body => self
                .body
                .iter()
                .flat_map(|f| [f.key.as_str(), f.value.as_str()])
                .collect(),
        };
        values.into_iter().filter(|v| !v.is_empty()).collect()
    }
}

/// Request seen by the engine. The body is only read after the route table
/// has been consulted, so disabled routes never pay for it.
#[async_trait]
pub trait InspectableRequest: Send {
    fn method(&self) -> &Method;
    /// Path plus optional `?query`.
    fn target(&self) -> &str;
    fn headers(&self) -> &HeaderMap;
    async fn read_body(&mut self) -> Bytes;
}

/// Fully buffered request.
#[derive(Debug, Clone)]
pub struct WafRequest {
    method: Method,
    target: String,
    headers: HeaderMap,
    body: Bytes,
    body_reads: usize,
}

impl WafRequest {
    #[must_use]
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            body_reads: 0,
        }
    }

    /// Appends a header; invalid names or values are skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// How many times the engine asked for the body.
    #[must_use]
    pub const fn body_reads(&self) -> usize {
        self.body_reads
    }
}

impl From<http::Request<Bytes>> for WafRequest {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let target = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), |pq| pq.as_str().to_string());
        Self::new(parts.method, target)
            .with_headers(parts.headers)
            .body(body)
    }
}

#[async_trait]
impl InspectableRequest for WafRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    async fn read_body(&mut self) -> Bytes {
        self.body_reads += 1;
        self.body.clone()
    }
}

/// Path component of a request target.
#[must_use]
pub fn strip_query(target: &str) -> &str {
    target.split_once('?').map_or(target, |(path, _)| path)
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

/// Whether the request body should be read and parsed.
#[must_use]
pub fn carries_body(method: &Method, headers: &HeaderMap) -> bool {
    PAYLOAD_METHODS.contains(method)
        && content_type(headers).is_some_and(|ct| {
            let ct = ct.to_ascii_lowercase();
            BODY_CONTENT_TYPES.iter().any(|known| ct.contains(known))
        })
}

#[derive(Debug, thiserror::Error)]
enum BodyParseError {
    #[error("failed to parse content type: {0}")]
    ContentType(#[from] mime::FromStrError),
    #[error("cannot parse multipart body: missing boundary parameter")]
    MissingBoundary,
    #[error("unsupported content type: {0}")]
    Unsupported(Mime),
    #[error("body of {size} bytes exceeds scan limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
    #[error("failed to read body: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid form body: {0}")]
    Form(#[from] serde_html_form::de::Error),
}

/// Header bytes as text. Values outside visible ASCII are kept, with
/// invalid UTF-8 replaced.
fn header_text(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}

fn parse_body(
    body: &[u8],
    content_type: &str,
    limit: usize,
) -> Result<Vec<BodyField>, BodyParseError> {
    if body.len() > limit {
        return Err(BodyParseError::TooLarge {
            size: body.len(),
            limit,
        });
    }
    if body.is_empty() {
        return Ok(Vec::new());
    }

    let mime_type: Mime = content_type.parse()?;
    match (mime_type.type_(), mime_type.subtype()) {
        (mime::APPLICATION, mime::JSON) => {
            // serde_json stops at 128 levels of nesting; deeper documents
            // surface as a Json error and leave the body channel empty.
            let value: Value = serde_json::from_slice(body).inspect_err(|e| {
                if e.to_string().contains("recursion limit") {
                    debug!(error = %e, "JSON body nested beyond parser depth limit, body not scanned");
                }
            })?;
            let mut fields = Vec::new();
            flatten_json(&value, String::new(), &mut fields);
            Ok(fields)
        }
        (mime::APPLICATION, mime::WWW_FORM_URLENCODED) => {
            let pairs: Vec<(String, String)> = serde_html_form::from_bytes(body)?;
            Ok(pairs
                .into_iter()
                .map(|(key, value)| BodyField::new(key, value))
                .collect())
        }
        (mime::MULTIPART, mime::FORM_DATA) => {
            let boundary = mime_type
                .get_param(mime::BOUNDARY)
                .ok_or(BodyParseError::MissingBoundary)?;
            parse_multipart(body, boundary.as_str())
        }
        (mime::TEXT, mime::PLAIN) => Ok(vec![BodyField::new(
            "",
            String::from_utf8_lossy(body),
        )]),
        _ => Err(BodyParseError::Unsupported(mime_type)),
    }
}

fn parse_multipart(body: &[u8], boundary: &str) -> Result<Vec<BodyField>, BodyParseError> {
    let mut multipart = Multipart::with_body(body, boundary);
    let mut fields = Vec::new();

    while let Some(mut entry) = multipart.read_entry()? {
        let name = entry.headers.name.to_string();
        // File contents are never scanned.
        if entry.headers.filename.is_some() {
            fields.push(BodyField::new(name, ""));
            continue;
        }

        let mut data = Vec::new();
        entry.data.read_to_end(&mut data)?;
        fields.push(BodyField::new(name, String::from_utf8_lossy(&data)));
    }

    Ok(fields)
}

fn flatten_json(value: &Value, key: String, out: &mut Vec<BodyField>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push(BodyField::new(key, b.to_string())),
        Value::Number(n) => out.push(BodyField::new(key, n.to_string())),
        Value::String(s) => out.push(BodyField::new(key, s.as_str())),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                flatten_json(item, format!("{key}[{idx}]"), out);
            }
        }
        Value::Object(map) => {
            for (name, item) in map {
                let child = if key.is_empty() {
                    name.clone()
                } else {
                    format!("{key}.{name}")
                };
                flatten_json(item, child, out);
            }
        }
    }
}
