//! Proxy service logic.
//!
//! Runs the WAF engine in front of the backend. The url, header and
//! user-agent channels are judged in `request_filter`; requests with a
//! scannable body are then held back in `request_body_filter` until the
//! whole body has been inspected.

use crate::config::{Config, WafMode};
use crate::core::proxy::response::serve_json;
use crate::security::waf::{
    RequestInputs, RouteOverride, Verdict, WafEngine, WafRequest, carries_body,
};
use async_trait::async_trait;
use bytes::Bytes;
use pingora::Result;
use pingora::http::{RequestHeader, ResponseHeader};
use pingora::proxy::{ProxyHttp, Session};
use pingora::upstreams::peer::HttpPeer;
use std::sync::Arc;
use tracing::{debug, warn};

/// Context for a single request.
#[derive(Debug, Default)]
pub struct RequestCtx {
    /// Body is buffered and scanned before it is forwarded.
    pub inspect_body: bool,
    pub body_buffer: Vec<u8>,
    /// Unsafe verdict seen while in monitor mode.
    pub flagged: bool,
}

/// Main proxy service implementing `ProxyHttp`.
pub struct WafProxy {
    config: Arc<Config>,
    waf_engine: Arc<WafEngine>,
}

impl WafProxy {
    /// Creates a new `WafProxy` service.
    #[must_use]
    pub const fn new(config: Arc<Config>, waf_engine: Arc<WafEngine>) -> Self {
        Self { config, waf_engine }
    }

    fn upstream_addr(&self) -> &str {
        let url = self.config.backend_url.as_str();
        let addr = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .unwrap_or(url);
        addr.trim_end_matches('/')
    }

    fn request_target(req: &RequestHeader) -> String {
        req.uri
            .path_and_query()
            .map_or_else(|| req.uri.path().to_string(), |pq| pq.as_str().to_string())
    }

    fn declared_length(req: &RequestHeader) -> Option<usize> {
        req.headers
            .get(http::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// Whether an unsafe verdict stops the request.
    fn should_block(&self, verdict: &Verdict, ctx: &mut RequestCtx) -> bool {
        if verdict.success {
            return false;
        }
        if self.config.waf.mode == WafMode::Monitor {
            ctx.flagged = true;
            return false;
        }
        true
    }

    async fn reject(session: &mut Session, status: u16, message: &str) -> Result<bool> {
        let body = serde_json::json!({ "statusCode": status, "message": message });
        serve_json(session, status, &body).await
    }
}

#[async_trait]
impl ProxyHttp for WafProxy {
    type CTX = RequestCtx;

    fn new_ctx(&self) -> Self::CTX {
        RequestCtx::default()
    }

    async fn request_filter(&self, session: &mut Session, ctx: &mut Self::CTX) -> Result<bool> {
        let req = session.req_header();
        let method = req.method.clone();
        let target = Self::request_target(req);

        if !carries_body(&method, &req.headers) {
            let mut request =
                WafRequest::new(method, target).with_headers(req.headers.clone());
            let verdict = self.waf_engine.check(&mut request).await;
            if self.should_block(&verdict, ctx) {
                return Self::reject(session, 400, "Bad Request").await;
            }
            return Ok(false);
        }

        if self.waf_engine.route_override(&method, &target) == Some(RouteOverride::Disabled) {
            debug!(http_method = %method, http_path = %req.uri.path(), "Body inspection skipped for route");
            return Ok(false);
        }

        // The request line and headers go upstream before the first body
        // chunk is filtered, so those channels are judged here.
        let inputs = RequestInputs::extract(
            &method,
            &target,
            &req.headers,
            &[],
            self.waf_engine.extract_options(),
        );
        let verdict = self.waf_engine.check_inputs(&method, &target, &inputs);
        if self.should_block(&verdict, ctx) {
            return Self::reject(session, 400, "Bad Request").await;
        }
        if ctx.flagged {
            return Ok(false);
        }

        let limit = self.waf_engine.extract_options().body_max_size;
        if let Some(length) = Self::declared_length(req)
            && length > limit
        {
            warn!(
                content_length = length,
                max_size = limit,
                action = "BLOCK",
                "Request body exceeds scan limit"
            );
            return Self::reject(session, 413, "Payload Too Large").await;
        }

        ctx.inspect_body = true;
        Ok(false)
    }

    async fn request_body_filter(
        &self,
        session: &mut Session,
        body: &mut Option<Bytes>,
        end_of_stream: bool,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        if !ctx.inspect_body {
            return Ok(());
        }

        if let Some(chunk) = body.take() {
            let limit = self.waf_engine.extract_options().body_max_size;
            if ctx.body_buffer.len() + chunk.len() > limit {
                warn!(max_size = limit, action = "BLOCK", "Request body exceeds scan limit");
                return Err(pingora::Error::explain(
                    pingora::ErrorType::HTTPStatus(413),
                    "Request body too large for inspection",
                ));
            }
            ctx.body_buffer.extend_from_slice(&chunk);
        }

        if !end_of_stream {
            return Ok(());
        }

        let buffered = Bytes::from(std::mem::take(&mut ctx.body_buffer));
        let req = session.req_header();
        let mut request = WafRequest::new(req.method.clone(), Self::request_target(req))
            .with_headers(req.headers.clone())
            .body(buffered.clone());
        let verdict = self.waf_engine.check(&mut request).await;

        if self.should_block(&verdict, ctx) {
            return Err(pingora::Error::explain(
                pingora::ErrorType::HTTPStatus(400),
                "Blocked by WAF body scan",
            ));
        }

        if !buffered.is_empty() {
            *body = Some(buffered);
        }
        Ok(())
    }

    async fn upstream_peer(
        &self,
        _session: &mut Session,
        _ctx: &mut Self::CTX,
    ) -> Result<Box<HttpPeer>> {
        let peer = Box::new(HttpPeer::new(self.upstream_addr(), false, String::new()));
        Ok(peer)
    }

    async fn response_filter(
        &self,
        _session: &mut Session,
        upstream_response: &mut ResponseHeader,
        ctx: &mut Self::CTX,
    ) -> Result<()> {
        if ctx.flagged {
            upstream_response.insert_header("X-Waf-Flagged", "1")?;
        }
        Ok(())
    }

    async fn logging(
        &self,
        session: &mut Session,
        _e: Option<&pingora::Error>,
        ctx: &mut Self::CTX,
    ) {
        let status = session.response_written().map_or(0, |r| r.status.as_u16());
        let path = session.req_header().uri.path();
        debug!(status = status, http_path = %path, flagged = ctx.flagged, "Request completed");

        if status >= 400 {
            warn!(status = status, http_path = %path, "Request error");
        }
    }
}
