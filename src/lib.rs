//! Library definitions.
//!
//! Exports the WAF engine, its configuration and the proxy service that
//! hosts it.

pub mod config;
pub mod core;
pub mod features;
pub mod security;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;
pub use config::{Config, Result, WafError, WafMode, WafOptions};
pub use core::proxy::WafProxy;
pub use features::webhook::{EventType, WebhookPayload, WebhookReporter};
pub use security::waf::{
    CompositeReporter, ModuleName, RouteRule, ThreatReporter, TracingReporter, Verdict, WafEngine,
    WafRequest,
};
