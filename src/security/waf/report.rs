//! Threat reporting.
//!
//! The engine hands every unsafe verdict to an injected [`ThreatReporter`].

use super::engine::Verdict;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// Event name attached to blocked requests.
pub const WAF_BLOCK_EVENT: &str = "waf_block";

/// Context of an unsafe verdict.
#[derive(Debug, Clone, Serialize)]
pub struct ThreatEvent<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub ua: &'a str,
    pub verdict: &'a Verdict,
}

impl ThreatEvent<'_> {
    /// Comma-separated names of the modules that fired.
    #[must_use]
    pub fn modules(&self) -> String {
        self.verdict
            .results
            .iter()
            .map(|f| f.module.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Sink for threat events.
pub trait ThreatReporter: Send + Sync {
    fn warn(&self, event: &str, metadata: &ThreatEvent<'_>);
}

impl<T: ThreatReporter + ?Sized> ThreatReporter for Arc<T> {
    fn warn(&self, event: &str, metadata: &ThreatEvent<'_>) {
        (**self).warn(event, metadata);
    }
}

/// Reports threats as structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ThreatReporter for TracingReporter {
    fn warn(&self, event: &str, metadata: &ThreatEvent<'_>) {
        warn!(
            event = %event,
            method = %metadata.method,
            path = %metadata.path,
            ua = %metadata.ua,
            modules = %metadata.modules(),
            action = "BLOCK",
            "Threat detected"
        );
    }
}

/// Fans one event out to several reporters.
#[derive(Default)]
pub struct CompositeReporter {
    reporters: Vec<Box<dyn ThreatReporter>>,
}

impl CompositeReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, reporter: impl ThreatReporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }
}

impl ThreatReporter for CompositeReporter {
    fn warn(&self, event: &str, metadata: &ThreatEvent<'_>) {
        for reporter in &self.reporters {
            reporter.warn(event, metadata);
        }
    }
}
