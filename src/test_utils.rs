//! Test utilities and shared configuration.
//!
//! This module provides common helpers for unit and integration tests,
//! reducing duplication across the codebase.

use crate::config::{Config, WafOptions};
use crate::security::waf::{ModuleName, ThreatEvent, ThreatReporter};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};

/// Creates a standard configuration for testing purposes.
///
/// This configuration has:
/// - Listen address 0.0.0.0:8080, backend on 127.0.0.1:8080
/// - Block mode with every module enabled
/// - No webhook
#[must_use]
pub fn create_test_config() -> Arc<Config> {
    Arc::new(Config {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
        backend_url: "http://127.0.0.1:8080".to_string(),
        waf: create_test_options(),
        rules_path: None,
        webhook_url: None,
        webhook_token: None,
        log_format: "pretty".to_string(),
    })
}

/// Default WAF options: no ignores, query string not scanned.
#[must_use]
pub fn create_test_options() -> WafOptions {
    WafOptions::default()
}

/// One event captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub event: String,
    pub method: String,
    pub path: String,
    pub modules: Vec<ModuleName>,
}

/// Reporter that keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingReporter {
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ThreatReporter for RecordingReporter {
    fn warn(&self, event: &str, metadata: &ThreatEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedEvent {
                event: event.to_string(),
                method: metadata.method.to_string(),
                path: metadata.path.to_string(),
                modules: metadata.verdict.results.iter().map(|f| f.module).collect(),
            });
    }
}
