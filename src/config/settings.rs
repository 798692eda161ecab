//! Configuration settings.
//!
//! Defines the main `Config` struct and environment variable loading logic.

use super::error::{Result, WafError};
use super::options::WafOptions;
use crate::security::waf::ModuleName;
use serde::Deserialize;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// What the proxy does with an unsafe verdict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WafMode {
    /// Reject unsafe requests with 400.
    #[default]
    Block,
    /// Report unsafe requests and forward them anyway.
    Monitor,
}

impl WafMode {
    fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "MONITOR" => Self::Monitor,
            _ => Self::Block,
        }
    }
}

fn get_env(key: &str) -> Result<String> {
    env::var(key).map_err(|_| WafError::Config(format!("{key} must be set in environment")))
}

fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

fn get_env_usize_or(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Application configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the proxy listens on.
    pub listen_addr: SocketAddr,
    /// Backend URL to proxy requests to.
    pub backend_url: String,
    /// Detection settings.
    pub waf: WafOptions,
    /// Optional rules file the WAF options were loaded from.
    pub rules_path: Option<PathBuf>,
    pub webhook_url: Option<String>,
    pub webhook_token: Option<String>,
    /// Log output format (`json` or `pretty`).
    pub log_format: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// `WAF_RULES_PATH`, when set, supplies the whole [`WafOptions`]
    /// document; otherwise it is assembled from `WAF_MODE`,
    /// `WAF_IGNORE_MODULES`, `WAF_IGNORE_ROUTES`, `WAF_SCAN_QUERY` and
    /// `WAF_BODY_MAX_SIZE`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `BACKEND_URL` is not set
    /// - `LISTEN_ADDR` is not a valid socket address
    /// - `WAF_IGNORE_ROUTES` or the rules file is not valid JSON
    pub fn from_env() -> Result<Arc<Self>> {
        let listen_addr = get_env_or("LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .map_err(|e| WafError::Config(format!("LISTEN_ADDR must be a valid socket address: {e}")))?;
        let backend_url = get_env("BACKEND_URL")?;
        let rules_path = get_env_opt("WAF_RULES_PATH").map(PathBuf::from);

        let waf = match &rules_path {
            Some(path) => WafOptions::from_file(path)?,
            None => Self::waf_options_from_env()?,
        };

        Ok(Arc::new(Self {
            listen_addr,
            backend_url,
            waf,
            rules_path,
            webhook_url: get_env_opt("WEBHOOK_URL"),
            webhook_token: get_env_opt("WEBHOOK_TOKEN"),
            log_format: get_env_or("LOG_FORMAT", "json"),
        }))
    }

    fn waf_options_from_env() -> Result<WafOptions> {
        let ignore_modules = ModuleName::parse_lenient(
            get_env_or("WAF_IGNORE_MODULES", "")
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        );
        let ignore_routes = match get_env_opt("WAF_IGNORE_ROUTES") {
            Some(raw) => WafOptions::routes_from_json(&raw)?,
            None => Vec::new(),
        };

        Ok(WafOptions {
            ignore_modules,
            ignore_routes,
            scan_query: get_env_bool("WAF_SCAN_QUERY"),
            body_max_size: get_env_usize_or("WAF_BODY_MAX_SIZE", WafOptions::DEFAULT_BODY_MAX_SIZE),
            mode: WafMode::from_str(&get_env_or("WAF_MODE", "block")),
        })
    }
}
