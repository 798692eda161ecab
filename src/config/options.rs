//! WAF construction options.
//!
//! The JSON shape mirrors the host configuration:
//!
//! ```json
//! {
//!   "ignoreModules": ["xss"],
//!   "ignoreRoutes": {
//!     "/webhooks/**": false,
//!     "/cms/:page": { "ignoreModules": "xss", "method": ["POST", "PUT"] }
//!   }
//! }
//! ```
//!
//! Route entries keep their document order; the first registration of a
//! (method, path) pair wins.

use super::error::Result;
use super::settings::WafMode;
use crate::security::waf::{ExtractOptions, ModuleName, RouteRule};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WafOptions {
    /// Modules disabled everywhere. Unknown names are dropped.
    #[serde(deserialize_with = "lenient_modules")]
    pub ignore_modules: BTreeSet<ModuleName>,
    /// Per-route overrides in registration order.
    #[serde(deserialize_with = "ordered_routes")]
    pub ignore_routes: Vec<(String, RouteRule)>,
    /// Scan the query string as part of the `url` channel.
    pub scan_query: bool,
    /// Largest body, in bytes, that is parsed and scanned.
    pub body_max_size: usize,
    pub mode: WafMode,
}

impl Default for WafOptions {
    fn default() -> Self {
        Self {
            ignore_modules: BTreeSet::new(),
            ignore_routes: Vec::new(),
            scan_query: false,
            body_max_size: Self::DEFAULT_BODY_MAX_SIZE,
            mode: WafMode::Block,
        }
    }
}

impl WafOptions {
    pub const DEFAULT_BODY_MAX_SIZE: usize = 1024 * 1024;

    /// Parses a full options document.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not a valid options document.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads a full options document from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parses just the `ignoreRoutes` object.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is not an object of route rules.
    pub fn routes_from_json(json: &str) -> Result<Vec<(String, RouteRule)>> {
        let mut de = serde_json::Deserializer::from_str(json);
        let routes = ordered_routes(&mut de)?;
        de.end()?;
        Ok(routes)
    }

    #[must_use]
    pub fn ignore_module(mut self, module: ModuleName) -> Self {
        self.ignore_modules.insert(module);
        self
    }

    #[must_use]
    pub fn ignore_route(mut self, path: impl Into<String>, rule: RouteRule) -> Self {
        self.ignore_routes.push((path.into(), rule));
        self
    }

    #[must_use]
    pub const fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            scan_query: self.scan_query,
            body_max_size: self.body_max_size,
        }
    }
}

fn lenient_modules<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<BTreeSet<ModuleName>, D::Error> {
    let names = Vec::<String>::deserialize(deserializer)?;
    Ok(ModuleName::parse_lenient(names))
}

fn ordered_routes<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<(String, RouteRule)>, D::Error> {
    let map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
    map.into_iter()
        .map(|(path, rule)| {
            serde_json::from_value(rule)
                .map(|rule| (path.clone(), rule))
                .map_err(|e| D::Error::custom(format!("route '{path}': {e}")))
        })
        .collect()
}
