//! WAF inspection engine.
//!
//! Resolves route overrides, runs every enabled detection module over its
//! channels and aggregates the findings into a [`Verdict`].

use super::inputs::{ExtractOptions, InspectableRequest, RequestInputs, carries_body, strip_query};
use super::modules::{self, Channel, DetectionModule, ModuleName};
use super::report::{ThreatEvent, ThreatReporter, WAF_BLOCK_EVENT};
use super::routes::{RouteOverride, RouteRule, RouteTable};
use crate::config::{Result, WafOptions};
use bytes::Bytes;
use http::Method;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Offending values found in one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelHit {
    pub input: Channel,
    pub affected: Vec<String>,
}

/// Evidence that one module matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub module: ModuleName,
    pub data: Vec<ChannelHit>,
}

/// Outcome of a request inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the request passed every enabled module.
    pub success: bool,
    pub results: Vec<Finding>,
}

impl Verdict {
    /// Creates a safe verdict (allowed).
    #[must_use]
    pub const fn safe() -> Self {
        Self {
            success: true,
            results: Vec::new(),
        }
    }

    /// Wraps findings; the verdict is safe iff there are none.
    #[must_use]
    pub fn from_findings(results: Vec<Finding>) -> Self {
        Self {
            success: results.is_empty(),
            results,
        }
    }

    /// Findings of a single module, if it fired.
    #[must_use]
    pub fn finding(&self, module: ModuleName) -> Option<&Finding> {
        self.results.iter().find(|f| f.module == module)
    }
}

pub struct WafEngine {
    ignored: BTreeSet<ModuleName>,
    routes: RwLock<Arc<RouteTable>>,
    extract: ExtractOptions,
    reporter: Arc<dyn ThreatReporter>,
}

impl WafEngine {
    /// Creates a new `WafEngine`.
    ///
    /// # Errors
    ///
    /// Returns an error if a route rule cannot be registered.
    pub fn new(options: &WafOptions, reporter: Arc<dyn ThreatReporter>) -> Result<Self> {
        modules::warm_up();
        let routes = Self::build_routes(&options.ignore_routes)?;
        debug!(
            ignored = ?options.ignore_modules,
            routes = routes.len(),
            "WAF engine initialized"
        );

        Ok(Self {
            ignored: options.ignore_modules.clone(),
            routes: RwLock::new(Arc::new(routes)),
            extract: options.extract_options(),
            reporter,
        })
    }

    fn build_routes(rules: &[(String, RouteRule)]) -> Result<RouteTable> {
        RouteTable::from_rules(rules.iter().map(|(path, rule)| (path.as_str(), rule)))
    }

    /// Replaces the route table. Checks already running keep the old one.
    pub fn reload_routes(&self, table: RouteTable) {
        let routes = table.len();
        *self.routes.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
        debug!(routes, "WAF route table reloaded");
    }

    /// Rebuilds the route table from configuration rules.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule cannot be registered; the current table
    /// stays in place.
    pub fn reload_rules(&self, rules: &[(String, RouteRule)]) -> Result<()> {
        self.reload_routes(Self::build_routes(rules)?);
        Ok(())
    }

    fn routes(&self) -> Arc<RouteTable> {
        Arc::clone(&self.routes.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Route override for a request target, if any rule matches.
    #[must_use]
    pub fn route_override(&self, method: &Method, target: &str) -> Option<RouteOverride> {
        self.routes().resolve(method, target).cloned()
    }

    #[must_use]
    pub const fn extract_options(&self) -> &ExtractOptions {
        &self.extract
    }

    /// Inspects a request. The body is read only when the route is not
    /// disabled and the request carries a parseable body.
    pub async fn check<R: InspectableRequest + ?Sized>(&self, request: &mut R) -> Verdict {
        let method = request.method().clone();
        let target = request.target().to_string();

        let Some(ignored) = self.route_ignores(&method, &target) else {
            return Verdict::safe();
        };

        let body = if carries_body(&method, request.headers()) {
            request.read_body().await
        } else {
            Bytes::new()
        };
        let inputs =
            RequestInputs::extract(&method, &target, request.headers(), &body, &self.extract);

        self.evaluate(&method, &target, &ignored, &inputs)
    }

    /// Inspects pre-extracted inputs.
    #[must_use]
    pub fn check_inputs(&self, method: &Method, target: &str, inputs: &RequestInputs) -> Verdict {
        match self.route_ignores(method, target) {
            Some(ignored) => self.evaluate(method, target, &ignored, inputs),
            None => Verdict::safe(),
        }
    }

    /// Modules the route turns off, or `None` when the route is disabled.
    fn route_ignores(&self, method: &Method, target: &str) -> Option<BTreeSet<ModuleName>> {
        match self.routes().resolve(method, target) {
            Some(RouteOverride::Disabled) => {
                debug!(method = %method, path = %strip_query(target), "WAF disabled for route");
                None
            }
            Some(RouteOverride::IgnoreModules(ignored)) => Some(ignored.clone()),
            None => Some(BTreeSet::new()),
        }
    }

    fn evaluate(
        &self,
        method: &Method,
        target: &str,
        route_ignored: &BTreeSet<ModuleName>,
        inputs: &RequestInputs,
    ) -> Verdict {
        let ignored: BTreeSet<ModuleName> = self.ignored.union(route_ignored).copied().collect();
        let verdict = Self::scan(&modules::excluding(&ignored), inputs);

        if !verdict.success {
            let event = ThreatEvent {
                method: method.as_str(),
                path: strip_query(target),
                ua: &inputs.ua,
                verdict: &verdict,
            };
            warn!(
                method = %event.method,
                path = %event.path,
                modules = %event.modules(),
                "Unsafe request"
            );
            self.reporter.warn(WAF_BLOCK_EVENT, &event);
        }

        verdict
    }

    /// Runs `enabled` over the inputs.
    #[must_use]
    pub fn scan(enabled: &[&DetectionModule], inputs: &RequestInputs) -> Verdict {
        let results = enabled
            .iter()
            .filter_map(|module| {
                let data: Vec<ChannelHit> = module
                    .inputs
                    .iter()
                    .filter_map(|&channel| {
                        let affected: Vec<String> = inputs
                            .channel(channel)
                            .into_iter()
                            .filter(|value| module.is_threat(value))
                            .map(str::to_string)
                            .collect();
                        (!affected.is_empty()).then_some(ChannelHit {
                            input: channel,
                            affected,
                        })
                    })
                    .collect();
                (!data.is_empty()).then_some(Finding {
                    module: module.name,
                    data,
                })
            })
            .collect();

        Verdict::from_findings(results)
    }
}
