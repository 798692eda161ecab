//! Request inspection.
//!
//! Detection modules, route overrides and the engine that ties them together.

mod engine;
mod inputs;
pub mod modules;
mod patterns;
mod report;
mod routes;

pub use engine::{ChannelHit, Finding, Verdict, WafEngine};
pub use inputs::{BodyField, ExtractOptions, InspectableRequest, RequestInputs, WafRequest, carries_body};
pub use modules::{Channel, DetectionModule, ModuleName};
pub use report::{CompositeReporter, ThreatEvent, ThreatReporter, TracingReporter, WAF_BLOCK_EVENT};
pub use routes::{HTTP_METHODS, RouteOverride, RouteRule, RouteRules, RouteTable};
