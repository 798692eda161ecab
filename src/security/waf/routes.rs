//! Route override table.
//!
//! Maps `(method, path)` to a [`RouteOverride`] through a segment tree.
//! Path syntax: static segments, `:name` or `*` for exactly one segment and
//! `**` or `**:name` for zero or more trailing segments. At every level a
//! static segment is preferred over a parameter, and a parameter over a
//! catch-all; when the preferred branch holds no rule for the method the
//! lookup falls back to the next one.

use super::modules::ModuleName;
use crate::config::{Result, WafError};
use http::Method;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Methods a route rule applies to when it names none.
pub const HTTP_METHODS: [Method; 9] = [
    Method::GET,
    Method::HEAD,
    Method::PATCH,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::CONNECT,
    Method::OPTIONS,
    Method::TRACE,
];

/// Resolved per-route behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOverride {
    /// Skip inspection entirely.
    Disabled,
    /// Run every module except these.
    IgnoreModules(BTreeSet<ModuleName>),
}

/// Route rule as written in configuration: `false`, `true` or an object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RouteRule {
    Toggle(bool),
    Rules(RouteRules),
}

/// Object form of a route rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRules {
    #[serde(default, deserialize_with = "one_or_many")]
    pub ignore_modules: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub method: Vec<String>,
}

fn one_or_many<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

impl RouteRule {
    /// Skip all inspection on the route.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::Toggle(false)
    }

    /// Skip the given modules on the route, for every method.
    #[must_use]
    pub fn ignore<I: IntoIterator<Item = ModuleName>>(modules: I) -> Self {
        Self::Rules(RouteRules {
            ignore_modules: modules.into_iter().map(|m| m.as_str().to_string()).collect(),
            method: Vec::new(),
        })
    }

    /// Restricts the rule to the given methods.
    #[must_use]
    pub fn with_methods<I: IntoIterator<Item = Method>>(self, methods: I) -> Self {
        let method = methods.into_iter().map(|m| m.as_str().to_string()).collect();
        match self {
            Self::Rules(rules) => Self::Rules(RouteRules { method, ..rules }),
            Self::Toggle(false) => Self::Toggle(false),
            Self::Toggle(true) => Self::Rules(RouteRules {
                ignore_modules: Vec::new(),
                method,
            }),
        }
    }

    fn methods(&self, path: &str) -> Result<Vec<Method>> {
        let names = match self {
            Self::Rules(rules) if !rules.method.is_empty() => &rules.method,
            _ => return Ok(HTTP_METHODS.to_vec()),
        };

        names
            .iter()
            .map(|name| {
                let upper = name.trim().to_ascii_uppercase();
                HTTP_METHODS
                    .iter()
                    .find(|m| m.as_str() == upper)
                    .cloned()
                    .ok_or_else(|| WafError::InvalidRoute {
                        path: path.to_string(),
                        reason: format!("unsupported HTTP method: {name}"),
                    })
            })
            .collect()
    }

    fn to_override(&self) -> RouteOverride {
        match self {
            Self::Toggle(false) => RouteOverride::Disabled,
            Self::Toggle(true) => RouteOverride::IgnoreModules(BTreeSet::new()),
            Self::Rules(rules) => {
                RouteOverride::IgnoreModules(ModuleName::parse_lenient(&rules.ignore_modules))
            }
        }
    }
}

#[derive(Debug, Default)]
struct Node {
    statics: HashMap<String, Node>,
    param: Option<Box<Node>>,
    catch_all: Option<Box<Node>>,
    rules: HashMap<Method, RouteOverride>,
}

enum Segment<'a> {
    Static(&'a str),
    Param,
    CatchAll,
}

fn parse_segment(segment: &str) -> Segment<'_> {
    if segment == "**" || segment.starts_with("**:") {
        Segment::CatchAll
    } else if segment == "*" || (segment.starts_with(':') && segment.len() > 1) {
        Segment::Param
    } else {
        Segment::Static(segment)
    }
}

fn split_path(path: &str) -> Vec<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Read-only route rule table.
#[derive(Debug, Default)]
pub struct RouteTable {
    root: Node,
    routes: usize,
}

impl RouteTable {
    /// Creates an empty table: every lookup misses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from `(path, rule)` pairs in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a rule names an unsupported method or a path puts
    /// a catch-all before its last segment.
    pub fn from_rules<'a, I>(rules: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a RouteRule)>,
    {
        let mut table = Self::new();
        for (path, rule) in rules {
            table.insert(path, rule)?;
        }
        debug!(routes = table.routes, "Route table built");
        Ok(table)
    }

    /// Registers one rule. An existing (method, path) entry is kept.
    ///
    /// # Errors
    ///
    /// Same conditions as [`RouteTable::from_rules`].
    pub fn insert(&mut self, path: &str, rule: &RouteRule) -> Result<()> {
        let methods = rule.methods(path)?;
        let payload = rule.to_override();
        let node = self.node_for(path)?;

        for method in methods {
            node.rules.entry(method).or_insert_with(|| payload.clone());
        }
        self.routes += 1;
        Ok(())
    }

    fn node_for(&mut self, path: &str) -> Result<&mut Node> {
        let segments = split_path(path);
        let last = segments.len().saturating_sub(1);
        let mut node = &mut self.root;

        for (idx, segment) in segments.into_iter().enumerate() {
            node = match parse_segment(segment) {
                Segment::Static(name) => node.statics.entry(name.to_string()).or_default(),
                Segment::Param => &mut **node.param.get_or_insert_with(Box::default),
                Segment::CatchAll if idx == last => {
                    &mut **node.catch_all.get_or_insert_with(Box::default)
                }
                Segment::CatchAll => {
                    return Err(WafError::InvalidRoute {
                        path: path.to_string(),
                        reason: "catch-all must be the last segment".to_string(),
                    });
                }
            };
        }

        Ok(node)
    }

    /// Number of registered route entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.routes
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.routes == 0
    }

    /// Finds the override for a request, ignoring any query string.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Option<&RouteOverride> {
        let segments = split_path(path);
        Self::lookup(&self.root, &segments, method)
    }

    fn lookup<'t>(node: &'t Node, segments: &[&str], method: &Method) -> Option<&'t RouteOverride> {
        let Some((segment, rest)) = segments.split_first() else {
            return node.rules.get(method).or_else(|| {
                node.catch_all
                    .as_ref()
                    .and_then(|tail| tail.rules.get(method))
            });
        };

        if let Some(child) = node.statics.get(*segment)
            && let Some(found) = Self::lookup(child, rest, method)
        {
            return Some(found);
        }

        if let Some(child) = &node.param
            && let Some(found) = Self::lookup(child, rest, method)
        {
            return Some(found);
        }

        node.catch_all
            .as_ref()
            .and_then(|tail| tail.rules.get(method))
    }
}
