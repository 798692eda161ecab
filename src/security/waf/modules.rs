//! Detection module registry.
//!
//! A static, ordered table binding every [`ModuleName`] to the request
//! channels it inspects and the pattern that flags a threat.

use super::patterns;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Identity of a detection module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ModuleName {
    #[serde(rename = "bad-bots")]
    BadBots,
    #[serde(rename = "clrf-injection")]
    CrlfInjection,
    #[serde(rename = "directory-traversal")]
    DirectoryTraversal,
    #[serde(rename = "nosql-injection")]
    NosqlInjection,
    #[serde(rename = "prototype-pollution")]
    PrototypePollution,
    #[serde(rename = "sql-injection")]
    SqlInjection,
    #[serde(rename = "xml-injection")]
    XmlInjection,
    #[serde(rename = "xss")]
    Xss,
}

impl ModuleName {
    /// Every module, in registry order.
    pub const ALL: [Self; 8] = [
        Self::BadBots,
        Self::CrlfInjection,
        Self::DirectoryTraversal,
        Self::NosqlInjection,
        Self::PrototypePollution,
        Self::SqlInjection,
        Self::XmlInjection,
        Self::Xss,
    ];

    /// Wire name used in configuration and verdict output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadBots => "bad-bots",
            Self::CrlfInjection => "clrf-injection",
            Self::DirectoryTraversal => "directory-traversal",
            Self::NosqlInjection => "nosql-injection",
            Self::PrototypePollution => "prototype-pollution",
            Self::SqlInjection => "sql-injection",
            Self::XmlInjection => "xml-injection",
            Self::Xss => "xss",
        }
    }

    /// Parses a list of names, dropping the ones that are not modules.
    pub fn parse_lenient<I, S>(names: I) -> BTreeSet<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(|name| {
                let name = name.as_ref();
                match name.parse::<Self>() {
                    Ok(module) => Some(module),
                    Err(_) => {
                        tracing::warn!(module = %name, "Ignoring unknown WAF module");
                        None
                    }
                }
            })
            .collect()
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string names no known module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown WAF module: {0}")]
pub struct UnknownModule(pub String);

impl FromStr for ModuleName {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "bad-bots" => Ok(Self::BadBots),
            "clrf-injection" | "crlf-injection" => Ok(Self::CrlfInjection),
            "directory-traversal" => Ok(Self::DirectoryTraversal),
            "nosql-injection" => Ok(Self::NosqlInjection),
            "prototype-pollution" => Ok(Self::PrototypePollution),
            "sql-injection" => Ok(Self::SqlInjection),
            "xml-injection" => Ok(Self::XmlInjection),
            "xss" => Ok(Self::Xss),
            _ => Err(UnknownModule(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for ModuleName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Request content source a module may subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Url,
    Headers,
    Ua,
    Body,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Url => "url",
            Self::Headers => "headers",
            Self::Ua => "ua",
            Self::Body => "body",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One threat detector: a name, its channels and its pattern.
#[derive(Debug)]
pub struct DetectionModule {
    pub name: ModuleName,
    pub inputs: &'static [Channel],
    pattern: &'static Regex,
}

impl DetectionModule {
    /// Returns true when `value` carries this module's threat signature.
    #[must_use]
    pub fn is_threat(&self, value: &str) -> bool {
        self.pattern.is_match(value)
    }
}

const ALL_CHANNELS: &[Channel] = &[Channel::Url, Channel::Ua, Channel::Headers, Channel::Body];

static REGISTRY: LazyLock<Vec<DetectionModule>> = LazyLock::new(|| {
    vec![
        DetectionModule {
            name: ModuleName::BadBots,
            inputs: &[Channel::Ua],
            pattern: &patterns::BAD_BOTS,
        },
        DetectionModule {
            name: ModuleName::CrlfInjection,
            inputs: &[Channel::Url, Channel::Body],
            pattern: &patterns::CRLF_INJECTION,
        },
        DetectionModule {
            name: ModuleName::DirectoryTraversal,
            inputs: &[Channel::Url, Channel::Body],
            pattern: &patterns::DIRECTORY_TRAVERSAL,
        },
        DetectionModule {
            name: ModuleName::NosqlInjection,
            inputs: ALL_CHANNELS,
            pattern: &patterns::NOSQL_INJECTION,
        },
        DetectionModule {
            name: ModuleName::PrototypePollution,
            inputs: ALL_CHANNELS,
            pattern: &patterns::PROTOTYPE_POLLUTION,
        },
        DetectionModule {
            name: ModuleName::SqlInjection,
            inputs: ALL_CHANNELS,
            pattern: &patterns::SQL_INJECTION,
        },
        DetectionModule {
            name: ModuleName::XmlInjection,
            inputs: &[Channel::Body],
            pattern: &patterns::XML_INJECTION,
        },
        DetectionModule {
            name: ModuleName::Xss,
            inputs: ALL_CHANNELS,
            pattern: &patterns::XSS,
        },
    ]
});

/// All registered modules, in registry order.
#[must_use]
pub fn all() -> &'static [DetectionModule] {
    &REGISTRY
}

/// Looks up a single module.
#[must_use]
pub fn get(name: ModuleName) -> &'static DetectionModule {
    // REGISTRY is declared in ModuleName::ALL order.
    &REGISTRY[name as usize]
}

/// Modules not named in `ignored`, in registry order.
#[must_use]
pub fn excluding(ignored: &BTreeSet<ModuleName>) -> Vec<&'static DetectionModule> {
    all()
        .iter()
        .filter(|module| !ignored.contains(&module.name))
        .collect()
}

/// Forces compilation of every pattern.
pub fn warm_up() {
    for module in all() {
        let _ = module.is_threat("");
    }
    tracing::debug!(modules = all().len(), "WAF modules compiled");
}
