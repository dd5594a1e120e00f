// Copyright 2024 Wladimir Palant
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Structures required to deserialize the `api-tools-versioning` configuration section.

use regex::{Captures, Regex};
use serde::de::{MapAccess, Unexpected, Visitor};
use serde::{Deserialize, Deserializer};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fmt::Formatter;

use crate::{Error, OneOrMany};

/// Key of the versioning section within the merged application configuration
pub const CONFIG_KEY: &str = "api-tools-versioning";

/// Version number used for routes without an explicitly configured default
pub const FALLBACK_VERSION: u32 = 1;

/// A media type rule: a regular expression with named capture groups
///
/// The regular expression always has to match the entire media type, e.g. the rule `foo=bar`
/// matches `foo=bar` but not `xfoo=bar`. Values of named groups like `laminas_ver_version` are
/// what ends up in the route match.
///
/// Patterns may be enclosed in delimiters with trailing modifiers, e.g. `#foo=bar#` or
/// `#application/json#i`. The delimiters are stripped and `i`, `m`, `s`, `x` and `U` modifiers
/// become inline flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "String")]
pub struct MediaTypeRule {
    pattern: String,
    regex: Regex,
}

impl MediaTypeRule {
    /// The pattern as originally supplied
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Matches the rule against a media type, returning the capture groups on success
    pub fn captures<'h>(&self, media_type: &'h str) -> Option<Captures<'h>> {
        self.regex.captures(media_type)
    }

    /// Names of the capture groups, `None` for unnamed groups
    pub(crate) fn capture_names(&self) -> impl Iterator<Item = Option<&str>> {
        self.regex.capture_names()
    }
}

impl PartialEq for MediaTypeRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for MediaTypeRule {}

/// Splits a delimited pattern like `#^application/json$#i` into the expression and its
/// modifiers. Returns `None` if the pattern isn’t enclosed in delimiters.
///
/// Regular expression metacharacters are never considered delimiters, so that undelimited
/// patterns like `(text)/plain` are taken verbatim.
fn split_delimiters(value: &str) -> Option<(&str, &str)> {
    let delimiter = value.chars().next()?;
    if delimiter.is_alphanumeric()
        || delimiter.is_whitespace()
        || r"\.+*?()|[]{}^$".contains(delimiter)
    {
        return None;
    }

    let start = delimiter.len_utf8();
    let end = value[start..].rfind(delimiter)? + start;
    let modifiers = &value[end + delimiter.len_utf8()..];
    if modifiers.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((&value[start..end], modifiers))
    } else {
        None
    }
}

/// Translates pattern modifiers into inline regular expression flags
fn inline_flags(modifiers: &str) -> Option<String> {
    let mut flags = String::new();
    for modifier in modifiers.chars() {
        match modifier {
            'i' | 'm' | 's' | 'x' | 'U' => {
                if !flags.contains(modifier) {
                    flags.push(modifier);
                }
            }
            // Unicode matching and `$` only matching at the end are always on
            'u' | 'D' => {}
            _ => return None,
        }
    }
    Some(flags)
}

impl TryFrom<&str> for MediaTypeRule {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (expression, flags) = match split_delimiters(value) {
            Some((expression, modifiers)) => (
                expression,
                inline_flags(modifiers).ok_or_else(|| Error::unsupported_modifiers(value))?,
            ),
            None => (value, String::new()),
        };

        let regex = Regex::new(&format!("^(?{flags}:{expression})$"))
            .map_err(|err| Error::invalid_rule(value, err))?;
        Ok(Self {
            pattern: value.to_owned(),
            regex,
        })
    }
}

impl TryFrom<String> for MediaTypeRule {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().try_into()
    }
}

/// Default API version of the routes, either global or per route
///
/// In the configuration file this is either a number applying to all routes or a map from route
/// names to numbers. Routes missing from the map get version 1, as does everything if the setting
/// is absent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DefaultVersion {
    global: Option<u32>,
    per_route: HashMap<String, u32>,
}

impl DefaultVersion {
    /// Creates a default version applying to all routes
    pub fn global(version: u32) -> Self {
        Self {
            global: Some(version),
            per_route: HashMap::new(),
        }
    }

    /// Creates a list of route-specific default versions
    pub fn per_route<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            global: None,
            per_route: versions
                .into_iter()
                .map(|(route, version)| (route.into(), version))
                .collect(),
        }
    }

    /// Resolves the default version of the given route
    pub fn for_route(&self, route: &str) -> u32 {
        self.per_route
            .get(route)
            .copied()
            .or(self.global)
            .unwrap_or(FALLBACK_VERSION)
    }
}

impl<'de> Deserialize<'de> for DefaultVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DefaultVersionVisitor;

        impl<'de> Visitor<'de> for DefaultVersionVisitor {
            type Value = DefaultVersion;

            fn expecting(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("a version number or a map of route names to version numbers")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let version = u32::try_from(v)
                    .map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))?;
                Ok(DefaultVersion::global(version))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                let version = u32::try_from(v)
                    .map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))?;
                Ok(DefaultVersion::global(version))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(DefaultVersion::default())
            }

            fn visit_none<E>(self) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(DefaultVersion::default())
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut per_route = HashMap::new();
                while let Some((route, version)) = map.next_entry::<String, u32>()? {
                    per_route.insert(route, version);
                }
                Ok(DefaultVersion {
                    global: None,
                    per_route,
                })
            }
        }

        deserializer.deserialize_any(DefaultVersionVisitor)
    }
}

/// Configuration settings of the versioning module
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VersioningConf {
    /// Additional media type rules to recognize in `Content-Type` and `Accept` headers. These
    /// take precedence over the built-in rule, rules listed later take precedence over the
    /// ones listed earlier.
    #[serde(rename = "content-type")]
    pub content_type: OneOrMany<MediaTypeRule>,

    /// Names of the routes that should get an optional `[/v:version]` segment
    pub uri: OneOrMany<String>,

    /// Default version of the routes listed under `uri`
    pub default_version: DefaultVersion,
}

impl VersioningConf {
    /// Extracts the versioning section from the merged application configuration. A missing
    /// section results in the default configuration.
    pub fn from_config(config: &Value) -> Result<Self, Error> {
        match config.get(CONFIG_KEY) {
            Some(section) if !section.is_null() => Ok(serde_yaml::from_value(section.clone())?),
            _ => Ok(Self::default()),
        }
    }
}
