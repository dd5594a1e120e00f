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

//! Error type of the versioning module

use std::fmt::Display;
use std::path::PathBuf;

/// Errors produced while setting up the versioning listeners
///
/// Request processing never produces errors, only configuration and rule registration do.
#[derive(Debug)]
pub enum Error {
    /// A media type rule could not be compiled into a regular expression
    InvalidArgument {
        /// The pattern as supplied by the caller
        rule: String,
        /// The regular expression compiler’s complaint, `None` for unsupported pattern modifiers
        source: Option<Box<regex::Error>>,
    },
    /// A configuration file could not be opened
    ConfigFile {
        /// Path of the configuration file
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },
    /// Configuration data could not be deserialized
    Configuration(serde_yaml::Error),
}

impl Error {
    pub(crate) fn invalid_rule(rule: &str, source: regex::Error) -> Self {
        Self::InvalidArgument {
            rule: rule.to_owned(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn unsupported_modifiers(rule: &str) -> Self {
        Self::InvalidArgument {
            rule: rule.to_owned(),
            source: None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match self {
            Self::InvalidArgument {
                rule,
                source: Some(_),
            } => write!(f, "media type rule {rule:?} is not a valid regular expression"),
            Self::InvalidArgument { rule, source: None } => {
                write!(f, "media type rule {rule:?} uses unsupported pattern modifiers")
            }
            Self::ConfigFile { path, .. } => {
                write!(f, "failed opening configuration file {}", path.display())
            }
            Self::Configuration(_) => write!(f, "failed reading configuration"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidArgument { source, .. } => source
                .as_deref()
                .map(|source| -> &(dyn std::error::Error + 'static) { source }),
            Self::ConfigFile { source, .. } => Some(source),
            Self::Configuration(source) => Some(source),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Configuration(value)
    }
}
