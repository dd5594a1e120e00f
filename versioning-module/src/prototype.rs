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

//! Adding an optional version segment to configured routes

use log::{debug, trace};
use serde_yaml::{Mapping, Number, Value};

use crate::configuration::VersioningConf;
use crate::events::{Event, EventManager, Listener, Phase};
use crate::Error;

/// The optional route segment carrying the version number
pub const VERSION_SEGMENT: &str = "[/v:version]";

/// Constraint applied to the `version` route parameter
pub const VERSION_CONSTRAINT: &str = r"\d+";

const VERSION_PARAM: &str = "version";

fn key(name: &str) -> Value {
    Value::String(name.to_owned())
}

/// Checks whether the route pattern already declares a `:version` parameter
fn has_version_param(route: &str) -> bool {
    let placeholder = ":version";
    route.match_indices(placeholder).any(|(index, _)| {
        !route[index + placeholder.len()..]
            .starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn is_mapping_or_absent(options: &Mapping, name: &str) -> bool {
    options
        .get(&key(name))
        .map_or(true, |value| value.is_null() || value.is_mapping())
}

/// Sets a map entry, keeping the position of an existing entry
fn set_entry(map: &mut Mapping, name: &str, value: Value) {
    let name = key(name);
    if let Some(existing) = map.get_mut(&name) {
        *existing = value;
    } else {
        map.insert(name, value);
    }
}

/// Retrieves a nested map, creating it if necessary
fn nested_mapping<'a>(map: &'a mut Mapping, name: &str) -> Option<&'a mut Mapping> {
    let name = key(name);
    match map.get_mut(&name) {
        Some(value) => {
            if value.is_null() {
                *value = Value::Mapping(Mapping::new());
            }
        }
        None => {
            map.insert(name.clone(), Value::Mapping(Mapping::new()));
        }
    }
    map.get_mut(&name).and_then(Value::as_mapping_mut)
}

/// Adds the version segment, constraint and default to a single route definition. Returns
/// `false` if the definition doesn’t have the expected structure, it is left unchanged then.
fn inject_route(route: &mut Value, version: u32) -> bool {
    let options = match route.get_mut("options").and_then(Value::as_mapping_mut) {
        Some(options) => options,
        None => return false,
    };

    if !is_mapping_or_absent(options, "constraints") || !is_mapping_or_absent(options, "defaults")
    {
        return false;
    }

    match options.get_mut(&key("route")) {
        Some(Value::String(route)) => {
            if !has_version_param(route) {
                route.insert_str(0, VERSION_SEGMENT);
            }
        }
        _ => return false,
    }

    if let Some(constraints) = nested_mapping(options, "constraints") {
        set_entry(
            constraints,
            VERSION_PARAM,
            Value::String(VERSION_CONSTRAINT.to_owned()),
        );
    }
    if let Some(defaults) = nested_mapping(options, "defaults") {
        set_entry(
            defaults,
            VERSION_PARAM,
            Value::Number(Number::from(u64::from(version))),
        );
    }
    true
}

/// Listener for the `MergeConfig` phase adding an optional version segment to routes
///
/// Each route listed in the `uri` setting gets `[/v:version]` prepended to its pattern, e.g.
/// `/status[/:id]` becomes `[/v:version]/status[/:id]`. Routes already declaring a `:version`
/// parameter keep their pattern. In addition, the `version` parameter is constrained to numbers
/// and gets the configured default version.
///
/// Routes listed in `uri` but missing from the router configuration are ignored, so are routes
/// not listed. Applying the listener more than once has the same effect as applying it once.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrototypeRouteListener {
    conf: VersioningConf,
}

impl PrototypeRouteListener {
    /// Priority of this listener in the `MergeConfig` phase
    pub const PRIORITY: i32 = 1;

    /// Creates a listener from the versioning configuration
    pub fn new(conf: VersioningConf) -> Self {
        Self { conf }
    }

    /// Creates a listener from the versioning section of the merged application configuration
    pub fn from_config(config: &Value) -> Result<Self, Error> {
        Ok(Self::new(VersioningConf::from_config(config)?))
    }

    /// Adds version information to the routes listed in the configuration
    ///
    /// `routes` maps route names to route definitions. Definitions are expected to have the
    /// pattern under `options.route`, `options.constraints` and `options.defaults` are created
    /// if necessary.
    pub fn inject(&self, mut routes: Mapping) -> Mapping {
        for name in &self.conf.uri {
            let version = self.conf.default_version.for_route(name);
            match routes.get_mut(&key(name)) {
                Some(route) => {
                    if inject_route(route, version) {
                        trace!("Added version segment to route {name}, default version {version}");
                    } else {
                        debug!("Route {name} has no route pattern in its options, skipping");
                    }
                }
                None => {
                    debug!("Route {name} configured for versioning doesn’t exist, skipping");
                }
            }
        }
        routes
    }

    /// Adds version information to the `router.routes` section of the merged configuration
    pub fn on_merge_config(&self, config: &mut Value) {
        let routes = match config
            .get_mut("router")
            .and_then(|router| router.get_mut("routes"))
            .and_then(Value::as_mapping_mut)
        {
            Some(routes) => routes,
            None => {
                debug!("No routes in the configuration, skipping version segments");
                return;
            }
        };

        *routes = self.inject(std::mem::take(routes));
    }

    /// Attaches the listener to the `MergeConfig` phase
    pub fn attach(self, events: &mut EventManager) {
        events.attach(Phase::MergeConfig, Self::PRIORITY, self);
    }
}

impl Listener for PrototypeRouteListener {
    fn handle(&self, event: &mut Event<'_>) {
        if let Event::MergeConfig(config) = event {
            self.on_merge_config(config);
        }
    }
}
