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

//! Selecting the controller matching the requested API version

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::events::{Event, EventManager, Listener, Phase};
use crate::{RouteEvent, RouteMatch};

/// Route parameter holding the controller name
pub const CONTROLLER_PARAM: &str = "controller";

static VERSION_NAMESPACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\V(\d+)\\").expect("version namespace regex should be valid")
});

/// Route parameters holding the requested version, in the order of precedence
pub const VERSION_PARAMS: &[&str] = &["laminas_ver_version", "version"];

/// Listener for the `Route` phase rewriting versioned controller names
///
/// Controllers of a versioned API live in namespaces like `Status\V1\Rest\StatusController`. If
/// the request asks for a different version, either via media type (`laminas_ver_version`
/// parameter) or via the route (`version` parameter), the version namespace is adjusted:
/// requesting version 2 selects `Status\V2\Rest\StatusController`.
///
/// This listener runs after [`MediaTypeListener`](crate::MediaTypeListener) so that media type
/// versions are already known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionListener {
    version_params: &'static [&'static str],
}

impl Default for VersionListener {
    fn default() -> Self {
        Self {
            version_params: VERSION_PARAMS,
        }
    }
}

impl VersionListener {
    /// Priority of this listener in the `Route` phase, after media type listeners
    pub const PRIORITY: i32 = -41;

    /// Creates a new listener
    pub fn new() -> Self {
        Self::default()
    }

    fn requested_version<'a>(&self, route_match: &'a RouteMatch) -> Option<&'a str> {
        self.version_params
            .iter()
            .filter_map(|name| route_match.param(name))
            .find(|version| !version.is_empty())
    }

    /// Rewrites the controller route parameter, returning the new controller name if it changed
    pub fn on_route(&self, event: &mut RouteEvent) -> Option<String> {
        let route_match = event.route_match_mut()?;
        let version = self.requested_version(route_match)?;
        let controller = route_match.param(CONTROLLER_PARAM)?;
        if !VERSION_NAMESPACE.is_match(controller) {
            return None;
        }

        let replacement = format!("\\V{version}\\");
        let controller_new = VERSION_NAMESPACE
            .replace_all(controller, regex::NoExpand(&replacement))
            .into_owned();
        if controller_new == controller {
            return None;
        }

        trace!("Switching controller {controller} to {controller_new} for version {version}");
        route_match.set_param(CONTROLLER_PARAM, controller_new.clone());
        Some(controller_new)
    }

    /// Attaches the listener to the `Route` phase
    pub fn attach(self, events: &mut EventManager) {
        events.attach(Phase::Route, Self::PRIORITY, self);
    }
}

impl Listener for VersionListener {
    fn handle(&self, event: &mut Event<'_>) {
        if let Event::Route(event) = event {
            self.on_route(event);
        }
    }
}
