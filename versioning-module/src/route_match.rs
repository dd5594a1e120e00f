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

//! Route match and request state passed to the `Route` phase listeners

use http::Request;

/// Result of matching the request URI against the router
///
/// Parameters keep the order in which they were set. Setting a parameter that already exists
/// replaces its value without changing its position.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    name: String,
    params: Vec<(String, String)>,
}

impl RouteMatch {
    /// Creates a route match for the named route with the given parameters
    pub fn new<I, K, V>(name: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut result = Self {
            name: name.into(),
            params: Vec::new(),
        };
        for (key, value) in params {
            result.set_param(key, value);
        }
        result
    }

    /// Name of the matched route
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves a parameter value
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Sets a parameter value, overwriting any existing value
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some((_, existing)) = self.params.iter_mut().find(|(key, _)| *key == name) {
            *existing = value;
        } else {
            self.params.push((name, value));
        }
    }

    /// Iterates over all parameters in the order they were set
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

/// State of the `Route` phase: the current request and the route matched for it
///
/// Both are optional. The request might not be an HTTP request, and a request not matching any
/// route has no route match. Listeners have nothing to do in either case.
#[derive(Debug, Default)]
pub struct RouteEvent {
    request: Option<Request<()>>,
    route_match: Option<RouteMatch>,
}

impl RouteEvent {
    /// Creates the event state for a request
    pub fn new(request: Option<Request<()>>, route_match: Option<RouteMatch>) -> Self {
        Self {
            request,
            route_match,
        }
    }

    /// The current request
    pub fn request(&self) -> Option<&Request<()>> {
        self.request.as_ref()
    }

    /// The route matched for the current request
    pub fn route_match(&self) -> Option<&RouteMatch> {
        self.route_match.as_ref()
    }

    /// Mutable access to the route matched for the current request
    pub fn route_match_mut(&mut self) -> Option<&mut RouteMatch> {
        self.route_match.as_mut()
    }

    /// Sets the route match, typically done by the router
    pub fn set_route_match(&mut self, route_match: RouteMatch) {
        self.route_match = Some(route_match);
    }

    /// Gives both the request and the route match if both are present
    pub(crate) fn request_and_route_match(&mut self) -> Option<(&Request<()>, &mut RouteMatch)> {
        Some((self.request.as_ref()?, self.route_match.as_mut()?))
    }

    /// Consumes the event, returning the route match
    pub fn into_route_match(self) -> Option<RouteMatch> {
        self.route_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    #[test]
    fn params() {
        let mut route_match = RouteMatch::new("status", [("controller", "Status"), ("id", "1")]);
        assert_eq!(route_match.name(), "status");
        assert_eq!(route_match.param("id"), Some("1"));
        assert_eq!(route_match.param("version"), None);

        route_match.set_param("controller", "Other");
        route_match.set_param("version", "2");
        assert_eq!(
            route_match.params().collect::<Vec<_>>(),
            vec![("controller", "Other"), ("id", "1"), ("version", "2")]
        );
    }
}
