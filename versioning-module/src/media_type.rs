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

//! Extraction of API version information from `Content-Type` and `Accept` headers

use http::header::{HeaderName, ACCEPT, CONTENT_TYPE};
use http::HeaderMap;
use log::{debug, trace};
use once_cell::sync::Lazy;
use std::str::FromStr;

use crate::configuration::{MediaTypeRule, VersioningConf};
use crate::events::{Event, EventManager, Listener, Phase};
use crate::{Error, RouteEvent};

/// The built-in media type rule, matching values like `application/vnd.example.v2.status+json`
///
/// Vendor, version and resource are exposed as `laminas_ver_vendor`, `laminas_ver_version` and
/// `laminas_ver_resource` route parameters respectively, the format suffix is not.
pub const DEFAULT_RULE: &str = r"application/vnd\.(?P<laminas_ver_vendor>[^.]+)\.v(?P<laminas_ver_version>\d+)(?:\.(?P<laminas_ver_resource>[a-zA-Z0-9_-]+))?(?:\+[a-z]+)?";

static DEFAULT: Lazy<MediaTypeRule> = Lazy::new(|| {
    MediaTypeRule::try_from(DEFAULT_RULE).expect("built-in media type rule should be valid")
});

/// The request header a [`MediaTypeListener`] inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionHeader {
    /// The `Content-Type` header, only its media type is considered
    ContentType,
    /// The `Accept` header, media ranges are considered in the order of client preference
    Accept,
}

impl VersionHeader {
    /// Name of the header
    pub fn name(&self) -> HeaderName {
        match self {
            Self::ContentType => CONTENT_TYPE,
            Self::Accept => ACCEPT,
        }
    }
}

/// Parses a media range from the `Accept` header into a media type/quality pair.
fn parse_media_range(range: &str) -> Option<(&str, u16)> {
    let mut params = range.split(';');
    let media_type = params.next()?.trim();
    let mut quality = 1000;
    for param in params {
        if let Some((name, value)) = param.split_once('=') {
            if name.trim() == "q" {
                if let Ok(value) = f64::from_str(value.trim()) {
                    quality = (value.clamp(0.0, 1.0) * 1000.0) as u16;
                }
            }
        }
    }
    Some((media_type, quality))
}

/// Listener for the `Route` phase injecting API version information from a media type header
/// into the route match
///
/// The header value is matched against a list of [`MediaTypeRule`] regular expressions, starting
/// with the rule added last. The built-in rule [`DEFAULT_RULE`] is always added first, so that
/// custom rules take precedence. Named capture groups of the first matching rule become route
/// parameters, existing parameters with the same name are overwritten. Groups that didn’t match
/// anything are ignored.
///
/// Nothing happens if there is no route match, no header or no matching rule. Version extraction
/// never causes request processing to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTypeListener {
    header: VersionHeader,
    rules: Vec<MediaTypeRule>,
}

impl MediaTypeListener {
    /// Priority of this listener in the `Route` phase: after routing, before dispatching
    pub const PRIORITY: i32 = -40;

    /// Creates a listener inspecting the given header with the built-in rule only
    pub fn new(header: VersionHeader) -> Self {
        Self {
            header,
            rules: vec![DEFAULT.clone()],
        }
    }

    /// Creates a listener inspecting the `Content-Type` header
    pub fn content_type() -> Self {
        Self::new(VersionHeader::ContentType)
    }

    /// Creates a listener inspecting the `Accept` header
    pub fn accept() -> Self {
        Self::new(VersionHeader::Accept)
    }

    /// Creates a listener with the built-in rule followed by the configured rules
    pub fn from_conf(header: VersionHeader, conf: &VersioningConf) -> Self {
        let mut listener = Self::new(header);
        for rule in &conf.content_type {
            listener.push_rule(rule.clone());
        }
        debug!(
            "{:?} listener set up with media type rules: {:?}",
            header,
            listener.rules.iter().map(|rule| rule.as_str()).collect::<Vec<_>>()
        );
        listener
    }

    /// The header this listener inspects
    pub fn header(&self) -> VersionHeader {
        self.header
    }

    /// Adds a media type rule. Rules added later take precedence over earlier ones.
    ///
    /// Returns [`Error::InvalidArgument`] if the pattern isn’t a valid regular expression.
    pub fn add_rule(&mut self, pattern: &str) -> Result<&mut Self, Error> {
        self.push_rule(MediaTypeRule::try_from(pattern)?);
        Ok(self)
    }

    /// Adds an already compiled media type rule
    pub fn push_rule(&mut self, rule: MediaTypeRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Registered rules, in the order they were added
    pub fn rules(&self) -> &[MediaTypeRule] {
        &self.rules
    }

    /// Matches a single media type against the rules, most recently added rule first
    ///
    /// Returns the named and non-empty capture groups of the first rule matching.
    pub fn match_media_type(&self, media_type: &str) -> Option<Vec<(String, String)>> {
        self.rules.iter().rev().find_map(|rule| {
            let captures = rule.captures(media_type)?;
            trace!("Media type {media_type:?} matched by rule {:?}", rule.as_str());
            Some(
                rule.capture_names()
                    .flatten()
                    .filter_map(|name| {
                        let value = captures.name(name)?.as_str();
                        if value.is_empty() {
                            None
                        } else {
                            Some((name.to_owned(), value.to_owned()))
                        }
                    })
                    .collect(),
            )
        })
    }

    /// Parses a header value, returning the parameters to be added to the route match
    ///
    /// For `Content-Type` only the media type is considered, parameters like `charset` are
    /// stripped. For `Accept` all media ranges are considered, ordered by their quality value.
    pub fn parse_header(&self, value: &str) -> Option<Vec<(String, String)>> {
        match self.header {
            VersionHeader::ContentType => {
                let media_type = value.split_once(';').map_or(value, |(media_type, _)| media_type);
                self.match_media_type(media_type.trim())
            }
            VersionHeader::Accept => {
                let mut ranges = value
                    .split(',')
                    .filter_map(parse_media_range)
                    .filter(|(media_type, quality)| !media_type.is_empty() && *quality > 0)
                    .collect::<Vec<_>>();

                // Stable sort, ranges with identical quality keep the header order
                ranges.sort_by(|(_, quality1), (_, quality2)| quality2.cmp(quality1));

                ranges
                    .into_iter()
                    .find_map(|(media_type, _)| self.match_media_type(media_type))
            }
        }
    }

    fn header_value(&self, headers: &HeaderMap) -> Option<String> {
        let name = self.header.name();
        let mut values = Vec::new();
        for value in headers.get_all(&name) {
            match value.to_str() {
                Ok(value) => values.push(value),
                Err(_) => {
                    trace!("Ignoring {name} header with non-ASCII value {value:?}");
                }
            }
        }

        if values.is_empty() {
            None
        } else if self.header == VersionHeader::Accept {
            Some(values.join(","))
        } else {
            // Content-Type can only have one value
            values.first().map(|value| (*value).to_owned())
        }
    }

    /// Inspects the request header and adds the extracted parameters to the route match
    pub fn on_route(&self, event: &mut RouteEvent) {
        let (request, route_match) = if let Some(result) = event.request_and_route_match() {
            result
        } else {
            trace!("No request or no route match, skipping version detection");
            return;
        };

        let value = if let Some(value) = self.header_value(request.headers()) {
            value
        } else {
            trace!("No {} header, skipping version detection", self.header.name());
            return;
        };

        if let Some(params) = self.parse_header(&value) {
            trace!("Adding parameters from {value:?} to the route match: {params:?}");
            for (name, value) in params {
                route_match.set_param(name, value);
            }
        } else {
            trace!("No media type rule matched {value:?}");
        }
    }

    /// Attaches the listener to the `Route` phase
    pub fn attach(self, events: &mut EventManager) {
        events.attach(Phase::Route, Self::PRIORITY, self);
    }
}

impl Listener for MediaTypeListener {
    fn handle(&self, event: &mut Event<'_>) {
        if let Event::Route(event) = event {
            self.on_route(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::RouteMatch;
    use http::Request;
    use test_log::test;

    fn make_event(header: Option<(HeaderName, &str)>) -> RouteEvent {
        let mut request = Request::builder().uri("/status/1");
        if let Some((name, value)) = header {
            request = request.header(name, value);
        }
        RouteEvent::new(
            Some(request.body(()).unwrap()),
            Some(RouteMatch::new("status", [("controller", "StatusController")])),
        )
    }

    fn params(event: &RouteEvent) -> Vec<(&str, &str)> {
        event.route_match().unwrap().params().collect()
    }

    fn parsed(listener: &MediaTypeListener, value: &str) -> Option<Vec<(String, String)>> {
        listener.parse_header(value)
    }

    fn pairs(list: &[(&str, &str)]) -> Option<Vec<(String, String)>> {
        Some(
            list.iter()
                .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
                .collect(),
        )
    }

    #[test]
    fn default_rule() {
        let listener = MediaTypeListener::content_type();
        assert_eq!(listener.rules().len(), 1);
        assert_eq!(listener.rules()[0].as_str(), DEFAULT_RULE);

        assert_eq!(
            parsed(&listener, "application/vnd.status.v2"),
            pairs(&[("laminas_ver_vendor", "status"), ("laminas_ver_version", "2")])
        );
        assert_eq!(
            parsed(&listener, "application/vnd.example.v10.user+json"),
            pairs(&[
                ("laminas_ver_vendor", "example"),
                ("laminas_ver_version", "10"),
                ("laminas_ver_resource", "user"),
            ])
        );
        assert_eq!(
            parsed(&listener, "application/vnd.my-api.v1.user_group-list+hal"),
            pairs(&[
                ("laminas_ver_vendor", "my-api"),
                ("laminas_ver_version", "1"),
                ("laminas_ver_resource", "user_group-list"),
            ])
        );

        assert_eq!(parsed(&listener, "application/json"), None);
        assert_eq!(parsed(&listener, "application/vnd.status.vx"), None);
        assert_eq!(parsed(&listener, "application/vnd.status.v2+JSON"), None);
        assert_eq!(parsed(&listener, "text/application/vnd.status.v2"), None);
        assert_eq!(parsed(&listener, "application/vnd.status.v2 extra"), None);
    }

    #[test]
    fn content_type_parameters() {
        let listener = MediaTypeListener::content_type();
        assert_eq!(
            parsed(&listener, "application/vnd.status.v2; charset=utf-8"),
            parsed(&listener, "application/vnd.status.v2")
        );
        assert_eq!(
            parsed(&listener, "  application/vnd.status.v2.user+json ;charset=utf-8"),
            parsed(&listener, "application/vnd.status.v2.user+json")
        );
    }

    #[test]
    fn custom_rules() {
        let mut listener = MediaTypeListener::content_type();
        listener.add_rule("foo=bar").unwrap();
        assert_eq!(listener.rules().len(), 2);
        assert_eq!(listener.rules()[1].as_str(), "foo=bar");

        // Matched but there are no named groups
        assert_eq!(parsed(&listener, "foo=bar"), Some(Vec::new()));

        // Delimiters are stripped
        let mut delimited = MediaTypeListener::content_type();
        delimited.add_rule("#foo=bar#").unwrap();
        assert_eq!(parsed(&delimited, "foo=bar"), Some(Vec::new()));
        assert_eq!(
            parsed(&delimited, "application/vnd.status.v2"),
            pairs(&[("laminas_ver_vendor", "status"), ("laminas_ver_version", "2")])
        );

        listener
            .add_rule(r"application/vnd\.(?P<laminas_ver_vendor>[^.]+)\.v(?P<laminas_ver_version>\d+)\.(?P<custom>\w+)")
            .unwrap();
        assert_eq!(
            parsed(&listener, "application/vnd.status.v3.item"),
            pairs(&[
                ("laminas_ver_vendor", "status"),
                ("laminas_ver_version", "3"),
                ("custom", "item"),
            ])
        );

        // Default rule still applies if custom rules don’t match
        assert_eq!(
            parsed(&listener, "application/vnd.status.v3.item+json"),
            pairs(&[
                ("laminas_ver_vendor", "status"),
                ("laminas_ver_version", "3"),
                ("laminas_ver_resource", "item"),
            ])
        );
    }

    #[test]
    fn unnamed_and_empty_groups() {
        let mut listener = MediaTypeListener::content_type();
        listener
            .add_rule(r"(text)/(?P<laminas_ver_vendor>[a-z]*)(?:\+(?P<format>[a-z]+))?")
            .unwrap();

        assert_eq!(
            parsed(&listener, "text/plain+x"),
            pairs(&[("laminas_ver_vendor", "plain"), ("format", "x")])
        );
        assert_eq!(parsed(&listener, "text/"), Some(Vec::new()));
    }

    #[test]
    fn invalid_rule() {
        let mut listener = MediaTypeListener::content_type();
        let err = listener.add_rule("application/(vnd").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(listener.rules().len(), 1);
    }

    #[test]
    fn from_conf() {
        let conf = VersioningConf {
            content_type: vec![MediaTypeRule::try_from("foo=bar").unwrap()].into(),
            ..Default::default()
        };
        let listener = MediaTypeListener::from_conf(VersionHeader::ContentType, &conf);
        assert_eq!(
            listener
                .rules()
                .iter()
                .map(|rule| rule.as_str())
                .collect::<Vec<_>>(),
            vec![DEFAULT_RULE, "foo=bar"]
        );
    }

    #[test]
    fn accept_header() {
        let listener = MediaTypeListener::accept();
        assert_eq!(
            parsed(
                &listener,
                "text/html, application/vnd.status.v2+json;q=0.5, application/vnd.status.v3"
            ),
            pairs(&[("laminas_ver_vendor", "status"), ("laminas_ver_version", "3")])
        );
        assert_eq!(
            parsed(
                &listener,
                "application/vnd.status.v2+json, application/vnd.status.v3"
            ),
            pairs(&[("laminas_ver_vendor", "status"), ("laminas_ver_version", "2")])
        );
        assert_eq!(
            parsed(&listener, "application/vnd.status.v2;q=0, */*"),
            None
        );
        assert_eq!(parsed(&listener, ""), None);
    }

    #[test]
    fn on_route() {
        let listener = MediaTypeListener::content_type();

        let mut event = make_event(Some((
            CONTENT_TYPE,
            "application/vnd.status.v2+json; charset=utf-8",
        )));
        listener.on_route(&mut event);
        assert_eq!(
            params(&event),
            vec![
                ("controller", "StatusController"),
                ("laminas_ver_vendor", "status"),
                ("laminas_ver_version", "2"),
            ]
        );

        // Existing parameters are overwritten
        let mut event = make_event(Some((CONTENT_TYPE, "application/vnd.status.v2.user")));
        event
            .route_match_mut()
            .unwrap()
            .set_param("laminas_ver_version", "1");
        listener.on_route(&mut event);
        assert_eq!(
            params(&event),
            vec![
                ("controller", "StatusController"),
                ("laminas_ver_version", "2"),
                ("laminas_ver_vendor", "status"),
                ("laminas_ver_resource", "user"),
            ]
        );

        // Header names are case-insensitive
        let request = Request::builder()
            .uri("/status/1")
            .header("CONTENT-TYPE", "application/vnd.status.v5")
            .body(())
            .unwrap();
        let mut event = RouteEvent::new(
            Some(request),
            Some(RouteMatch::new("status", [("controller", "StatusController")])),
        );
        listener.on_route(&mut event);
        assert_eq!(
            event.route_match().unwrap().param("laminas_ver_version"),
            Some("5")
        );
    }

    #[test]
    fn on_route_noop() {
        let listener = MediaTypeListener::content_type();

        // No header
        let mut event = make_event(None);
        listener.on_route(&mut event);
        assert_eq!(params(&event), vec![("controller", "StatusController")]);

        // Only the Accept header
        let mut event = make_event(Some((ACCEPT, "application/vnd.status.v2")));
        listener.on_route(&mut event);
        assert_eq!(params(&event), vec![("controller", "StatusController")]);

        // No matching rule
        let mut event = make_event(Some((CONTENT_TYPE, "application/json")));
        listener.on_route(&mut event);
        assert_eq!(params(&event), vec![("controller", "StatusController")]);

        // No route match
        let request = Request::builder()
            .header(CONTENT_TYPE, "application/vnd.status.v2")
            .body(())
            .unwrap();
        let mut event = RouteEvent::new(Some(request), None);
        listener.on_route(&mut event);
        assert!(event.route_match().is_none());

        // No request
        let mut event = RouteEvent::new(None, Some(RouteMatch::new("status", [("id", "1")])));
        listener.on_route(&mut event);
        assert_eq!(params(&event), vec![("id", "1")]);
    }

    #[test]
    fn accept_on_route() {
        let listener = MediaTypeListener::accept();

        let request = Request::builder()
            .header(ACCEPT, "text/html;q=0.9")
            .header(ACCEPT, "application/vnd.status.v4.item+json")
            .body(())
            .unwrap();
        let mut event = RouteEvent::new(Some(request), Some(RouteMatch::default()));
        listener.on_route(&mut event);
        assert_eq!(
            params(&event),
            vec![
                ("laminas_ver_vendor", "status"),
                ("laminas_ver_version", "4"),
                ("laminas_ver_resource", "item"),
            ]
        );
    }
}
