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

//! # Versioning Module
//!
//! This crate adds API versioning to an application using a router with named routes. The
//! requested API version can be communicated in two ways:
//!
//! * Via a vendor-specific media type in the `Content-Type` or `Accept` header, e.g.
//!   `application/vnd.status.v2+json`. The listeners of the `Route` phase extract vendor, version
//!   and resource name from the header and add them to the route match as `laminas_ver_vendor`,
//!   `laminas_ver_version` and `laminas_ver_resource` parameters.
//! * Via an optional `/v<version>` path prefix, e.g. `/v2/status`. The `MergeConfig` phase
//!   listener adds this prefix to the configured routes before the router is created.
//!
//! A configuration could look like this:
//!
//! ```yaml
//! api-tools-versioning:
//!   content-type:
//!   - 'application/vendor\.(?P<laminas_ver_vendor>[^.]+)\.(?P<laminas_ver_version>\d+)\+json'
//!   uri: [status, user]
//!   default_version:
//!     status: 2
//! router:
//!   routes:
//!     status:
//!       type: Segment
//!       options:
//!         route: /status[/:id]
//!     user:
//!       type: Segment
//!       options:
//!         route: /user[/:id]
//! ```
//!
//! ## Versioning settings
//!
//! * `content-type` lists additional regular expressions to match media types against. The
//!   regular expression has to match the entire media type, named capture groups become route
//!   parameters. Rules listed later take precedence, the built-in rule
//!   [`DEFAULT_RULE`](media_type::DEFAULT_RULE) is always checked last.
//! * `uri` lists the routes which should get an optional `[/v:version]` segment. The route
//!   patterns from the example above become `[/v:version]/status[/:id]` and
//!   `[/v:version]/user[/:id]`.
//! * `default_version` is the version to assume if the path doesn’t specify one. It can be either
//!   a number applying to all routes or a map with route-specific versions. Anything not
//!   configured here defaults to version 1.
//!
//! ## Code example
//!
//! The host application sets up an [`EventManager`], attaches its router at priority 1 and the
//! versioning listeners via [`VersioningModule`]:
//!
//! ```rust
//! use http::Request;
//! use serde_yaml::Value;
//! use versioning_module::{
//!     Event, EventManager, FromYaml, RouteEvent, RouteMatch, VersioningModule,
//! };
//!
//! let mut config = Value::from_yaml(r#"
//!     api-tools-versioning:
//!         uri: [status]
//!     router:
//!         routes:
//!             status:
//!                 options:
//!                     route: /status[/:id]
//! "#).unwrap();
//!
//! let mut events = EventManager::new();
//! VersioningModule::from_config(&config).unwrap().attach(&mut events);
//!
//! events.trigger(&mut Event::MergeConfig(&mut config));
//! assert_eq!(
//!     config["router"]["routes"]["status"]["options"]["route"].as_str(),
//!     Some("[/v:version]/status[/:id]")
//! );
//!
//! // For each request, after the router produced a route match
//! let request = Request::builder()
//!     .header("Content-Type", "application/vnd.status.v2+json")
//!     .body(())
//!     .unwrap();
//! let route_match = RouteMatch::new("status", [("controller", "StatusController")]);
//! let mut event = RouteEvent::new(Some(request), Some(route_match));
//! events.trigger(&mut Event::Route(&mut event));
//! assert_eq!(
//!     event.route_match().unwrap().param("laminas_ver_version"),
//!     Some("2")
//! );
//! ```

pub mod configuration;
mod deserialize;
mod error;
pub mod events;
pub mod media_type;
mod module;
pub mod prototype;
mod route_match;
pub mod version;

pub use configuration::{DefaultVersion, MediaTypeRule, VersioningConf};
pub use deserialize::{FromYaml, OneOrMany};
pub use error::Error;
pub use events::{Event, EventManager, FnListener, Listener, Phase};
pub use media_type::{MediaTypeListener, VersionHeader};
pub use module::VersioningModule;
pub use prototype::PrototypeRouteListener;
pub use route_match::{RouteEvent, RouteMatch};
pub use version::VersionListener;
