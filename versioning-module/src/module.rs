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

use log::debug;
use serde_yaml::Value;

use crate::configuration::VersioningConf;
use crate::events::EventManager;
use crate::media_type::{MediaTypeListener, VersionHeader};
use crate::prototype::PrototypeRouteListener;
use crate::version::VersionListener;
use crate::Error;

/// All listeners of the versioning module, set up from the application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersioningModule {
    content_type: MediaTypeListener,
    accept: MediaTypeListener,
    version: VersionListener,
    prototype: PrototypeRouteListener,
}

impl TryFrom<VersioningConf> for VersioningModule {
    type Error = Error;

    fn try_from(conf: VersioningConf) -> Result<Self, Self::Error> {
        debug!("Versioning configuration received: {conf:#?}");

        Ok(Self {
            content_type: MediaTypeListener::from_conf(VersionHeader::ContentType, &conf),
            accept: MediaTypeListener::from_conf(VersionHeader::Accept, &conf),
            version: VersionListener::new(),
            prototype: PrototypeRouteListener::new(conf),
        })
    }
}

impl VersioningModule {
    /// Sets up the listeners from the `api-tools-versioning` section of the merged application
    /// configuration
    pub fn from_config(config: &Value) -> Result<Self, Error> {
        VersioningConf::from_config(config)?.try_into()
    }

    /// The listener inspecting the `Content-Type` header
    pub fn content_type_listener(&self) -> &MediaTypeListener {
        &self.content_type
    }

    /// The listener inspecting the `Accept` header
    pub fn accept_listener(&self) -> &MediaTypeListener {
        &self.accept
    }

    /// The listener adding version segments to routes
    pub fn prototype_listener(&self) -> &PrototypeRouteListener {
        &self.prototype
    }

    /// Attaches all listeners to their respective phases
    pub fn attach(self, events: &mut EventManager) {
        self.prototype.attach(events);
        self.content_type.attach(events);
        self.accept.attach(events);
        self.version.attach(events);
    }
}
