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

//! Minimal event manager running listeners by phase and priority

use log::trace;
use serde_yaml::Value;
use std::fmt::Debug;

use crate::RouteEvent;

/// Application lifecycle phases listeners can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs once during bootstrap, after all configuration sources have been merged and before
    /// the router is created from the configuration.
    MergeConfig,
    /// Runs for each request. The router is expected to run at priority 1, listeners with lower
    /// priority see the route match. Dispatching happens after this phase.
    Route,
}

/// Event data passed to the listeners
#[derive(Debug)]
pub enum Event<'a> {
    /// The merged application configuration
    MergeConfig(&'a mut Value),
    /// The current request and its route match
    Route(&'a mut RouteEvent),
}

impl Event<'_> {
    /// The phase this event belongs to
    pub fn phase(&self) -> Phase {
        match self {
            Self::MergeConfig(_) => Phase::MergeConfig,
            Self::Route(_) => Phase::Route,
        }
    }
}

/// An event listener
pub trait Listener: Debug + Send + Sync {
    /// Handles an event of the phase the listener has been attached to
    fn handle(&self, event: &mut Event<'_>);
}

/// Wraps a closure so that it can be attached as a listener
pub struct FnListener<F> {
    inner: F,
}

impl<F> FnListener<F>
where
    F: Fn(&mut Event<'_>) + Send + Sync,
{
    /// Creates a listener from a closure
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F> Debug for FnListener<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnListener").finish_non_exhaustive()
    }
}

impl<F> Listener for FnListener<F>
where
    F: Fn(&mut Event<'_>) + Send + Sync,
{
    fn handle(&self, event: &mut Event<'_>) {
        (self.inner)(event)
    }
}

#[derive(Debug)]
struct Attached {
    phase: Phase,
    priority: i32,
    listener: Box<dyn Listener>,
}

/// Keeps track of the attached listeners
///
/// Listeners with higher priority run first, listeners with identical priority run in the order
/// they were attached.
#[derive(Debug, Default)]
pub struct EventManager {
    listeners: Vec<Attached>,
}

impl EventManager {
    /// Creates an event manager without any listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a listener to a phase
    pub fn attach<L>(&mut self, phase: Phase, priority: i32, listener: L)
    where
        L: Listener + 'static,
    {
        trace!("Attaching listener {listener:?} to phase {phase:?} with priority {priority}");

        // Insert after all listeners with the same or higher priority to keep the order stable
        let position = self
            .listeners
            .iter()
            .position(|attached| attached.priority < priority)
            .unwrap_or(self.listeners.len());
        self.listeners.insert(
            position,
            Attached {
                phase,
                priority,
                listener: Box::new(listener),
            },
        );
    }

    /// Number of listeners attached to a phase
    pub fn listener_count(&self, phase: Phase) -> usize {
        self.listeners
            .iter()
            .filter(|attached| attached.phase == phase)
            .count()
    }

    /// Runs all listeners attached to the event’s phase
    pub fn trigger(&self, event: &mut Event<'_>) {
        let phase = event.phase();
        for attached in self
            .listeners
            .iter()
            .filter(|attached| attached.phase == phase)
        {
            attached.listener.handle(event);
        }
    }
}
