// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Forwards trigger notifications to the client link.

use tokio::sync::watch;

use crate::{
    config::{LinkConfig, LinkRole, Scenario},
    manager::LinkManager,
    Result,
};

/// A trigger notification from the event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub topic: String,
    pub active: bool,
}

/// What happened to a trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relayed {
    /// Written to the client link.
    Forwarded,
    /// Dropped because the role is not [`LinkRole::Client`].
    NotClient,
    /// Dropped because it belongs to another scenario.
    OtherTopic,
}

#[derive(Debug)]
pub struct EventRelay {
    config: watch::Receiver<LinkConfig>,
    scenario: Scenario,
    topic: String,
}

impl EventRelay {
    #[must_use]
    pub fn new(config: watch::Receiver<LinkConfig>, scenario: Scenario) -> Self {
        let topic = scenario.topic();
        log::info!("Create subscription for '{topic}'");
        Self {
            config,
            scenario,
            topic,
        }
    }

    #[must_use]
    pub const fn scenario(&self) -> Scenario {
        self.scenario
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Replaces the subscription with the one for `scenario`.
    pub fn subscribe(&mut self, scenario: Scenario) {
        let topic = scenario.topic();
        log::info!("Create subscription for '{topic}' (was '{}')", self.topic);
        self.scenario = scenario;
        self.topic = topic;
    }

    /// Forwards `event` to the client link of `manager` if the current
    /// role is [`LinkRole::Client`].
    ///
    /// The role is read from the latest configuration snapshot without
    /// waiting for a reconfiguration in progress.
    pub async fn relay(&self, manager: &LinkManager, event: &TriggerEvent) -> Result<Relayed> {
        if event.topic != self.topic {
            log::debug!("Ignoring trigger event for '{}'", event.topic);
            return Ok(Relayed::OtherTopic);
        }
        log::info!(
            "Trigger event {} active",
            if event.active { "is" } else { "NOT" }
        );
        let role = self.config.borrow().role;
        if role != LinkRole::Client {
            return Ok(Relayed::NotClient);
        }
        manager.send_event(event.active).await?;
        Ok(Relayed::Forwarded)
    }
}
