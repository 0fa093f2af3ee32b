// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sequential processing of configuration and trigger notifications.

use std::{collections::HashMap, future::Future, ops::ControlFlow};

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt as _, Lines},
    sync::mpsc,
};

use crate::{
    config::{LinkConfig, Param, Scenario},
    manager::LinkManager,
    relay::{EventRelay, TriggerEvent},
    Error, Result,
};

/// Something the outside world wants the link to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A named parameter changed. `value` is `None` if the change carried
    /// no value.
    Param { name: String, value: Option<String> },
    Trigger(TriggerEvent),
    Shutdown,
}

/// Source of notifications, polled one at a time.
#[async_trait]
pub trait ParamSource: Send {
    /// The next notification, or `None` once the source is exhausted.
    async fn next(&mut self) -> Option<Notification>;
}

/// Reads notifications from text lines.
///
/// ```text
/// Mode=1
/// Server=10.0.0.5
/// Server
/// event Device1Scenario1 on
/// quit
/// ```
///
/// A bare parameter name is a change without a value.
#[derive(Debug)]
pub struct LineSource<R> {
    lines: Lines<R>,
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R> ParamSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next(&mut self) -> Option<Notification> {
        loop {
            match self.lines.next_line().await {
                Ok(Some(line)) => {
                    if let Some(notification) = parse_line(&line) {
                        return Some(notification);
                    }
                }
                Ok(None) => return None,
                Err(err) => {
                    log::error!("Failed to read notification: {err}");
                    return None;
                }
            }
        }
    }
}

fn parse_active(state: &str) -> Option<bool> {
    match state {
        "on" | "1" | "true" | "active" => Some(true),
        "off" | "0" | "false" | "inactive" => Some(false),
        _ => None,
    }
}

/// Parses one line of the text notification format.
///
/// Returns `None` for blank lines, comments and malformed events.
#[must_use]
pub fn parse_line(line: &str) -> Option<Notification> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    if line == "quit" {
        return Some(Notification::Shutdown);
    }
    if let Some(event) = line.strip_prefix("event ") {
        let mut fields = event.split_whitespace();
        let parsed = match (fields.next(), fields.next(), fields.next()) {
            (Some(topic), Some(state), None) => parse_active(state).map(|active| TriggerEvent {
                topic: topic.to_owned(),
                active,
            }),
            _ => None,
        };
        if parsed.is_none() {
            log::warn!("Malformed trigger event: {line}");
        }
        return parsed.map(Notification::Trigger);
    }
    let (name, value) = match line.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim().to_owned())),
        None => (line, None),
    };
    Some(Notification::Param {
        name: name.to_owned(),
        value,
    })
}

/// Receives notifications pushed into a channel.
#[derive(Debug)]
pub struct ChannelSource(mpsc::Receiver<Notification>);

impl ChannelSource {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Notification>) -> Self {
        Self(rx)
    }
}

#[async_trait]
impl ParamSource for ChannelSource {
    async fn next(&mut self) -> Option<Notification> {
        self.0.recv().await
    }
}

/// Order in which parameters are seeded during bootstrap.
const SEED_ORDER: [&str; 4] = [Param::MODE, Param::SCENARIO, Param::SERVER, Param::PORT];

/// Applies notifications to the [`LinkManager`] and the [`EventRelay`]
/// strictly one after another.
#[derive(Debug)]
pub struct Dispatcher {
    manager: LinkManager,
    relay: EventRelay,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: LinkConfig, scenario: Scenario) -> Self {
        let manager = LinkManager::new(config);
        let relay = EventRelay::new(manager.subscribe(), scenario);
        Self { manager, relay }
    }

    #[must_use]
    pub const fn manager(&self) -> &LinkManager {
        &self.manager
    }

    #[must_use]
    pub const fn relay(&self) -> &EventRelay {
        &self.relay
    }

    /// Seeds the given parameters in a fixed order and starts the first
    /// link.
    ///
    /// Invalid seed values abort the bootstrap, unknown names are skipped.
    /// A link that fails to start does not abort, it is only logged.
    pub async fn bootstrap<I>(&mut self, seeds: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut seeds: HashMap<String, String> = seeds.into_iter().collect();
        seeds.retain(|name, _| {
            let known = SEED_ORDER.contains(&name.as_str());
            if !known {
                log::warn!("Ignoring unknown parameter {name}");
            }
            known
        });
        for name in SEED_ORDER {
            if let Some(value) = seeds.remove(name) {
                log::info!("Got {name} value: {value}");
                self.apply_param(name, Some(value.as_str())).await?;
            }
        }
        if let Err(err) = self.manager.complete_initialization().await {
            log::error!("Failed to setup Modbus: {err}");
        }
        Ok(())
    }

    /// Parses and applies a single parameter change.
    pub async fn apply_param(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let param = Param::parse(name, value)?;
        log::debug!("Applying {} change", param.name());
        match param {
            Param::Mode(role) => self.manager.apply_role(role).await,
            Param::Port(port) => self.manager.apply_port(port).await,
            Param::Server(host) => self.manager.apply_remote_host(host).await,
            Param::Scenario(scenario) if scenario == self.relay.scenario() => {
                log::debug!("Already subscribed to '{}'", self.relay.topic());
                Ok(())
            }
            Param::Scenario(scenario) => {
                self.relay.subscribe(scenario);
                Ok(())
            }
        }
    }

    /// Handles one notification. Breaks on [`Notification::Shutdown`].
    pub async fn handle(&mut self, notification: Notification) -> ControlFlow<()> {
        match notification {
            Notification::Param { name, value } => {
                match self.apply_param(&name, value.as_deref()).await {
                    Ok(()) => {}
                    Err(Error::MissingValue(name)) => {
                        log::warn!("Unexpected empty value for {name}");
                    }
                    Err(err) => log::error!("Failed to apply {name}: {err}"),
                }
            }
            Notification::Trigger(event) => {
                if let Err(err) = self.relay.relay(&self.manager, &event).await {
                    log::error!("Failed to send event data over Modbus: {err}");
                }
            }
            Notification::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Processes notifications from `source` until it is exhausted, a
    /// [`Notification::Shutdown`] arrives or `shutdown_signal` resolves.
    /// Stops the active link before returning.
    pub async fn run_until<S, Sd>(&mut self, mut source: S, shutdown_signal: Sd)
    where
        S: ParamSource,
        Sd: Future<Output = ()>,
    {
        tokio::pin!(shutdown_signal);
        loop {
            let notification = tokio::select! {
                biased;
                () = &mut shutdown_signal => {
                    log::trace!("Shutdown signal received");
                    break;
                }
                notification = source.next() => notification,
            };
            let Some(notification) = notification else {
                log::info!("Notification source closed");
                break;
            };
            if self.handle(notification).await.is_break() {
                break;
            }
        }
        self.manager.shutdown().await;
    }
}
