// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coordinates which link is active.
//!
//! The [`LinkManager`] owns the only mutable copy of the [`LinkConfig`] and
//! the only link. Every reconfiguration stops the current link, updates the
//! configuration and starts the link for the resulting role while holding
//! one lock, so two reconfigurations never interleave.
//!
//! The configuration is published as a snapshot through a
//! [`watch`] channel. Readers such as the event relay look at the role
//! without taking the lock.

use tokio::sync::{watch, Mutex};

use crate::{
    client::ClientLink,
    config::{validate_port, LinkConfig, LinkRole},
    server::{ServerLink, ServerState},
    Error, Result,
};

/// Which kind of link is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    None,
    Client,
    Server,
}

/// The single process-wide link.
#[derive(Debug, Default)]
enum Link {
    #[default]
    None,
    Client(ClientLink),
    Server(ServerLink),
}

impl Link {
    const fn kind(&self) -> LinkKind {
        match self {
            Self::None => LinkKind::None,
            Self::Client(_) => LinkKind::Client,
            Self::Server(_) => LinkKind::Server,
        }
    }

    /// Releases the link and all of its sockets.
    async fn close(self) {
        match self {
            Self::None => {}
            Self::Client(mut client) => client.shutdown().await,
            Self::Server(mut server) => {
                server.stop().await;
            }
        }
    }
}

#[derive(Debug, Default)]
struct State {
    link: Link,
    initialized: bool,
}

#[derive(Debug)]
pub struct LinkManager {
    config: watch::Sender<LinkConfig>,
    state: Mutex<State>,
}

impl Default for LinkManager {
    fn default() -> Self {
        Self::new(LinkConfig::default())
    }
}

impl LinkManager {
    /// Creates a manager that holds no link until
    /// [`LinkManager::complete_initialization`] is called.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        let (config, _) = watch::channel(config);
        Self {
            config,
            state: Mutex::new(State::default()),
        }
    }

    /// Receiver for configuration snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LinkConfig> {
        self.config.subscribe()
    }

    /// The current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> LinkConfig {
        self.config.borrow().clone()
    }

    pub async fn apply_role(&self, role: LinkRole) -> Result<()> {
        log::info!("Got new Mode ({role})");
        self.transition(|config| config.role = role).await
    }

    pub async fn apply_port(&self, port: u16) -> Result<()> {
        validate_port(port)?;
        log::info!("Got new Port ({port})");
        self.transition(|config| config.port = port).await
    }

    pub async fn apply_remote_host(&self, host: Option<String>) -> Result<()> {
        log::info!("Got new Server ({})", host.as_deref().unwrap_or("<none>"));
        self.transition(|config| config.remote_host = host).await
    }

    /// Marks the configuration as fully seeded and starts the link for the
    /// current role for the first time.
    pub async fn complete_initialization(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.initialized {
            log::warn!("Link manager has already been initialized");
            return Ok(());
        }
        state.initialized = true;
        let config = self.config();
        Self::start(&mut state, &config).await
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.lock().await.initialized
    }

    pub async fn active_link(&self) -> LinkKind {
        self.state.lock().await.link.kind()
    }

    /// State observer of the active server link, if any.
    pub async fn server_state(&self) -> Option<watch::Receiver<ServerState>> {
        match &self.state.lock().await.link {
            Link::Server(server) => Some(server.state_changes()),
            Link::None | Link::Client(_) => None,
        }
    }

    /// Forwards a trigger state to the active client link.
    ///
    /// Holds the transition lock while writing, so a write never overlaps
    /// with the shutdown of the client link it goes to.
    pub async fn send_event(&self, active: bool) -> Result<()> {
        match &mut self.state.lock().await.link {
            Link::Client(client) => client.send_bool_event(active).await,
            Link::None | Link::Server(_) => Err(Error::NotConnected),
        }
    }

    /// Stops whatever link is active. Further reconfigurations do not
    /// start a new link.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        state.initialized = false;
        let link = std::mem::take(&mut state.link);
        link.close().await;
    }

    async fn transition(&self, update: impl FnOnce(&mut LinkConfig)) -> Result<()> {
        let mut state = self.state.lock().await;
        std::mem::take(&mut state.link).close().await;
        self.config.send_modify(update);
        if !state.initialized {
            return Ok(());
        }
        let config = self.config();
        Self::start(&mut state, &config).await
    }

    async fn start(state: &mut State, config: &LinkConfig) -> Result<()> {
        debug_assert!(matches!(state.link, Link::None));
        validate_port(config.port)?;
        match config.role {
            LinkRole::Server => {
                state.link = Link::Server(ServerLink::start(config.port)?);
                Ok(())
            }
            LinkRole::Client => {
                let host = config
                    .remote_host
                    .as_deref()
                    .ok_or(Error::MissingRemoteHost)?;
                let mut client = ClientLink::new();
                client.connect(host, config.port).await?;
                state.link = Link::Client(client);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nothing_starts_before_initialization() {
        let manager = LinkManager::default();
        manager.apply_role(LinkRole::Client).await.unwrap();
        manager
            .apply_remote_host(Some("127.0.0.1".to_owned()))
            .await
            .unwrap();
        assert_eq!(manager.active_link().await, LinkKind::None);
        assert_eq!(manager.config().role, LinkRole::Client);
        assert!(!manager.is_initialized().await);
    }

    #[tokio::test]
    async fn client_role_without_host_stays_inactive() {
        let manager = LinkManager::default();
        manager.apply_role(LinkRole::Client).await.unwrap();
        assert!(matches!(
            manager.complete_initialization().await,
            Err(Error::MissingRemoteHost)
        ));
        assert_eq!(manager.active_link().await, LinkKind::None);
    }

    #[tokio::test]
    async fn invalid_port_leaves_config_unchanged() {
        let manager = LinkManager::default();
        let before = manager.config();
        assert!(manager.apply_port(80).await.is_err());
        assert_eq!(manager.config(), before);
    }

    #[tokio::test]
    async fn privileged_port_from_initial_config_is_rejected() {
        for port in [0, 502, 1023] {
            let manager = LinkManager::new(LinkConfig {
                port,
                ..LinkConfig::default()
            });
            assert!(matches!(
                manager.complete_initialization().await,
                Err(Error::InvalidParameter { .. })
            ));
            assert_eq!(manager.active_link().await, LinkKind::None);
            assert!(manager.server_state().await.is_none());
        }
    }

    #[tokio::test]
    async fn send_event_without_client_link_is_rejected() {
        let manager = LinkManager::default();
        assert!(matches!(
            manager.send_event(true).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn shutdown_without_link_is_a_no_op() {
        let manager = LinkManager::default();
        manager.shutdown().await;
        manager.shutdown().await;
        assert_eq!(manager.active_link().await, LinkKind::None);
    }
}
