// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Link configuration and the named parameters it is built from.

use std::{
    fmt::{self, Display},
    str::FromStr,
};

use crate::{Error, Result};

/// Lowest port a link may use.
pub const MIN_PORT: u16 = 1024;

/// Port used until a `Port` parameter arrives.
pub const DEFAULT_PORT: u16 = 5020;

/// Which end of the Modbus TCP connection this process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkRole {
    /// Expose a coil and accept writes from a remote client.
    #[default]
    Server,

    /// Write the trigger state to a coil of a remote server.
    Client,
}

impl FromStr for LinkRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "0" => Ok(Self::Server),
            "1" => Ok(Self::Client),
            other => Err(Error::invalid_parameter(Param::MODE, other)),
        }
    }
}

impl Display for LinkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => f.write_str("server"),
            Self::Client => f.write_str("client"),
        }
    }
}

/// Snapshot of everything needed to (re)start a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    pub role: LinkRole,
    pub port: u16,
    pub remote_host: Option<String>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            role: LinkRole::default(),
            port: DEFAULT_PORT,
            remote_host: None,
        }
    }
}

pub fn validate_port(port: u16) -> Result<u16> {
    if port < MIN_PORT {
        return Err(Error::invalid_parameter(Param::PORT, &port.to_string()));
    }
    Ok(port)
}

/// Number of the trigger scenario whose events are relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Scenario(u8);

impl Scenario {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 99;

    pub fn new(id: u8) -> Result<Self> {
        if !(Self::MIN..=Self::MAX).contains(&id) {
            return Err(Error::invalid_parameter(Param::SCENARIO, &id.to_string()));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub const fn id(self) -> u8 {
        self.0
    }

    /// Event topic the trigger source publishes this scenario under.
    #[must_use]
    pub fn topic(self) -> String {
        format!("Device1Scenario{}", self.0)
    }
}

impl Default for Scenario {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl FromStr for Scenario {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse()
            .map_err(|_| Error::invalid_parameter(Param::SCENARIO, s))?;
        Self::new(id)
    }
}

/// A parsed configuration change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    Mode(LinkRole),
    Port(u16),
    Server(Option<String>),
    Scenario(Scenario),
}

impl Param {
    pub const MODE: &'static str = "Mode";
    pub const PORT: &'static str = "Port";
    pub const SERVER: &'static str = "Server";
    pub const SCENARIO: &'static str = "Scenario";

    /// Parses the text value delivered for parameter `name`.
    ///
    /// An empty `Server` value clears the remote host.
    pub fn parse(name: &str, value: Option<&str>) -> Result<Self> {
        let value = value.ok_or_else(|| Error::MissingValue(name.to_owned()))?;
        match name {
            Self::MODE => value.parse().map(Self::Mode),
            Self::PORT => {
                let port = value
                    .trim()
                    .parse()
                    .map_err(|_| Error::invalid_parameter(name, value))?;
                validate_port(port).map(Self::Port)
            }
            Self::SERVER => {
                let host = value.trim();
                Ok(Self::Server((!host.is_empty()).then(|| host.to_owned())))
            }
            Self::SCENARIO => value.parse().map(Self::Scenario),
            _ => Err(Error::UnknownParameter(name.to_owned())),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mode(_) => Self::MODE,
            Self::Port(_) => Self::PORT,
            Self::Server(_) => Self::SERVER,
            Self::Scenario(_) => Self::SCENARIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mode() {
        assert_eq!(
            Param::parse("Mode", Some("0")).unwrap(),
            Param::Mode(LinkRole::Server)
        );
        assert_eq!(
            Param::parse("Mode", Some(" 1\n")).unwrap(),
            Param::Mode(LinkRole::Client)
        );
        assert!(matches!(
            Param::parse("Mode", Some("2")),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn parse_port_range() {
        assert_eq!(Param::parse("Port", Some("5020")).unwrap(), Param::Port(5020));
        assert_eq!(Param::parse("Port", Some("1024")).unwrap(), Param::Port(1024));
        assert_eq!(
            Param::parse("Port", Some("65535")).unwrap(),
            Param::Port(65535)
        );
        for invalid in ["1023", "502", "65536", "-1", "port"] {
            assert!(
                matches!(
                    Param::parse("Port", Some(invalid)),
                    Err(Error::InvalidParameter { .. })
                ),
                "{invalid}"
            );
        }
    }

    #[test]
    fn parse_server() {
        assert_eq!(
            Param::parse("Server", Some("10.0.0.5")).unwrap(),
            Param::Server(Some("10.0.0.5".to_owned()))
        );
        assert_eq!(
            Param::parse("Server", Some("  ")).unwrap(),
            Param::Server(None)
        );
    }

    #[test]
    fn parse_scenario() {
        let Param::Scenario(scenario) = Param::parse("Scenario", Some("12")).unwrap() else {
            panic!("not a scenario");
        };
        assert_eq!(scenario.id(), 12);
        assert_eq!(scenario.topic(), "Device1Scenario12");
        assert!(Param::parse("Scenario", Some("0")).is_err());
        assert!(Param::parse("Scenario", Some("100")).is_err());
    }

    #[test]
    fn missing_value_is_reported() {
        assert!(matches!(
            Param::parse("Mode", None),
            Err(Error::MissingValue(name)) if name == "Mode"
        ));
    }

    #[test]
    fn unknown_parameter_is_reported() {
        assert!(matches!(
            Param::parse("Color", Some("red")),
            Err(Error::UnknownParameter(name)) if name == "Color"
        ));
    }

    #[test]
    fn parsed_param_keeps_its_name() {
        for (name, value) in [("Mode", "0"), ("Port", "5020"), ("Server", ""), ("Scenario", "2")] {
            assert_eq!(Param::parse(name, Some(value)).unwrap().name(), name);
        }
    }

    #[test]
    fn default_config_is_server_on_default_port() {
        let config = LinkConfig::default();
        assert_eq!(config.role, LinkRole::Server);
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.remote_host.is_none());
    }
}
