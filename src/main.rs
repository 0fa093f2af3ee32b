// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs the trigger link.
//!
//! Initial parameters are taken from the command line as `Name=value`
//! pairs, e.g. `modbus-trigger-link Mode=1 Server=10.0.0.5 Port=5020`.
//! Afterwards parameter changes and trigger events are read line by line
//! from stdin, see [`LineSource`].

use anyhow::Context as _;
use tokio::io::BufReader;

use modbus_trigger_link::{Dispatcher, LineSource, LinkConfig, Scenario};

fn parse_seeds(args: impl Iterator<Item = String>) -> anyhow::Result<Vec<(String, String)>> {
    args.map(|arg| {
        let (name, value) = arg
            .split_once('=')
            .with_context(|| format!("expected Name=value, got {arg:?}"))?;
        Ok((name.to_owned(), value.to_owned()))
    })
    .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let seeds = parse_seeds(std::env::args().skip(1))?;
    let mut dispatcher = Dispatcher::new(LinkConfig::default(), Scenario::default());
    dispatcher
        .bootstrap(seeds)
        .await
        .context("failed to seed parameters")?;
    log::info!("Ready");

    let source = LineSource::new(BufReader::new(tokio::io::stdin()));
    let shutdown_signal = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };
    dispatcher.run_until(source, shutdown_signal).await;

    log::info!("Exiting!");
    Ok(())
}
