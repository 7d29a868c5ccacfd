// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result};
use cache_cluster::{
    cfg::{cli::resolve_config_path, config::Config, logger::init_logger},
    memory::MemoryDomains,
    parser::{Command, Parser, SilentCallbacks},
    reactor::Reactor,
    signals::{self, Signal},
    types::Domain,
};
use tracing::info;

/// Builds the administrative command table: `LOG, ROTATE, STORE, RESTORE,
/// LOADCONFIG, SET, STATS, INFO, CHECK, PING, SHUTDOWN, GET`. Every
/// handler here is a thin stub that logs the call it received; the
/// concrete cache/session store behind them is out of scope. `GET` also
/// carries a getter so startup can exercise `Parser::query` alongside
/// `Parser::parse`.
fn admin_commands() -> Vec<Command> {
    let mut commands = Vec::new();
    for name in [
        "LOG",
        "ROTATE",
        "STORE",
        "RESTORE",
        "LOADCONFIG",
        "SET",
        "STATS",
        "INFO",
        "CHECK",
        "PING",
        "SHUTDOWN",
    ] {
        commands.push(Command::new_set(
            name,
            Box::new(move |args: &[String]| {
                info!(command = name, ?args, "admin command invoked");
                true
            }),
        ));
    }
    commands.push(Command {
        name: "GET",
        set: Some(Box::new(|args: &[String]| {
            info!(command = "GET", ?args, "admin command invoked");
            true
        })),
        get: Some(Box::new(|buf: &mut Vec<u8>| {
            buf.extend_from_slice(cache_cluster::version::version_string().as_bytes());
            buf.len() as i64
        })),
    });
    commands
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        resolve_config_path("config.yaml").unwrap_or_else(|_| "config.yaml".into());
    let cfg = Config::load_from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path:?}"))?;

    let _logger_guard = init_logger(&cfg.runtime.logger_config_path)?;
    info!(listen = %cfg.listen_addr(), "starting up");

    let domains = Arc::new(MemoryDomains::new());
    domains.get(Domain::Global).set_quota(cfg.domains.global_bytes)?;
    domains.get(Domain::Session).set_quota(cfg.domains.session_bytes)?;
    domains.get(Domain::Fpc).set_quota(cfg.domains.fpc_bytes)?;

    let mut parser = Parser::new(admin_commands());
    let mut callbacks = SilentCallbacks;
    parser
        .parse("startup self-check", b"PING\n", false, &mut callbacks)
        .context("administrative command table self-check failed")?;

    let mut version_buf = Vec::new();
    parser.query("GET", &mut version_buf, &mut callbacks);
    let registered = parser.enumerate("*", |_| true);
    info!(
        version = %String::from_utf8_lossy(&version_buf),
        commands = registered,
        "admin command table ready"
    );

    let reactor = Reactor::bind(&cfg.listen_addr(), Arc::clone(&domains)).await?;
    let handle = reactor.handle();
    let accept_loop = tokio::spawn(reactor.run());

    let signal = signals::wait(&[Signal::Interrupt, Signal::Terminate, Signal::Hangup]).await?;
    info!(?signal, "received shutdown signal");
    handle.shutdown().await;
    accept_loop.await.context("reactor task panicked")??;

    Ok(())
}
