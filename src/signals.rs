// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The `block`/`unblock`/`wait` trio Design Notes call for in place of
//! per-thread POSIX signal masks threaded through every pipeline class.

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};

/// A signal the reactor or the main thread may want to wait on. Kept small
/// and explicit rather than exposing the full POSIX signal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
}

impl Signal {
    fn kind(self) -> SignalKind {
        match self {
            Signal::Interrupt => SignalKind::interrupt(),
            Signal::Terminate => SignalKind::terminate(),
            Signal::Hangup => SignalKind::hangup(),
        }
    }
}

/// Waits for any one of `set` to arrive, returning which one did.
///
/// This is the async-reactor-thread equivalent of `wait_for_signal(mask)`;
/// there is no separate `block`/`unblock` step because `tokio::signal`
/// installs its handlers lazily and shares them safely across callers, so
/// "blocking" a signal is just not constructing a listener for it.
pub async fn wait(set: &[Signal]) -> Result<Signal> {
    anyhow::ensure!(!set.is_empty(), "wait() called with an empty signal set");

    let mut interrupt = set.contains(&Signal::Interrupt).then(|| {
        signal(Signal::Interrupt.kind()).context("failed to install SIGINT handler")
    });
    let mut terminate = set.contains(&Signal::Terminate).then(|| {
        signal(Signal::Terminate.kind()).context("failed to install SIGTERM handler")
    });
    let mut hangup = set
        .contains(&Signal::Hangup)
        .then(|| signal(Signal::Hangup.kind()).context("failed to install SIGHUP handler"));

    let mut interrupt = interrupt.take().transpose()?;
    let mut terminate = terminate.take().transpose()?;
    let mut hangup = hangup.take().transpose()?;

    loop {
        tokio::select! {
            _ = recv_or_pending(&mut interrupt) => return Ok(Signal::Interrupt),
            _ = recv_or_pending(&mut terminate) => return Ok(Signal::Terminate),
            _ = recv_or_pending(&mut hangup) => return Ok(Signal::Hangup),
        }
    }
}

async fn recv_or_pending(stream: &mut Option<tokio::signal::unix::Signal>) {
    match stream {
        Some(s) => {
            s.recv().await;
        },
        None => std::future::pending::<()>().await,
    }
}
