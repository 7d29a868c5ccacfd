// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The connection-accepting event loop, grounded on `pl_socket_events.h`'s
//! `SocketEventProcessor` and `client.rs`'s read loop
//! for the "drive a state machine to completion one non-blocking step at
//! a time" pattern. The reference source drives a raw `epoll_wait` loop
//! on one thread; here `tokio`'s own reactor plays that role (see
//! DESIGN.md), and a listening socket's accept loop plus one task per
//! connection stand in for the single-thread per-object-step model while
//! still only ever doing one `read`/`write` per state-machine step.

use std::sync::Arc;

use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
};
use tracing::{Instrument, debug, info, warn};

use crate::{
    errors::IoResult,
    io::reader_writer::{CommandReader, CommandWriter, ReaderStage, WriterStage},
    memory::MemoryDomains,
    utils::generate_connection_token,
    wire::{
        header::HeaderBuilder,
        opcode::{DescriptorFlags, Opcode},
    },
};

/// Batch size pulled per wait, named after `pl_socket_events.h`'s
/// `MAX_EPOLL_EVENTS`. Under `tokio` this bounds how many freshly
/// accepted connections are spawned before yielding back to the accept
/// loop rather than a raw `epoll_wait` batch.
pub const MAX_EPOLL_EVENTS: usize = 256;

/// Cross-thread wakeup, standing in for `PipelineQueueEvent` wrapping a
/// raw `Event`. A real eventfd write becomes an ordinary channel send.
#[derive(Debug, Clone)]
pub enum ReactorEvent {
    Shutdown,
}

#[derive(Clone)]
pub struct ReactorHandle {
    tx: mpsc::Sender<ReactorEvent>,
}

impl ReactorHandle {
    pub async fn shutdown(&self) {
        let _ = self.tx.send(ReactorEvent::Shutdown).await;
    }
}

pub struct Reactor {
    listener: TcpListener,
    domains: Arc<MemoryDomains>,
    rx: mpsc::Receiver<ReactorEvent>,
    handle: ReactorHandle,
}

impl Reactor {
    pub async fn bind(addr: &str, domains: Arc<MemoryDomains>) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let (tx, rx) = mpsc::channel(MAX_EPOLL_EVENTS);
        Ok(Reactor {
            listener,
            domains,
            rx,
            handle: ReactorHandle { tx },
        })
    }

    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// The address the listening socket actually bound to, useful when
    /// `bind` was given a `:0` ephemeral port.
    pub fn local_addr(&self) -> anyhow::Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until a [`ReactorEvent::Shutdown`] arrives on
    /// the wakeup channel. Each accepted connection is handed its own
    /// task driving its reader/writer state machines independently,
    /// mirroring the reference source's one-socket-one-set-of-progress-
    /// objects model without pinning it to one OS thread.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(local_addr = ?self.listener.local_addr().ok(), "reactor accept loop starting");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            let (_, token) = generate_connection_token();
                            let span = tracing::info_span!("connection", conn = %token, %peer);
                            span.in_scope(|| debug!("accepted connection"));
                            let domains = Arc::clone(&self.domains);
                            tokio::spawn(
                                async move {
                                    if let Err(e) = connection_loop(socket, domains).await {
                                        warn!(error = %e, "connection loop ended with error");
                                    }
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
                event = self.rx.recv() => {
                    match event {
                        Some(ReactorEvent::Shutdown) | None => {
                            info!("reactor shutting down");
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

/// Drives one connection's request/response cycle to completion,
/// repeatedly: read a full message, hand it to `handle_message`, write
/// the response, then start over for the next request (every connection
/// here is treated as persistent, the common case for session/FPC
/// traffic; a non-persistent response would instead return
/// `ConnectionSlot::Disposed` and break out of this loop).
async fn connection_loop(mut socket: TcpStream, domains: Arc<MemoryDomains>) -> anyhow::Result<()> {
    loop {
        let mut reader = CommandReader::new();
        loop {
            match reader.step(&mut socket).await {
                IoResult::Ok => {
                    if *reader.stage() == ReaderStage::Complete {
                        break;
                    }
                    if *reader.stage() == ReaderStage::Error {
                        anyhow::bail!(
                            "protocol error: {}",
                            reader.error().unwrap_or("unknown")
                        );
                    }
                },
                IoResult::Retry => tokio::task::yield_now().await,
                IoResult::Eof => return Ok(()),
                IoResult::Error => anyhow::bail!("device read failed"),
            }
        }

        let response = handle_message(&reader, &domains)?;
        let mut writer = CommandWriter::new(response);
        loop {
            match writer.step(&mut socket).await {
                IoResult::Ok => {
                    if *writer.stage() == WriterStage::Complete {
                        break;
                    }
                },
                IoResult::Retry => tokio::task::yield_now().await,
                IoResult::Eof | IoResult::Error => return Ok(()),
            }
        }
    }
}

/// Builds a minimal acknowledgement for a decoded request. Concrete
/// command semantics (the actual session/FPC store) are out of scope
/// here (command dispatch is interface-only); this demonstrates the envelope
/// round-trip the reactor is responsible for.
fn handle_message(reader: &CommandReader, _domains: &MemoryDomains) -> anyhow::Result<Vec<u8>> {
    let requested = reader
        .descriptor()
        .ok_or_else(|| anyhow::anyhow!("reader completed without a descriptor"))?;
    let response_opcode = if requested.flags.contains(DescriptorFlags::IS_ADMIN) {
        Opcode::Ping
    } else {
        requested.opcode
    };
    let mut builder = HeaderBuilder::new();
    builder.opcode(response_opcode, false);
    builder.configure()?;
    Ok(builder.add_chunks()?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reactor_binds_and_shuts_down_on_handle_signal() {
        let domains = Arc::new(MemoryDomains::new());
        let reactor = Reactor::bind("127.0.0.1:0", domains).await.unwrap();
        let handle = reactor.handle();
        let task = tokio::spawn(reactor.run());
        handle.shutdown().await;
        task.await.unwrap().unwrap();
    }
}
