// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use cache_cluster::{memory::MemoryDomains, reactor::Reactor};

/// Binds a reactor on an ephemeral port and spawns its accept loop,
/// returning the address to connect to, a handle to shut it down, and
/// the spawned task's `JoinHandle`.
pub async fn spawn_reactor() -> (
    std::net::SocketAddr,
    cache_cluster::reactor::ReactorHandle,
    tokio::task::JoinHandle<anyhow::Result<()>>,
) {
    let domains = Arc::new(MemoryDomains::new());
    let reactor = Reactor::bind("127.0.0.1:0", domains)
        .await
        .expect("reactor should bind to an ephemeral port");
    let addr = reactor.local_addr().expect("bound listener has a local address");
    let handle = reactor.handle();
    let task = tokio::spawn(reactor.run());
    (addr, handle, task)
}
