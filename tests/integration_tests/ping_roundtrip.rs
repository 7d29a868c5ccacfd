// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use cache_cluster::wire::{header::HeaderBuilder, message, opcode::Opcode};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::integration_tests::common::spawn_reactor;

#[tokio::test]
async fn admin_ping_request_gets_a_ping_response() {
    let (addr, handle, task) = spawn_reactor().await;

    let mut builder = HeaderBuilder::new();
    builder.opcode(Opcode::Ping, true);
    builder.configure().unwrap();
    let request = builder.add_chunks().unwrap().to_vec();

    let mut socket = TcpStream::connect(addr).await.unwrap();
    socket.write_all(&request).await.unwrap();

    // The response is a bare descriptor + zero-length header, so two
    // bytes (descriptor, header-length VLQ of 0) are all that's written.
    let mut response = vec![0u8; 2];
    socket.read_exact(&mut response).await.unwrap();

    let decoded = message::decode(&response).unwrap();
    assert_eq!(decoded.descriptor.opcode, Opcode::Ping);

    handle.shutdown().await;
    task.await.unwrap().unwrap();
}
