// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Non-blocking bytes-in/bytes-out device handlers, grounded on
//! `io_device_handlers.cc`/`io_reader_writer.cc`'s `DeviceReaderWriter`
//! and `client/common.rs`'s `io_with_timeout` pattern for
//! wrapping an async I/O call with cancellation.

use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::errors::IoResult;

/// Reads at most `buf.len()` bytes without blocking past what the
/// `AsyncRead` implementation itself buffers, classifying the outcome the
/// way a non-blocking device handler should: `WouldBlock` → `Retry`, zero-byte read or
/// peer-reset → `Eof`, anything else → `Error`.
pub async fn read_bytes<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> (IoResult, usize) {
    match reader.read(buf).await {
        Ok(0) => (IoResult::Eof, 0),
        Ok(n) => (IoResult::Ok, n),
        Err(e) if e.kind() == ErrorKind::WouldBlock => (IoResult::Retry, 0),
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::BrokenPipe) => {
            (IoResult::Eof, 0)
        },
        Err(_) => (IoResult::Error, 0),
    }
}

/// Writes at most `buf.len()` bytes, same classification as
/// [`read_bytes`]. Files never return `Retry`, which naturally falls out
/// of `tokio::fs::File`'s `AsyncWrite` impl never returning `WouldBlock`.
pub async fn write_bytes<W: AsyncWrite + Unpin>(writer: &mut W, buf: &[u8]) -> (IoResult, usize) {
    match writer.write(buf).await {
        Ok(n) => (IoResult::Ok, n),
        Err(e) if e.kind() == ErrorKind::WouldBlock => (IoResult::Retry, 0),
        Err(e) if matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::BrokenPipe) => {
            (IoResult::Eof, 0)
        },
        Err(_) => (IoResult::Error, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn read_bytes_reports_eof_on_empty_source() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        let mut buf = [0u8; 8];
        let (result, n) = read_bytes(&mut cursor, &mut buf).await;
        assert_eq!(result, IoResult::Eof);
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn read_bytes_reports_ok_with_data() {
        let mut cursor = Cursor::new(b"hello".to_vec());
        let mut buf = [0u8; 8];
        let (result, n) = read_bytes(&mut cursor, &mut buf).await;
        assert_eq!(result, IoResult::Ok);
        assert_eq!(&buf[..n], b"hello");
    }
}
