// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Incremental reader/writer state machines, one per in-flight message.
//! Grounded on `state_machine/common.rs`'s (`Transition<S,R>`,
//! `StateMachine` trait) and `state_machine/nop_states.rs`'s worked
//! Start/Wait/Reply progression, generalized from a fixed BHS+data-out
//! exchange to the variable descriptor/header/marker/payload envelope of
//! `crate::wire`. Each `step` performs at most one device call and
//! returns as soon as that call would block, matching
//! `io_reader_writer.cc`'s non-blocking contract.

use crate::{
    errors::IoResult,
    io::device,
    wire::{
        header::PayloadInfo,
        opcode::{Descriptor, DescriptorFlags},
        vlq,
    },
};
use tokio::io::{AsyncRead, AsyncWrite};

/// Caps the descriptor+length+auth prefix so a peer that never completes
/// a VLQ can't grow it unboundedly before the framing is even known.
const MAX_PREFIX_BYTES: usize = 64;

struct ParsedPrefix {
    descriptor: Descriptor,
    header_len: u64,
    payload_info: Option<PayloadInfo>,
    auth_hash: Option<u64>,
}

/// Tries to parse the fixed-shape prefix (descriptor byte, header-length
/// VLQ, optional payload sizes, optional auth hash) out of the bytes
/// accumulated so far. `Ok(None)` means "not enough bytes yet", distinct
/// from `Err` which means the bytes present are already invalid (bad
/// opcode nibble).
fn try_decode_prefix(buf: &[u8]) -> anyhow::Result<Option<ParsedPrefix>> {
    if buf.is_empty() {
        return Ok(None);
    }
    let descriptor = Descriptor::from_byte(buf[0])?;
    let mut pos = 1;

    let header_len = match vlq::decode(buf, pos) {
        Some((v, next)) => {
            pos = next;
            v
        },
        None => return Ok(None),
    };

    let payload_info = if descriptor.flags.contains(DescriptorFlags::HAS_PAYLOAD) {
        let compressed_size = match vlq::decode(buf, pos) {
            Some((v, next)) => {
                pos = next;
                v
            },
            None => return Ok(None),
        };
        let uncompressed_size = match vlq::decode(buf, pos) {
            Some((v, next)) => {
                pos = next;
                v
            },
            None => return Ok(None),
        };
        let compressor_id = match buf.get(pos) {
            Some(&b) => {
                pos += 1;
                b
            },
            None => return Ok(None),
        };
        Some(PayloadInfo {
            uncompressed_size,
            compressed_size,
            compressor_id,
        })
    } else {
        None
    };

    let auth_hash = if descriptor.flags.contains(DescriptorFlags::HAS_AUTH) {
        match buf.get(pos..pos + 8) {
            Some(bytes) => {
                pos += 8;
                Some(u64::from_be_bytes(bytes.try_into().expect("8 bytes")))
            },
            None => return Ok(None),
        }
    } else {
        None
    };

    debug_assert_eq!(pos, buf.len(), "prefix parse left unconsumed bytes");
    Ok(Some(ParsedPrefix {
        descriptor,
        header_len,
        payload_info,
        auth_hash,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderStage {
    Created,
    Prefix,
    Header,
    Marker,
    Payload,
    Complete,
    Error,
}

/// One inbound message's read progress: `Created → Prefix → Header →
/// [Marker] → [Payload] → Complete`, skipping `Marker`/`Payload` when the
/// descriptor doesn't carry them.
pub struct CommandReader {
    stage: ReaderStage,
    prefix_buf: Vec<u8>,
    header_buf: Vec<u8>,
    marker_buf: Vec<u8>,
    payload_buf: Vec<u8>,
    descriptor: Option<Descriptor>,
    header_len: usize,
    payload_info: Option<PayloadInfo>,
    auth_hash: Option<u64>,
    error: Option<String>,
}

impl CommandReader {
    pub fn new() -> Self {
        CommandReader {
            stage: ReaderStage::Created,
            prefix_buf: Vec::new(),
            header_buf: Vec::new(),
            marker_buf: Vec::new(),
            payload_buf: Vec::new(),
            descriptor: None,
            header_len: 0,
            payload_info: None,
            auth_hash: None,
            error: None,
        }
    }

    pub fn stage(&self) -> &ReaderStage {
        &self.stage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn descriptor(&self) -> Option<Descriptor> {
        self.descriptor
    }

    pub fn header_bytes(&self) -> &[u8] {
        &self.header_buf
    }

    pub fn payload_bytes(&self) -> &[u8] {
        &self.payload_buf
    }

    pub fn auth_hash(&self) -> Option<u64> {
        self.auth_hash
    }

    fn stage_after_header(&self) -> ReaderStage {
        if self
            .descriptor
            .is_some_and(|d| d.flags.contains(DescriptorFlags::HAS_MARKER))
        {
            ReaderStage::Marker
        } else {
            self.stage_after_marker()
        }
    }

    fn stage_after_marker(&self) -> ReaderStage {
        match self.payload_info {
            // A zero-length payload has nothing left to read; entering
            // `Payload` would hand `read_bytes` an empty buffer, which
            // reads as `Ok(0)` and gets misclassified as `Eof`.
            Some(info) if info.compressed_size > 0 => ReaderStage::Payload,
            _ => ReaderStage::Complete,
        }
    }

    fn fail(&mut self, message: String) -> IoResult {
        self.error = Some(message);
        self.stage = ReaderStage::Error;
        IoResult::Error
    }

    /// Advances the state machine by at most one device read. Returns
    /// `IoResult::Ok` when progress was made (even if the message isn't
    /// complete yet), `Retry` when the underlying device would block,
    /// `Eof`/`Error` on a closed or broken connection.
    pub async fn step<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> IoResult {
        match self.stage {
            ReaderStage::Created => {
                self.stage = ReaderStage::Prefix;
                IoResult::Ok
            },
            ReaderStage::Prefix => {
                if self.prefix_buf.len() >= MAX_PREFIX_BYTES {
                    return self.fail("prefix exceeded maximum size".to_string());
                }
                let mut byte = [0u8; 1];
                let (result, n) = device::read_bytes(reader, &mut byte).await;
                if result != IoResult::Ok {
                    return result;
                }
                debug_assert_eq!(n, 1);
                self.prefix_buf.push(byte[0]);
                match try_decode_prefix(&self.prefix_buf) {
                    Ok(Some(parsed)) => {
                        self.descriptor = Some(parsed.descriptor);
                        self.header_len = parsed.header_len as usize;
                        self.payload_info = parsed.payload_info;
                        self.auth_hash = parsed.auth_hash;
                        self.stage = if self.header_len == 0 {
                            self.stage_after_header()
                        } else {
                            ReaderStage::Header
                        };
                        IoResult::Ok
                    },
                    Ok(None) => IoResult::Ok,
                    Err(e) => self.fail(e.to_string()),
                }
            },
            ReaderStage::Header => {
                let need = self.header_len - self.header_buf.len();
                let mut chunk = vec![0u8; need];
                let (result, n) = device::read_bytes(reader, &mut chunk).await;
                if result != IoResult::Ok {
                    return result;
                }
                self.header_buf.extend_from_slice(&chunk[..n]);
                if self.header_buf.len() == self.header_len {
                    self.stage = self.stage_after_header();
                }
                IoResult::Ok
            },
            ReaderStage::Marker => {
                let need = 4 - self.marker_buf.len();
                let mut chunk = vec![0u8; need];
                let (result, n) = device::read_bytes(reader, &mut chunk).await;
                if result != IoResult::Ok {
                    return result;
                }
                self.marker_buf.extend_from_slice(&chunk[..n]);
                if self.marker_buf.len() == 4 {
                    if self.marker_buf != crate::wire::header::INTEGRITY_MARKER {
                        return self.fail("integrity marker mismatch".to_string());
                    }
                    self.stage = self.stage_after_marker();
                }
                IoResult::Ok
            },
            ReaderStage::Payload => {
                let total = self
                    .payload_info
                    .expect("payload stage implies payload_info")
                    .compressed_size as usize;
                let need = total - self.payload_buf.len();
                let mut chunk = vec![0u8; need];
                let (result, n) = device::read_bytes(reader, &mut chunk).await;
                if result != IoResult::Ok {
                    return result;
                }
                self.payload_buf.extend_from_slice(&chunk[..n]);
                if self.payload_buf.len() == total {
                    self.stage = ReaderStage::Complete;
                }
                IoResult::Ok
            },
            ReaderStage::Complete | ReaderStage::Error => IoResult::Ok,
        }
    }
}

impl Default for CommandReader {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterStage {
    Created,
    Writing,
    Complete,
    Error,
}

/// One outbound message's write progress over an already-encoded buffer
/// (the output of `wire::header::HeaderBuilder` plus any payload bytes).
pub struct CommandWriter {
    buf: Vec<u8>,
    written: usize,
    stage: WriterStage,
}

impl CommandWriter {
    pub fn new(buf: Vec<u8>) -> Self {
        CommandWriter {
            buf,
            written: 0,
            stage: WriterStage::Created,
        }
    }

    pub fn stage(&self) -> &WriterStage {
        &self.stage
    }

    pub async fn step<W: AsyncWrite + Unpin>(&mut self, writer: &mut W) -> IoResult {
        match self.stage {
            WriterStage::Created => {
                self.stage = WriterStage::Writing;
                IoResult::Ok
            },
            WriterStage::Writing => {
                let (result, n) = device::write_bytes(writer, &self.buf[self.written..]).await;
                if result != IoResult::Ok {
                    if result == IoResult::Error {
                        self.stage = WriterStage::Error;
                    }
                    return result;
                }
                self.written += n;
                if self.written == self.buf.len() {
                    self.stage = WriterStage::Complete;
                }
                IoResult::Ok
            },
            WriterStage::Complete | WriterStage::Error => IoResult::Ok,
        }
    }
}

/// A connection's current role, reinterpreted in place rather than
/// reallocated: a persistent connection's writer, on completing its
/// response, becomes a bare `Watching` slot waiting for either the next
/// request or the peer hanging up, instead of being torn down and
/// rebuilt.
pub enum ConnectionSlot {
    Reading(CommandReader),
    Writing(CommandWriter),
    Watching,
    Disposed,
}

impl ConnectionSlot {
    /// Called when a writer reaches `Complete`. Persistent connections go
    /// back to `Watching` for the next request; non-persistent ones are
    /// `Disposed`, signalling the caller to close the socket.
    pub fn on_writer_complete(is_persistent: bool) -> ConnectionSlot {
        if is_persistent {
            ConnectionSlot::Watching
        } else {
            ConnectionSlot::Disposed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{chunk::Chunk, header::HeaderBuilder, opcode::Opcode};
    use std::io::Cursor;

    #[tokio::test]
    async fn reader_drives_through_all_stages_for_a_plain_message() {
        let mut builder = HeaderBuilder::new();
        builder
            .opcode(Opcode::Write, false)
            .estimate_chunk(Chunk::String(b"sid-1".to_vec()));
        builder.configure().unwrap();
        let bytes = builder.add_chunks().unwrap().to_vec();

        let mut cursor = Cursor::new(bytes.clone());
        let mut reader = CommandReader::new();
        loop {
            let result = reader.step(&mut cursor).await;
            assert_eq!(result, IoResult::Ok);
            if *reader.stage() == ReaderStage::Complete {
                break;
            }
        }
        assert_eq!(reader.descriptor().unwrap().opcode, Opcode::Write);
        assert!(!reader.header_bytes().is_empty());
    }

    #[tokio::test]
    async fn reader_reports_eof_mid_header() {
        let mut builder = HeaderBuilder::new();
        builder
            .opcode(Opcode::Write, false)
            .estimate_chunk(Chunk::String(b"sid-1".to_vec()));
        builder.configure().unwrap();
        let bytes = builder.add_chunks().unwrap().to_vec();
        let truncated = bytes[..bytes.len() - 2].to_vec();

        let mut cursor = Cursor::new(truncated);
        let mut reader = CommandReader::new();
        let mut last = IoResult::Ok;
        loop {
            last = reader.step(&mut cursor).await;
            if last != IoResult::Ok {
                break;
            }
        }
        assert_eq!(last, IoResult::Eof);
    }

    #[tokio::test]
    async fn writer_completes_then_slot_reinterprets_for_persistent_connection() {
        let mut writer = CommandWriter::new(b"hello".to_vec());
        let mut sink = Vec::new();
        loop {
            let result = writer.step(&mut sink).await;
            assert_eq!(result, IoResult::Ok);
            if *writer.stage() == WriterStage::Complete {
                break;
            }
        }
        assert_eq!(sink, b"hello");
        let slot = ConnectionSlot::on_writer_complete(true);
        assert!(matches!(slot, ConnectionSlot::Watching));
        let slot = ConnectionSlot::on_writer_complete(false);
        assert!(matches!(slot, ConnectionSlot::Disposed));
    }
}
