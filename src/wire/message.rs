// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The full message envelope: descriptor byte, header chunks, optional
//! auth hash, optional integrity marker, optional payload. This is the
//! byte layout the wire protocol defines.

use crate::wire::{
    chunk::{Chunk, ChunkIterator},
    header::{INTEGRITY_MARKER, PayloadInfo},
    opcode::Descriptor,
    vlq,
};

#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub descriptor: Descriptor,
    pub auth_hash: Option<u64>,
    pub payload_info: Option<PayloadInfo>,
    pub chunks: Vec<Chunk>,
    pub payload: Option<Vec<u8>>,
}

/// Decodes a complete, already-assembled message buffer (as a reader's
/// state machine would hand to the consumer on reaching `Complete`).
/// Malformed chunks surface through `Chunk` validity rather than this
/// function returning `Err` for them — only truncation of the envelope
/// itself (not enough bytes for the declared header length) is an error
/// here, matching the scenario where the connection is closed with a
/// `ProtocolError` logged by the caller, not a panic in the decoder.
pub fn decode(buf: &[u8]) -> anyhow::Result<DecodedMessage> {
    anyhow::ensure!(!buf.is_empty(), "empty message buffer");
    let descriptor = Descriptor::from_byte(buf[0])?;
    let mut pos = 1;

    let (header_len, next) =
        vlq::decode(buf, pos).ok_or_else(|| anyhow::anyhow!("truncated header-length VLQ"))?;
    pos = next;

    let payload_info = if descriptor.flags.contains(crate::wire::opcode::DescriptorFlags::HAS_PAYLOAD) {
        let (compressed_size, next) =
            vlq::decode(buf, pos).ok_or_else(|| anyhow::anyhow!("truncated compressed-size VLQ"))?;
        pos = next;
        let (uncompressed_size, next) =
            vlq::decode(buf, pos).ok_or_else(|| anyhow::anyhow!("truncated uncompressed-size VLQ"))?;
        pos = next;
        let compressor_id = *buf
            .get(pos)
            .ok_or_else(|| anyhow::anyhow!("truncated compressor id"))?;
        pos += 1;
        Some(PayloadInfo {
            uncompressed_size,
            compressed_size,
            compressor_id,
        })
    } else {
        None
    };

    let auth_hash = if descriptor.flags.contains(crate::wire::opcode::DescriptorFlags::HAS_AUTH) {
        let bytes: [u8; 8] = buf
            .get(pos..pos + 8)
            .ok_or_else(|| anyhow::anyhow!("truncated auth hash"))?
            .try_into()
            .unwrap();
        pos += 8;
        Some(u64::from_be_bytes(bytes))
    } else {
        None
    };

    let header_end = pos + header_len as usize;
    let header_bytes = buf
        .get(pos..header_end)
        .ok_or_else(|| anyhow::anyhow!("declared header length exceeds buffer"))?;
    let mut it = ChunkIterator::new(header_bytes);
    let mut chunks = Vec::new();
    while let Some(maybe) = it.next_chunk() {
        anyhow::ensure!(maybe.is_valid(), "malformed chunk in header");
        chunks.push(maybe.into_chunk().unwrap());
    }
    pos = header_end;

    if descriptor.flags.contains(crate::wire::opcode::DescriptorFlags::HAS_MARKER) {
        let marker = buf
            .get(pos..pos + INTEGRITY_MARKER.len())
            .ok_or_else(|| anyhow::anyhow!("truncated integrity marker"))?;
        anyhow::ensure!(marker == INTEGRITY_MARKER, "integrity marker mismatch");
        pos += INTEGRITY_MARKER.len();
    }

    let payload = match payload_info {
        Some(info) => {
            let end = pos + info.compressed_size as usize;
            Some(
                buf.get(pos..end)
                    .ok_or_else(|| anyhow::anyhow!("truncated payload"))?
                    .to_vec(),
            )
        },
        None => None,
    };

    Ok(DecodedMessage {
        descriptor,
        auth_hash,
        payload_info,
        chunks,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{
        header::HeaderBuilder,
        opcode::Opcode,
    };

    #[test]
    fn malformed_header_reports_invalid_chunk_not_panic() {
        // header claims more chunks than the bytes supplied.
        let mut builder = HeaderBuilder::new();
        builder
            .opcode(Opcode::Read, false)
            .estimate_chunk(Chunk::String(b"sid-1".to_vec()));
        builder.configure().unwrap();
        let mut bytes = builder.add_chunks().unwrap().to_vec();
        // corrupt: overwrite the string-length VLQ to claim more bytes than exist.
        let tag_pos = bytes.iter().position(|&b| b == crate::wire::chunk::TAG_STRING).unwrap();
        bytes[tag_pos + 1] = 0x7f;
        let result = decode(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn ping_with_no_payload_decodes() {
        let mut builder = HeaderBuilder::new();
        builder.opcode(Opcode::Ping, false);
        builder.configure().unwrap();
        let bytes = builder.add_chunks().unwrap().to_vec();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.descriptor.opcode, Opcode::Ping);
        assert!(decoded.payload.is_none());
        assert!(decoded.chunks.is_empty());
    }

    #[test]
    fn write_with_auth_marker_and_payload_round_trips() {
        // Exercises every optional field at once: a header chunk, an auth
        // hash, the integrity marker, and a payload. The payload bytes
        // themselves are appended by the caller after `add_chunks()`,
        // the same way a writer assembles the full message.
        let payload = b"cached value bytes".to_vec();
        let mut builder = HeaderBuilder::new();
        builder
            .opcode(Opcode::Write, false)
            .estimate_chunk(Chunk::String(b"sid-1".to_vec()))
            .estimate_auth(0xdead_beef_cafe_f00d)
            .estimate_marker()
            .estimate_payload(PayloadInfo {
                uncompressed_size: payload.len() as u64,
                compressed_size: payload.len() as u64,
                compressor_id: 0,
            });
        builder.configure().unwrap();
        let mut bytes = builder.add_chunks().unwrap().to_vec();
        bytes.extend_from_slice(&payload);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.descriptor.opcode, Opcode::Write);
        assert_eq!(decoded.auth_hash, Some(0xdead_beef_cafe_f00d));
        assert_eq!(decoded.chunks, vec![Chunk::String(b"sid-1".to_vec())]);
        assert_eq!(decoded.payload, Some(payload));
    }
}
