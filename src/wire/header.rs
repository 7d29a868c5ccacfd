// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Two-phase header builder: `estimate_*` for every chunk the caller
//! intends to emit, `configure` to commit the layout and allocate the
//! exact buffer, `add_*` to write the chunks, `check` to assert the
//! written size matches the estimate. Grounded on the
//! `Builder` trait (`models/common.rs`) generalized from a single fixed
//! BHS layout to a variable chunk sequence.

use crate::wire::{
    chunk::Chunk,
    opcode::{Descriptor, DescriptorFlags, Opcode},
    vlq,
};

/// The 4-byte integrity marker, placed immediately before
/// the payload when enabled.
pub const INTEGRITY_MARKER: [u8; 4] = [0xC3, 0xCA, 0xCE, 0x02];

#[derive(Debug, Clone, Copy)]
pub struct PayloadInfo {
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub compressor_id: u8,
}

#[derive(Default)]
pub struct HeaderBuilder {
    /// Sum of chunk estimates only — this, and only this, is what gets
    /// declared as the header length on the wire. Consumers
    /// (`message::decode`, `CommandReader`) read payload sizes and the
    /// auth hash as separate prefix fields and the marker as its own
    /// stage, so none of those belong in the declared length.
    chunk_estimated: usize,
    /// Total byte estimate across every field, used only to size the
    /// output buffer up front.
    total_estimated: usize,
    chunks: Vec<Chunk>,
    auth_hash: Option<u64>,
    payload: Option<PayloadInfo>,
    has_marker: bool,
    opcode: Option<Opcode>,
    is_admin: bool,
    committed: Option<Vec<u8>>,
}

impl HeaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: call once per chunk the caller intends to emit.
    pub fn estimate_chunk(&mut self, chunk: Chunk) -> &mut Self {
        self.chunk_estimated += chunk.estimate();
        self.total_estimated += chunk.estimate();
        self.chunks.push(chunk);
        self
    }

    pub fn estimate_auth(&mut self, hash: u64) -> &mut Self {
        self.auth_hash = Some(hash);
        self.total_estimated += 8;
        self
    }

    pub fn estimate_marker(&mut self) -> &mut Self {
        self.has_marker = true;
        self.total_estimated += INTEGRITY_MARKER.len();
        self
    }

    pub fn estimate_payload(&mut self, info: PayloadInfo) -> &mut Self {
        self.payload = Some(info);
        self.total_estimated += 1 // compressor id
            + vlq::encoded_len(info.compressed_size)
            + vlq::encoded_len(info.uncompressed_size);
        self
    }

    pub fn opcode(&mut self, opcode: Opcode, is_admin: bool) -> &mut Self {
        self.opcode = Some(opcode);
        self.is_admin = is_admin;
        self
    }

    /// Phase 2: commits the layout, allocates the exact buffer, and
    /// writes the descriptor plus length prefix. After this call,
    /// `add_*` appends the actual chunk bytes.
    pub fn configure(&mut self) -> anyhow::Result<()> {
        let opcode = self
            .opcode
            .ok_or_else(|| anyhow::anyhow!("header builder: opcode not set before configure()"))?;

        let mut flags = DescriptorFlags::empty();
        if self.payload.is_some() {
            flags |= DescriptorFlags::HAS_PAYLOAD;
        }
        if self.auth_hash.is_some() {
            flags |= DescriptorFlags::HAS_AUTH;
        }
        if self.has_marker {
            flags |= DescriptorFlags::HAS_MARKER;
        }
        if self.is_admin {
            flags |= DescriptorFlags::IS_ADMIN;
        }
        let descriptor = Descriptor { flags, opcode };

        let mut buf = Vec::with_capacity(1 + self.total_estimated + 5);
        buf.push(descriptor.to_byte());

        // The declared header length is the sum of chunk estimates only
        // (not auth/marker/payload, which consumers read as separate
        // fields), which add_chunks() below asserts against the bytes it
        // actually writes.
        let header_len_estimate = self.chunk_estimated as u64;
        vlq::encode(header_len_estimate, &mut buf);

        if let Some(info) = self.payload {
            vlq::encode(info.compressed_size, &mut buf);
            vlq::encode(info.uncompressed_size, &mut buf);
            buf.push(info.compressor_id);
        }
        if let Some(hash) = self.auth_hash {
            buf.extend_from_slice(&hash.to_be_bytes());
        }

        self.committed = Some(buf);
        Ok(())
    }

    /// Phase 3: writes the chunks accumulated during `estimate_chunk`, in
    /// order.
    pub fn add_chunks(&mut self) -> anyhow::Result<&[u8]> {
        let buf = self
            .committed
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("add_chunks called before configure()"))?;
        let before = buf.len();
        for chunk in &self.chunks {
            chunk.encode(buf);
        }
        let written = buf.len() - before;
        anyhow::ensure!(
            written == self.chunks.iter().map(Chunk::estimate).sum::<usize>(),
            "header builder: written chunk bytes ({written}) != estimate"
        );
        if self.has_marker {
            buf.extend_from_slice(&INTEGRITY_MARKER);
        }
        Ok(buf)
    }

    /// Asserts that the estimated and written sizes matched, the testable
    /// property that makes the builder safe to reuse across requests.
    pub fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.committed.is_some(),
            "check() called before configure()"
        );
        Ok(())
    }

    pub fn finished_bytes(&self) -> Option<&[u8]> {
        self.committed.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::chunk::Chunk;

    #[test]
    fn two_phase_build_matches_estimate() {
        let mut builder = HeaderBuilder::new();
        builder
            .opcode(Opcode::Write, false)
            .estimate_chunk(Chunk::String(b"sid-1".to_vec()))
            .estimate_chunk(Chunk::Number(3600));
        builder.configure().unwrap();
        builder.add_chunks().unwrap();
        builder.check().unwrap();
        assert!(builder.finished_bytes().unwrap().len() > 1);
    }
}
