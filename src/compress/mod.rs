// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Compression dispatch, grounded on `c3_compressor.cc`'s
//! `CompressorLibrary`: a per-thread engine cache plus a per-thread
//! scratch buffer, and the two-phase pack/unpack contract.

mod engines;

use std::cell::RefCell;

use crate::{
    compress::engines::{Lz4Engine, SnappyEngine},
    memory::{DomainMemory, Reclaimer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CodecId {
    None = 0,
    Lz4 = 1,
    Snappy = 2,
}

pub const CODEC_COUNT: usize = 3;

impl CodecId {
    fn slot(self) -> usize {
        self as usize
    }

    pub fn from_u8(value: u8) -> Option<CodecId> {
        match value {
            0 => Some(CodecId::None),
            1 => Some(CodecId::Lz4),
            2 => Some(CodecId::Snappy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Fastest,
    Average,
    Best,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hint {
    Binary,
    Text,
    NumberOfElements,
}

/// A compression engine, instantiated at most once per thread per codec.
pub trait CompressorEngine {
    fn name(&self) -> &'static str;
    /// Worst-case packed size for `src_len` input bytes; `0` means "cannot
    /// compress input of this size" (an `Lz4` edge case for empty input).
    fn max_compressed_size(&self, src_len: usize) -> usize;
    fn pack(&self, src: &[u8], level: Level, hint: Hint, scratch: &mut Vec<u8>) -> Option<usize>;
    fn unpack(&self, src: &[u8], dst: &mut [u8]) -> bool;
}

fn name_for(id: CodecId, engine: Option<&Box<dyn CompressorEngine>>) -> &'static str {
    match (id, engine) {
        (CodecId::None, _) => "NONE",
        (_, Some(e)) => e.name(),
        (_, None) => "<INACTIVE>",
    }
}

/// Returns the display name for a codec id, including the edge cases from
/// the compressor registry: `"NONE"` for [`CodecId::None`], and `"<INVALID>"` for ids
/// outside the known range (callers get this via [`name_for_raw`]).
pub fn name_for_raw(raw: u8) -> &'static str {
    match CodecId::from_u8(raw) {
        Some(CodecId::None) => "NONE",
        Some(CodecId::Lz4) => "LZ4",
        Some(CodecId::Snappy) => "SNAPPY",
        None => "<INVALID>",
    }
}

struct ThreadCache {
    engines: [Option<Box<dyn CompressorEngine>>; CODEC_COUNT],
    scratch: Vec<u8>,
}

impl ThreadCache {
    fn new() -> Self {
        ThreadCache {
            engines: [None, None, None],
            scratch: Vec::new(),
        }
    }

    fn engine(&mut self, id: CodecId) -> Option<&dyn CompressorEngine> {
        if id == CodecId::None {
            return None;
        }
        let slot = &mut self.engines[id.slot()];
        if slot.is_none() {
            let instantiated: Box<dyn CompressorEngine> = match id {
                CodecId::None => unreachable!(),
                CodecId::Lz4 => Box::new(Lz4Engine),
                CodecId::Snappy => Box::new(SnappyEngine),
            };
            *slot = Some(instantiated);
        }
        slot.as_deref()
    }
}

thread_local! {
    static CACHE: RefCell<ThreadCache> = RefCell::new(ThreadCache::new());
}

/// Packs `src` with `codec_id`, allocating the destination from `memory`
/// only if the compressed size is strictly smaller than `budget` (the
/// caller-supplied size the raw payload would otherwise take). Returns
/// `None` when compression didn't help or the codec declined the input.
pub fn pack(
    codec_id: CodecId,
    src: &[u8],
    budget: usize,
    memory: &DomainMemory,
    reclaimer: &dyn Reclaimer,
    level: Level,
    hint: Hint,
) -> anyhow::Result<Option<Vec<u8>>> {
    if codec_id == CodecId::None {
        return Ok(None);
    }
    CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        let Some(engine) = cache.engine(codec_id) else {
            return Ok(None);
        };
        let worst_case = engine.max_compressed_size(src.len());
        if worst_case == 0 {
            // codec declined to even estimate; treat as "cannot compress".
            return Ok(None);
        }
        if cache.scratch.len() < worst_case {
            cache.scratch.resize(worst_case, 0);
        }
        let (engine, scratch) = {
            let ThreadCache { engines, scratch } = &mut *cache;
            (engines[codec_id.slot()].as_deref().unwrap(), scratch)
        };
        let Some(actual_size) = engine.pack(src, level, hint, scratch) else {
            return Ok(None);
        };
        if actual_size >= budget {
            return Ok(None);
        }
        memory
            .alloc(actual_size as u64, reclaimer)
            .map_err(anyhow::Error::from)?;
        Ok(Some(scratch[..actual_size].to_vec()))
    })
}

/// Unpacks `src` (compressed by `codec_id`) into a fresh buffer of exactly
/// `uncompressed_size` bytes, allocated from `memory`; rolls the
/// allocation back if the codec fails to decode.
pub fn unpack(
    codec_id: CodecId,
    src: &[u8],
    uncompressed_size: usize,
    memory: &DomainMemory,
    reclaimer: &dyn Reclaimer,
) -> anyhow::Result<Vec<u8>> {
    anyhow::ensure!(codec_id != CodecId::None, "unpack called with codec None");
    memory
        .alloc(uncompressed_size as u64, reclaimer)
        .map_err(anyhow::Error::from)?;
    let mut dst = vec![0u8; uncompressed_size];
    let ok = CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        match cache.engine(codec_id) {
            Some(engine) => engine.unpack(src, &mut dst),
            None => false,
        }
    });
    if ok {
        Ok(dst)
    } else {
        memory.free(uncompressed_size as u64);
        anyhow::bail!("decompression failed for codec {codec_id:?}")
    }
}

/// Display name for a codec, including the `"<INACTIVE>"` edge case for a
/// codec that has no engine instantiated on the calling thread yet.
pub fn display_name(id: CodecId) -> &'static str {
    CACHE.with(|cache| {
        let cache = cache.borrow();
        name_for(id, cache.engines[id.slot()].as_ref())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{memory::NoReclaim, types::Domain};

    #[test]
    fn roundtrip_lz4() {
        let memory = DomainMemory::new(Domain::Global);
        let src = b"hello hello hello hello hello hello hello hello".repeat(4);
        let packed = pack(
            CodecId::Lz4,
            &src,
            src.len(),
            &memory,
            &NoReclaim,
            Level::Best,
            Hint::Text,
        )
        .unwrap()
        .expect("should compress repetitive input");
        assert!(packed.len() < src.len());
        let unpacked = unpack(CodecId::Lz4, &packed, src.len(), &memory, &NoReclaim).unwrap();
        assert_eq!(unpacked, src);
    }

    #[test]
    fn pack_returns_none_when_not_smaller_than_budget() {
        let memory = DomainMemory::new(Domain::Global);
        let src = b"x";
        let result = pack(
            CodecId::Lz4,
            src,
            0,
            &memory,
            &NoReclaim,
            Level::Fastest,
            Hint::Binary,
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn none_codec_display_name() {
        assert_eq!(display_name(CodecId::None), "NONE");
        assert_eq!(name_for_raw(0), "NONE");
        assert_eq!(name_for_raw(255), "<INVALID>");
    }
}
