// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::compress::{CompressorEngine, Hint, Level};

pub struct Lz4Engine;

impl CompressorEngine for Lz4Engine {
    fn name(&self) -> &'static str {
        "LZ4"
    }

    fn max_compressed_size(&self, src_len: usize) -> usize {
        // Mirrors the reference source's edge case: refuse to even
        // estimate a size for empty input, which `pack` treats as
        // "cannot compress".
        if src_len == 0 {
            0
        } else {
            lz4_flex::block::get_maximum_output_size(src_len)
        }
    }

    fn pack(&self, src: &[u8], _level: Level, _hint: Hint, scratch: &mut Vec<u8>) -> Option<usize> {
        lz4_flex::block::compress_into(src, scratch.as_mut_slice()).ok()
    }

    fn unpack(&self, src: &[u8], dst: &mut [u8]) -> bool {
        lz4_flex::block::decompress_into(src, dst).is_ok()
    }
}

pub struct SnappyEngine;

impl CompressorEngine for SnappyEngine {
    fn name(&self) -> &'static str {
        "SNAPPY"
    }

    fn max_compressed_size(&self, src_len: usize) -> usize {
        snap::raw::max_compress_len(src_len)
    }

    fn pack(&self, src: &[u8], _level: Level, _hint: Hint, scratch: &mut Vec<u8>) -> Option<usize> {
        let mut encoder = snap::raw::Encoder::new();
        encoder.compress(src, scratch).ok()
    }

    fn unpack(&self, src: &[u8], dst: &mut [u8]) -> bool {
        let mut decoder = snap::raw::Decoder::new();
        match decoder.decompress(src, dst) {
            Ok(n) => n == dst.len(),
            Err(_) => false,
        }
    }
}
