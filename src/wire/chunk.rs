// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed header chunks (`Number`, `String`, `List`), grounded on the
//! two-phase builder/iterator contract the wire protocol relies on.

use crate::wire::vlq;

pub const TAG_NUMBER: u8 = 0x01;
pub const TAG_STRING: u8 = 0x02;
pub const TAG_LIST: u8 = 0x03;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    Number(u64),
    String(Vec<u8>),
    List(Vec<Vec<u8>>),
}

impl Chunk {
    /// Worst-case encoded size, used by a builder's `estimate_*` pass.
    pub fn estimate(&self) -> usize {
        match self {
            Chunk::Number(v) => 1 + vlq::encoded_len(*v),
            Chunk::String(s) => 1 + vlq::encoded_len(s.len() as u64) + s.len(),
            Chunk::List(items) => {
                1 + vlq::encoded_len(items.len() as u64)
                    + items
                        .iter()
                        .map(|s| vlq::encoded_len(s.len() as u64) + s.len())
                        .sum::<usize>()
            },
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Chunk::Number(v) => {
                out.push(TAG_NUMBER);
                vlq::encode(*v, out);
            },
            Chunk::String(s) => {
                out.push(TAG_STRING);
                vlq::encode(s.len() as u64, out);
                out.extend_from_slice(s);
            },
            Chunk::List(items) => {
                out.push(TAG_LIST);
                vlq::encode(items.len() as u64, out);
                for item in items {
                    vlq::encode(item.len() as u64, out);
                    out.extend_from_slice(item);
                }
            },
        }
    }
}

/// A chunk that failed to decode cleanly; `is_valid() == false` so callers
/// can detect a malformed wire message without the iterator panicking
/// instead of trusting a peer-controlled length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaybeChunk {
    chunk: Option<Chunk>,
}

impl MaybeChunk {
    pub fn is_valid(&self) -> bool {
        self.chunk.is_some()
    }

    pub fn into_chunk(self) -> Option<Chunk> {
        self.chunk
    }
}

/// Advances chunk by chunk over an already-received header buffer.
pub struct ChunkIterator<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ChunkIterator<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ChunkIterator { buf, pos: 0 }
    }

    /// Reports the next chunk's tag without consuming it, or `None` if
    /// the buffer is exhausted.
    pub fn peek_tag(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    /// Extracts the next chunk. Returns `None` once the buffer is
    /// exhausted (not an error); malformed input yields
    /// `Some(MaybeChunk)` with `is_valid() == false`.
    pub fn next_chunk(&mut self) -> Option<MaybeChunk> {
        let tag = *self.buf.get(self.pos)?;
        self.pos += 1;
        let chunk = match tag {
            TAG_NUMBER => vlq::decode(self.buf, self.pos).map(|(v, next)| {
                self.pos = next;
                Chunk::Number(v)
            }),
            TAG_STRING => vlq::decode(self.buf, self.pos).and_then(|(len, next)| {
                let end = next.checked_add(len as usize)?;
                let bytes = self.buf.get(next..end)?.to_vec();
                self.pos = end;
                Some(Chunk::String(bytes))
            }),
            TAG_LIST => vlq::decode(self.buf, self.pos).and_then(|(count, next)| {
                self.pos = next;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (len, next) = vlq::decode(self.buf, self.pos)?;
                    let end = next.checked_add(len as usize)?;
                    let bytes = self.buf.get(next..end)?.to_vec();
                    items.push(bytes);
                    self.pos = end;
                }
                Some(Chunk::List(items))
            }),
            _ => None,
        };
        Some(MaybeChunk { chunk })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_number_string_list() {
        let chunks = vec![
            Chunk::Number(42),
            Chunk::String(b"hello".to_vec()),
            Chunk::List(vec![b"a".to_vec(), b"b".to_vec()]),
        ];
        let mut buf = Vec::new();
        for c in &chunks {
            c.encode(&mut buf);
        }
        let mut it = ChunkIterator::new(&buf);
        for expected in &chunks {
            let got = it.next_chunk().unwrap();
            assert!(got.is_valid());
            assert_eq!(&got.into_chunk().unwrap(), expected);
        }
        assert!(it.next_chunk().is_none());
    }

    #[test]
    fn empty_list_roundtrips() {
        let chunk = Chunk::List(vec![]);
        let mut buf = Vec::new();
        chunk.encode(&mut buf);
        let mut it = ChunkIterator::new(&buf);
        let got = it.next_chunk().unwrap().into_chunk().unwrap();
        assert_eq!(got, Chunk::List(vec![]));
    }

    #[test]
    fn truncated_string_is_invalid_not_panicking() {
        // claims length 10 but supplies only 2 bytes.
        let mut buf = vec![TAG_STRING];
        crate::wire::vlq::encode(10, &mut buf);
        buf.extend_from_slice(b"ab");
        let mut it = ChunkIterator::new(&buf);
        let got = it.next_chunk().unwrap();
        assert!(!got.is_valid());
    }

    #[test]
    fn estimate_matches_encoded_len() {
        let chunk = Chunk::String(b"hello world".to_vec());
        let mut buf = Vec::new();
        chunk.encode(&mut buf);
        assert_eq!(buf.len(), chunk.estimate());
    }
}
