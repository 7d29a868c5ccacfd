// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use cache_cluster::{
    compress::{CodecId, Hint, Level, pack, unpack},
    memory::{DomainMemory, NoReclaim},
    types::Domain,
};

#[test]
fn snappy_roundtrips_through_pack_and_unpack() {
    let memory = DomainMemory::new(Domain::Fpc);
    let src = b"the quick brown fox jumps over the lazy dog ".repeat(8);

    let packed = pack(
        CodecId::Snappy,
        &src,
        src.len(),
        &memory,
        &NoReclaim,
        Level::Best,
        Hint::Text,
    )
    .unwrap()
    .expect("repetitive input should compress under budget");
    assert!(packed.len() < src.len());
    assert_eq!(memory.used(), packed.len() as u64);

    let unpacked = unpack(CodecId::Snappy, &packed, src.len(), &memory, &NoReclaim).unwrap();
    assert_eq!(unpacked, src);
}
