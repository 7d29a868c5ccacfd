// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use cache_cluster::cfg::{config::Config, enums::CodecName};

#[test]
fn loads_and_validates_a_fixture_config_file() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/cluster.yaml");
    let cfg = Config::load_from_file(path).expect("fixture config should load and validate");

    assert_eq!(cfg.listen_addr(), "127.0.0.1:11311");
    assert_eq!(cfg.compression.default_codec, CodecName::Lz4);
    assert_eq!(cfg.runtime.max_connections, 512);
}
