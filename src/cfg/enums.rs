// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize};

/// Codec name as it appears in the config file, independent of the
/// numeric `CodecId` used on the wire.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecName {
    #[serde(rename = "NONE", alias = "none")]
    None,
    #[serde(rename = "LZ4", alias = "lz4")]
    Lz4,
    #[serde(rename = "SNAPPY", alias = "snappy")]
    Snappy,
}
impl fmt::Display for CodecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CodecName::None => "NONE",
            CodecName::Lz4 => "LZ4",
            CodecName::Snappy => "SNAPPY",
        })
    }
}

/// Auth hash family selectable from config, mirroring
/// `crate::wire::auth::HashAlgorithm`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithmName {
    #[serde(rename = "xxhash", alias = "XXHASH")]
    XxHash,
    #[serde(rename = "seahash", alias = "SEAHASH")]
    SeaHash,
}
