// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt::Write;

use rand::RngExt;

/// Generates a random connection/session token (8 bytes) and returns its
/// lowercase hex representation, used to label connections in logs and as
/// an opaque session key prefix.
pub fn generate_connection_token() -> ([u8; 8], String) {
    let mut token = [0u8; 8];
    rand::rng().fill(&mut token);

    let mut hex = String::with_capacity(16);
    for byte in &token {
        write!(&mut hex, "{byte:02x}").expect("writing to String cannot fail");
    }

    (token, hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_through_hex() {
        let (bytes, hex) = generate_connection_token();
        assert_eq!(bytes.len(), 8);
        assert_eq!(hex.len(), 16);
        let decoded = hex::decode(&hex).expect("failed decode");
        assert_eq!(decoded, bytes);
    }
}
