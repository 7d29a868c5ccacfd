// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Shared-secret password hashing, grounded on the
//! `{xxhash, farmhash, spookyhash, murmurhash2, murmurhash3}` family,
//! enriched with real crates since the prior CHAP-only design only carried MD5-based
//! CHAP (`handlers/login_chap.rs`). We expose the two members of that
//! family that have maintained crates: xxHash and SeaHash (a
//! SpookyHash-family derivative), selectable per the opcode's declared
//! auth level.

use twox_hash::XxHash64;

use std::hash::Hasher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    XxHash,
    SeaHash,
}

/// Hashes `secret` to a 64-bit value transmitted as part of the header.
pub fn hash_secret(algorithm: HashAlgorithm, secret: &[u8]) -> u64 {
    match algorithm {
        HashAlgorithm::XxHash => {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(secret);
            hasher.finish()
        },
        HashAlgorithm::SeaHash => seahash::hash(secret),
    }
}

/// Which stored hash a request must match, selected by the opcode's auth
/// level (`crate::wire::opcode::AuthLevel`).
#[derive(Debug, Clone)]
pub struct AuthStore {
    pub admin_hash: Option<u64>,
    pub user_hash: Option<u64>,
    pub algorithm: HashAlgorithm,
}

impl AuthStore {
    pub fn check_admin(&self, presented: u64) -> bool {
        self.admin_hash == Some(presented)
    }

    pub fn check_user(&self, presented: u64) -> bool {
        self.user_hash == Some(presented) || self.check_admin(presented)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash_secret(HashAlgorithm::XxHash, b"s3cret");
        let b = hash_secret(HashAlgorithm::XxHash, b"s3cret");
        assert_eq!(a, b);
        let c = hash_secret(HashAlgorithm::XxHash, b"other");
        assert_ne!(a, c);
    }

    #[test]
    fn user_auth_accepts_admin_hash_too() {
        let store = AuthStore {
            admin_hash: Some(42),
            user_hash: Some(7),
            algorithm: HashAlgorithm::SeaHash,
        };
        assert!(store.check_user(7));
        assert!(store.check_user(42));
        assert!(!store.check_user(1));
    }
}
