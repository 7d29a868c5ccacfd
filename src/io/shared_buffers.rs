// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The payload carrier attached to each in-flight command or response,
//! grounded on `io_shared_buffers.cc`'s "Shared Buffers" type. In
//! the reference source this is a manually refcounted C++ object; here
//! ordinary `Arc` cloning *is* `add_reference`, and `Drop` *is*
//! `remove_reference`, with the domain accounting happening at the one
//! point the buffer is actually released.

use std::sync::Arc;

use crate::{memory::MemoryDomains, types::Domain};

struct Inner {
    header: Vec<u8>,
    payload: Vec<u8>,
    domain: Domain,
}

/// Refcounted header+payload carrier. Cloning is cheap (bumps the `Arc`
/// refcount, the "additional reference taken when the buffer is handed to
/// another pipeline stage"); the backing bytes are freed,
/// and the owning domain's accounting released, exactly when the last
/// clone is dropped.
#[derive(Clone)]
pub struct SharedBuffers {
    inner: Arc<Inner>,
}

impl SharedBuffers {
    pub fn new(domain: Domain, header: Vec<u8>, payload: Vec<u8>) -> Self {
        SharedBuffers {
            inner: Arc::new(Inner {
                header,
                payload,
                domain,
            }),
        }
    }

    pub fn domain(&self) -> Domain {
        self.inner.domain
    }

    pub fn header(&self) -> &[u8] {
        &self.inner.header
    }

    pub fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    pub fn reference_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// A "full" clone: independent header and payload bytes, the way
    /// `SharedBuffers::clone(full=true)` in the reference source copies
    /// the payload as well as the header.
    pub fn clone_full(&self) -> Self {
        SharedBuffers::new(
            self.inner.domain,
            self.inner.header.clone(),
            self.inner.payload.clone(),
        )
    }

    /// A header-only clone: payload region starts empty, mirroring
    /// `clone(full=false)`.
    pub fn clone_header_only(&self) -> Self {
        SharedBuffers::new(self.inner.domain, self.inner.header.clone(), Vec::new())
    }
}

/// Accounts a freshly produced [`SharedBuffers`] against its domain. The
/// caller that drops the last reference is responsible for calling
/// [`untrack`] with the same size, mirroring the reference source's
/// explicit `remove_reference`-triggers-`Memory::free` pairing rather than
/// threading a registry handle through every clone.
pub fn track(domains: &MemoryDomains, buffers: &SharedBuffers) {
    let size = (buffers.header().len() + buffers.payload().len()) as u64;
    domains.get(buffers.domain()).optional_alloc(size);
}

pub fn untrack(domains: &MemoryDomains, buffers: &SharedBuffers) {
    let size = (buffers.header().len() + buffers.payload().len()) as u64;
    domains.get(buffers.domain()).free(size);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_bumps_refcount_drop_releases() {
        let sb = SharedBuffers::new(Domain::Session, vec![1, 2, 3], vec![4, 5]);
        assert_eq!(sb.reference_count(), 1);
        let sb2 = sb.clone();
        assert_eq!(sb.reference_count(), 2);
        drop(sb2);
        assert_eq!(sb.reference_count(), 1);
    }

    #[test]
    fn full_clone_copies_payload_header_only_does_not() {
        let sb = SharedBuffers::new(Domain::Fpc, vec![1], vec![2, 3]);
        let full = sb.clone_full();
        assert_eq!(full.payload(), &[2, 3]);
        let header_only = sb.clone_header_only();
        assert!(header_only.payload().is_empty());
        assert_eq!(header_only.header(), sb.header());
    }
}
