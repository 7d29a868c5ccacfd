// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The typed error taxonomy at the boundaries that need to classify a
//! failure rather than just propagate it. Everything else uses
//! [`anyhow::Result`] with `.context(...)`.

use thiserror::Error;

use crate::types::Domain;

/// Errors raised by the non-blocking I/O and protocol layers.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("system call {call} failed: {message}")]
    SystemCall { call: &'static str, message: String },

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("quota exceeded for domain {domain}: used {used} + requested {requested} > quota {quota}")]
    QuotaExceeded {
        domain: Domain,
        used: u64,
        requested: u64,
        quota: u64,
    },

    #[error("fatal: {0}")]
    Fatal(String),
}

impl CoreError {
    /// Whether this error should be reclassified as a non-fatal retry
    /// rather than surfaced, mirroring the `EAGAIN`/`EWOULDBLOCK`
    /// reclassification a non-blocking `SystemCall` failure gets.
    pub fn is_retry(&self) -> bool {
        matches!(self, CoreError::SystemCall { message, .. } if message.contains("WouldBlock"))
    }
}

/// Outcome of a single non-blocking device step (`read_bytes`/`write_bytes`,
/// and by extension a reader/writer state-machine step).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoResult {
    Ok,
    Retry,
    Eof,
    Error,
}
