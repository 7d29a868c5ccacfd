// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Monotonic and wall-clock time, grounded on `c3_timer.h`'s pair of
//! clocks. `Instant` never goes backwards and is used for timeouts and
//! rate measurement; `SystemTime` is used wherever a value must be
//! communicated to a peer or persisted.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds elapsed since an arbitrary, process-local epoch. Safe to
/// compare only against values produced by this process.
pub fn monotonic_millis(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Seconds since the Unix epoch, saturating to zero if the clock is set
/// before 1970 (never happens in practice, but avoids a panic on an
/// otherwise infallible conversion).
pub fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_millis_advances() {
        let start = Instant::now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(monotonic_millis(start) >= 5);
    }

    #[test]
    fn unix_seconds_is_plausible() {
        // Any timestamp after this crate's epoch.
        assert!(unix_seconds() > 1_700_000_000);
    }
}
