// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Cores/memory discovery, grounded on `c3_system.h`'s
//! `c3_get_total_memory`/`c3_get_available_memory`/`c3_get_num_cpus` trio.
//! Unlike the reference functions, these return `Option` instead of zero
//! on failure so callers can't confuse "no memory" with "unknown".

use std::fs;

/// Total physical memory in bytes, read from `/proc/meminfo`.
pub fn total_memory_bytes() -> Option<u64> {
    read_meminfo_field("MemTotal:")
}

/// Memory the kernel currently considers available for new allocations.
pub fn available_memory_bytes() -> Option<u64> {
    read_meminfo_field("MemAvailable:")
}

/// Number of logical CPUs, grounded on `c3_get_num_cpus`.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

fn read_meminfo_field(key: &str) -> Option<u64> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix(key) {
            let kib: u64 = rest.split_whitespace().next()?.parse().ok()?;
            return Some(kib * 1024);
        }
    }
    None
}

/// The three `uname`-sourced fields `c3_get_system_info` reports, plus the
/// CPU core count it appends.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub sysname: String,
    pub release: String,
    pub version: String,
    pub num_cpus: usize,
}

pub fn system_info() -> SystemInfo {
    let uname = |flag: &str| -> String {
        std::process::Command::new("uname")
            .arg(flag)
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    };
    SystemInfo {
        sysname: uname("-s"),
        release: uname("-r"),
        version: uname("-v"),
        num_cpus: num_cpus(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_memory_is_positive_on_linux() {
        assert!(total_memory_bytes().unwrap() > 0);
    }

    #[test]
    fn available_memory_does_not_exceed_total() {
        let total = total_memory_bytes().unwrap();
        let available = available_memory_bytes().unwrap();
        assert!(available <= total);
    }

    #[test]
    fn system_info_reports_at_least_one_cpu() {
        let info = system_info();
        assert!(info.num_cpus >= 1);
        assert_eq!(info.sysname, "Linux");
    }
}
