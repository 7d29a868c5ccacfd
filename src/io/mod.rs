// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Non-blocking I/O: device-level read/write classification, the per-message
//! reader/writer state machines built on top of it, and the refcounted
//! buffer type they hand off to the rest of the system.

pub mod device;
pub mod reader_writer;
pub mod shared_buffers;
