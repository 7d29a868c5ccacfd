// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Opcode/response-kind enums and the descriptor-byte bit layout from
//! the wire layout, grounded on a similar `models/opcode.rs` pattern of a
//! `TryFrom<u8>` opcode plus a small flags type.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown opcode {0:#04x}")]
pub struct UnknownOpcode(pub u8);

/// The 4-bit opcode class carried in the descriptor byte for requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Write = 0x0,
    Read = 0x1,
    Delete = 0x2,
    Ping = 0x3,
    Stats = 0x4,
    Info = 0x5,
    Check = 0x6,
    Shutdown = 0x7,
    Log = 0x8,
    Rotate = 0x9,
    Store = 0xA,
    Restore = 0xB,
    LoadConfig = 0xC,
    Set = 0xD,
    Get = 0xE,
}

impl TryFrom<u8> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value & 0x0f {
            0x0 => Opcode::Write,
            0x1 => Opcode::Read,
            0x2 => Opcode::Delete,
            0x3 => Opcode::Ping,
            0x4 => Opcode::Stats,
            0x5 => Opcode::Info,
            0x6 => Opcode::Check,
            0x7 => Opcode::Shutdown,
            0x8 => Opcode::Log,
            0x9 => Opcode::Rotate,
            0xA => Opcode::Store,
            0xB => Opcode::Restore,
            0xC => Opcode::LoadConfig,
            0xD => Opcode::Set,
            0xE => Opcode::Get,
            other => return Err(UnknownOpcode(other)),
        })
    }
}

impl From<Opcode> for u8 {
    fn from(value: Opcode) -> Self {
        value as u8
    }
}

/// The auth level a given opcode requires, driving whether a request must
/// carry a user- or admin-level hash. "Info" commands are the special
/// class the protocol calls out as independently configurable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLevel {
    None,
    User,
    Admin,
}

impl Opcode {
    pub fn default_auth_level(self) -> AuthLevel {
        match self {
            Opcode::Write | Opcode::Read | Opcode::Delete | Opcode::Ping => AuthLevel::User,
            Opcode::Stats | Opcode::Info | Opcode::Check => AuthLevel::None,
            Opcode::Shutdown
            | Opcode::Log
            | Opcode::Rotate
            | Opcode::Store
            | Opcode::Restore
            | Opcode::LoadConfig
            | Opcode::Set
            | Opcode::Get => AuthLevel::Admin,
        }
    }
}

/// Response kinds carried in the envelope's final status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseKind {
    Ok = 0,
    Data = 1,
    List = 2,
    Error = 3,
}

impl TryFrom<u8> for ResponseKind {
    type Error = UnknownOpcode;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        Ok(match value {
            0 => ResponseKind::Ok,
            1 => ResponseKind::Data,
            2 => ResponseKind::List,
            3 => ResponseKind::Error,
            other => return Err(UnknownOpcode(other)),
        })
    }
}

bitflags::bitflags! {
    /// Descriptor-byte flag bits, packed alongside the 4-bit opcode class
    /// byte 0 is `flags << 4 | opcode_class`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DescriptorFlags: u8 {
        const HAS_PAYLOAD = 0b0001;
        const HAS_AUTH    = 0b0010;
        const HAS_MARKER  = 0b0100;
        const IS_ADMIN    = 0b1000;
    }
}

/// The descriptor byte: flags in the high nibble, opcode class in the low
/// nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub flags: DescriptorFlags,
    pub opcode: Opcode,
}

impl Descriptor {
    pub fn to_byte(self) -> u8 {
        (self.flags.bits() << 4) | (u8::from(self.opcode) & 0x0f)
    }

    pub fn from_byte(byte: u8) -> Result<Self, UnknownOpcode> {
        let flags = DescriptorFlags::from_bits_truncate(byte >> 4);
        let opcode = Opcode::try_from(byte & 0x0f)?;
        Ok(Descriptor { flags, opcode })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_roundtrips() {
        let d = Descriptor {
            flags: DescriptorFlags::HAS_PAYLOAD | DescriptorFlags::HAS_MARKER,
            opcode: Opcode::Write,
        };
        let byte = d.to_byte();
        let back = Descriptor::from_byte(byte).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn unknown_opcode_nibble_errors() {
        assert!(Opcode::try_from(0x0f).is_err());
    }
}
