// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{
    cfg::enums::{CodecName, HashAlgorithmName},
    memory::{MAX_QUOTA, MIN_QUOTA},
};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Which address the reactor's listening socket binds to.
    pub listen: ListenConfig,
    /// Per-domain quota bytes (`Global`/`Session`/`Fpc`).
    pub domains: DomainQuotas,
    /// Compressor selection and activation threshold.
    pub compression: CompressionConfig,
    /// Shared-secret auth configuration for admin/user opcodes.
    pub auth: AuthConfig,
    /// Implementation knobs that don't map to a wire-visible setting.
    pub runtime: RuntimeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ListenConfig {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DomainQuotas {
    #[serde(rename = "GlobalBytes")]
    pub global_bytes: u64,
    #[serde(rename = "SessionBytes")]
    pub session_bytes: u64,
    #[serde(rename = "FpcBytes")]
    pub fpc_bytes: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct CompressionConfig {
    #[serde(rename = "DefaultCodec")]
    pub default_codec: CodecName,
    #[serde(rename = "ThresholdBytes")]
    /// Payloads smaller than this are stored uncompressed regardless of
    /// `default_codec`, matching `pack`'s "don't bother if it won't shrink
    /// the allocation" behavior for small inputs.
    pub threshold_bytes: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AuthConfig {
    #[serde(rename = "Algorithm")]
    pub algorithm: HashAlgorithmName,
    #[serde(rename = "AdminSecret", skip_serializing_if = "Option::is_none")]
    pub admin_secret: Option<String>,
    #[serde(rename = "UserSecret", skip_serializing_if = "Option::is_none")]
    pub user_secret: Option<String>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(rename = "MaxConnections")]
    pub max_connections: u32,
    #[serde(rename = "LoggerConfigPath")]
    pub logger_config_path: String,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        let mut cfg: Config = serde_yaml::from_str(&s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants that the parser/deserializer can't express on
    /// its own.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(!self.listen.address.is_empty(), "listen Address must not be empty");
        ensure!(self.listen.port != 0, "listen Port must be nonzero");

        for (name, bytes) in [
            ("GlobalBytes", self.domains.global_bytes),
            ("SessionBytes", self.domains.session_bytes),
            ("FpcBytes", self.domains.fpc_bytes),
        ] {
            ensure!(
                (MIN_QUOTA..=MAX_QUOTA).contains(&bytes),
                "domains.{name} ({bytes}) out of range [{MIN_QUOTA}, {MAX_QUOTA}]"
            );
        }

        ensure!(
            self.runtime.max_connections >= 1,
            "MaxConnections must be >= 1"
        );

        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen.address, self.listen.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_address() {
        let mut cfg = Config {
            listen: ListenConfig {
                address: String::new(),
                port: 11211,
            },
            domains: DomainQuotas {
                global_bytes: MIN_QUOTA,
                session_bytes: MIN_QUOTA,
                fpc_bytes: MIN_QUOTA,
            },
            compression: CompressionConfig {
                default_codec: CodecName::Lz4,
                threshold_bytes: 64,
            },
            auth: AuthConfig {
                algorithm: HashAlgorithmName::XxHash,
                admin_secret: None,
                user_secret: None,
            },
            runtime: RuntimeConfig {
                max_connections: 1024,
                logger_config_path: "config_logger.yaml".to_string(),
            },
        };
        assert!(cfg.validate_and_normalize().is_err());
        cfg.listen.address = "0.0.0.0".to_string();
        assert!(cfg.validate_and_normalize().is_ok());
        assert_eq!(cfg.listen_addr(), "0.0.0.0:11211");
    }
}
