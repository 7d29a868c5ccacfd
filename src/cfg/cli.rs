// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Overrides `default_rel` when set, so a cluster node can be pointed at a
/// config file without touching its working directory or invocation args
/// (useful under a process supervisor that doesn't let us pass flags).
pub const CONFIG_PATH_ENV_VAR: &str = "CACHE_CLUSTER_CONFIG";

/// Resolves the node's config file path: `CACHE_CLUSTER_CONFIG` if set,
/// otherwise `default_rel` relative to the current working directory.
/// Either way the result is canonicalized, so a relative path supplied on
/// the command line and a relative path left in the environment behave
/// the same once the daemon has chdir'd elsewhere (e.g. under a
/// supervisor that runs it from `/`).
pub fn resolve_config_path(default_rel: &str) -> Result<PathBuf> {
    let rel = std::env::var(CONFIG_PATH_ENV_VAR).unwrap_or_else(|_| default_rel.to_string());
    let p = Path::new(&rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial(cache_cluster_config_env)]
    fn env_var_overrides_default_when_set() {
        // SAFETY: `#[serial]` keeps this the only test mutating the
        // process environment at a time.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV_VAR, "tests/fixtures/cluster.yaml");
        }
        let resolved = resolve_config_path("config.yaml").unwrap();
        assert!(resolved.ends_with("tests/fixtures/cluster.yaml"));
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV_VAR);
        }
    }

    #[test]
    #[serial(cache_cluster_config_env)]
    fn falls_back_to_default_when_unset() {
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV_VAR);
        }
        let resolved = resolve_config_path("tests/fixtures/cluster.yaml").unwrap();
        assert!(resolved.ends_with("tests/fixtures/cluster.yaml"));
    }
}
