// src/config/validate.rs

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BundlewatchError, Result};

/// Upper bound for `[watch].debounce_ms`.
pub const MAX_DEBOUNCE_MS: u64 = 10_000;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BundlewatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.plugins, raw.bundler, raw.watch))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_plugins(cfg)?;
    validate_bundler(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn validate_plugins(cfg: &RawConfigFile) -> Result<()> {
    if cfg.plugins.source.as_os_str().is_empty() {
        return Err(BundlewatchError::ConfigError(
            "[plugins].source must be set".to_string(),
        ));
    }
    if cfg.plugins.destination.as_os_str().is_empty() {
        return Err(BundlewatchError::ConfigError(
            "[plugins].destination must be set".to_string(),
        ));
    }
    Ok(())
}

fn validate_bundler(cfg: &RawConfigFile) -> Result<()> {
    if cfg.bundler.cmd.trim().is_empty() {
        return Err(BundlewatchError::ConfigError(
            "[bundler].cmd must be a non-empty command".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(cfg: &RawConfigFile) -> Result<()> {
    let debounce = cfg.watch.debounce_ms;
    if debounce == 0 || debounce > MAX_DEBOUNCE_MS {
        return Err(BundlewatchError::ConfigError(format!(
            "[watch].debounce_ms must be in 1..={} (got {})",
            MAX_DEBOUNCE_MS, debounce
        )));
    }

    for pattern in cfg.watch.exclude.iter() {
        if let Err(err) = Glob::new(pattern) {
            return Err(BundlewatchError::ConfigError(format!(
                "invalid [watch].exclude pattern '{}': {}",
                pattern, err
            )));
        }
    }

    Ok(())
}
