mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Environment variables that override empty credential fields.
pub const ENV_PINATA_API_KEY: &str = "PINATA_API_KEY";
pub const ENV_PINATA_API_SECRET: &str = "PINATA_API_SECRET";
pub const ENV_PINATA_JWT: &str = "PINATA_JWT";
pub const ENV_NFT_STORAGE_API_KEY: &str = "NFT_STORAGE_API_KEY";

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./pinforge.toml", "~/.config/pinforge/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    let mut config = Config::default();
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Fill empty credential fields from the process environment.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

fn apply_overrides_from<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

    let pinata = &mut config.backend.pinata;
    if pinata.api_key.is_empty() {
        if let Some(v) = lookup(ENV_PINATA_API_KEY) {
            pinata.api_key = v;
        }
    }
    if pinata.api_secret.is_empty() {
        if let Some(v) = lookup(ENV_PINATA_API_SECRET) {
            pinata.api_secret = v;
        }
    }
    if pinata.jwt.as_deref().map_or(true, str::is_empty) {
        if let Some(v) = lookup(ENV_PINATA_JWT) {
            pinata.jwt = Some(v);
        }
    }

    let nft = &mut config.backend.nft_storage;
    if nft.token.is_empty() {
        if let Some(v) = lookup(ENV_NFT_STORAGE_API_KEY) {
            nft.token = v;
        }
    }
}

/// Validate settings that the pipeline cannot run without.
///
/// `require_credentials` is false for commands that never touch the backend.
pub fn validate_config(config: &Config, require_credentials: bool) -> Result<()> {
    if config.upload.timeout_secs == 0 {
        anyhow::bail!("upload.timeout_secs cannot be 0");
    }

    if config.reconcile.concurrency == 0 {
        anyhow::bail!("reconcile.concurrency cannot be 0");
    }

    if config.backend.pinata.api_url.trim().is_empty()
        || config.backend.nft_storage.api_url.trim().is_empty()
    {
        anyhow::bail!("backend api_url cannot be empty");
    }

    if require_credentials {
        match config.backend.kind {
            BackendKind::Pinata if !config.backend.pinata.has_credentials() => {
                anyhow::bail!(
                    "Pinata backend selected but no credentials set (set {} and {}, or {})",
                    ENV_PINATA_API_KEY,
                    ENV_PINATA_API_SECRET,
                    ENV_PINATA_JWT
                );
            }
            BackendKind::NftStorage if config.backend.nft_storage.token.is_empty() => {
                anyhow::bail!(
                    "NFT.Storage backend selected but no token set (set {})",
                    ENV_NFT_STORAGE_API_KEY
                );
            }
            _ => {}
        }
    }

    Ok(())
}
