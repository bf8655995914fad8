mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./auraflix.toml",
        "~/.config/auraflix/config.toml",
        "/etc/auraflix/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    let mut config = Config::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config)?;
    Ok(config)
}

/// Apply `APP_HOST`, `APP_PORT`, `MEDIA_DIR` and `MAX_VIDEO_UPLOAD_BYTES`.
///
/// `lookup` returns the value of a variable; empty values are ignored, and a
/// ceiling of 0 keeps the configured one.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = get("APP_HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("APP_PORT") {
        config.server.port = port
            .trim()
            .parse()
            .with_context(|| format!("Invalid APP_PORT: {port:?}"))?;
    }
    if let Some(dir) = get("MEDIA_DIR") {
        config.media.root = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
    if let Some(max) = get("MAX_VIDEO_UPLOAD_BYTES") {
        let max: u64 = max
            .trim()
            .parse()
            .with_context(|| format!("Invalid MAX_VIDEO_UPLOAD_BYTES: {max:?}"))?;
        if max > 0 {
            config.media.max_video_upload_bytes = max;
        }
    }

    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.media.chunk_size_bytes == 0 {
        anyhow::bail!("Media chunk size cannot be 0");
    }

    if config.media.max_video_upload_bytes == 0 {
        anyhow::bail!("Maximum video upload size cannot be 0");
    }

    if config.media.root.as_os_str().is_empty() {
        anyhow::bail!("Media root cannot be empty");
    }

    if config.media.root.exists() && !config.media.root.is_dir() {
        anyhow::bail!("Media root is not a directory: {:?}", config.media.root);
    }

    Ok(())
}
