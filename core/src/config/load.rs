use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default data directory: ~/.incidentops
pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".incidentops"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.incidentops/config.toml (highest)
    let user_config = get_data_dir()?.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let cfg = if user_config.exists() {
        read_file(&user_config)?
    } else if local_config.exists() {
        read_file(local_config)?
    } else {
        AppConfig::default()
    };

    Ok(apply_env_overrides(cfg))
}

/// Load an explicit config file; a missing file is an error here.
pub fn load_from(path: &Path) -> anyhow::Result<AppConfig> {
    Ok(apply_env_overrides(read_file(path)?))
}

fn read_file(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("failed to parse {}: {e}", path.display()))
}

// Environment variable overrides (Priority 0: highest)
fn apply_env_overrides(mut cfg: AppConfig) -> AppConfig {
    if let Ok(v) = std::env::var("RABBIT_URL") {
        if !v.trim().is_empty() {
            cfg.bus.url = v;
        }
    }
    if let Ok(v) = std::env::var("INCIDENTOPS_LOG_LEVEL") {
        if !v.trim().is_empty() {
            cfg.logging.level = v;
        }
    }
    cfg
}
