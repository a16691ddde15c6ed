//! Config file discovery and loading.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::types::HookConfig;

/// File name looked up beside the executable when no path is given.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// A configuration and the file it came from (`None` for built-in defaults).
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: HookConfig,
    pub source: Option<PathBuf>,
}

/// Load the hook configuration.
///
/// An explicit `path` must exist. Without one, `config.json` beside the
/// executable is used when present, and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                anyhow::bail!("Configuration file not found: {}", p.display());
            }
            Some(p.to_path_buf())
        }
        None => default_config_path().filter(|p| p.exists()),
    };

    match config_path {
        Some(p) => {
            let config = read_config(&p)?;
            Ok(LoadedConfig {
                config,
                source: Some(p),
            })
        }
        None => Ok(LoadedConfig {
            config: HookConfig::default(),
            source: None,
        }),
    }
}

fn default_config_path() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(CONFIG_FILE_NAME))
}

fn read_config(path: &Path) -> Result<HookConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
    let config: HookConfig = serde_json::from_str(&content)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}
