//! Configuration loader for Switchboard.
//!
//! Reads `config.toml` from the data directory (`~/.switchboard/` by default)
//! into [`SwitchboardConfig`]. A missing or malformed file yields the
//! defaults.

use std::path::{Path, PathBuf};

use switchboard_types::config::SwitchboardConfig;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "SWITCHBOARD_DATA_DIR";

/// Config file name inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Resolve the data directory.
///
/// Priority:
/// 1. `SWITCHBOARD_DATA_DIR`
/// 2. `~/.switchboard`
/// 3. `./.switchboard`
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".switchboard");
    }
    PathBuf::from(".switchboard")
}

/// Load configuration from `{data_dir}/config.toml`.
pub async fn load_config(data_dir: &Path) -> SwitchboardConfig {
    let config_path = data_dir.join(CONFIG_FILE);

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return SwitchboardConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return SwitchboardConfig::default();
        }
    };

    parse_config(&content).unwrap_or_else(|err| {
        tracing::warn!(
            "Failed to parse {}: {err}, using defaults",
            config_path.display()
        );
        SwitchboardConfig::default()
    })
}

/// Parse config text, rejecting values that would stall the engine.
pub fn parse_config(content: &str) -> Result<SwitchboardConfig, String> {
    let config: SwitchboardConfig = toml::from_str(content).map_err(|e| e.to_string())?;
    if config.bus.queue_capacity == 0 {
        return Err("bus.queue_capacity must be at least 1".to_string());
    }
    if config.team.max_iterations == 0 {
        return Err("team.max_iterations must be at least 1".to_string());
    }
    if config.flow.step_ceiling == 0 {
        return Err("flow.step_ceiling must be at least 1".to_string());
    }
    Ok(config)
}
