//! Global configuration types for Switchboard.
//!
//! `SwitchboardConfig` represents the top-level `config.toml` that controls
//! event queue sizing, coordination ceilings, tool instrumentation, and
//! optional event persistence.

use serde::{Deserialize, Serialize};

/// Top-level configuration. All fields have sensible defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchboardConfig {
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub team: TeamConfig,
    #[serde(default)]
    pub flow: FlowConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// What the bus does when its queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// `emit_event` waits for free capacity.
    #[default]
    Block,
    /// The incoming event is dropped and counted.
    DropNewest,
}

/// Event bus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// Team coordination settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Hard ceiling on supervisor iterations per team run.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    10
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Top-level flow settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Maximum routing steps per flow run.
    #[serde(default = "default_step_ceiling")]
    pub step_ceiling: u32,
}

fn default_step_ceiling() -> u32 {
    25
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            step_ceiling: default_step_ceiling(),
        }
    }
}

/// Agent execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum LLM round trips spent on tool calls in one execution.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,
    /// Characters kept in `tool_result` previews.
    #[serde(default = "default_tool_preview_chars")]
    pub tool_preview_chars: usize,
}

fn default_max_tool_rounds() -> u32 {
    8
}

fn default_tool_preview_chars() -> usize {
    500
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            tool_preview_chars: default_tool_preview_chars(),
        }
    }
}

/// Local event persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub enabled: bool,
    /// SQLite URL; defaults to `{data_dir}/events.db` when unset.
    #[serde(default)]
    pub database_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default_values() {
        let config = SwitchboardConfig::default();
        assert_eq!(config.bus.queue_capacity, 1024);
        assert_eq!(config.bus.overflow, OverflowPolicy::Block);
        assert_eq!(config.team.max_iterations, 10);
        assert_eq!(config.flow.step_ceiling, 25);
        assert_eq!(config.agent.max_tool_rounds, 8);
        assert_eq!(config.agent.tool_preview_chars, 500);
        assert!(!config.persistence.enabled);
    }

    #[test]
    fn test_config_deserialize_empty_uses_defaults() {
        let config: SwitchboardConfig = toml::from_str("").unwrap();
        assert_eq!(config, SwitchboardConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial_sections() {
        let toml_str = r#"
[bus]
queue_capacity = 64
overflow = "drop_newest"

[team]
max_iterations = 3

[persistence]
enabled = true
database_url = "sqlite://events.db"
"#;
        let config: SwitchboardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.bus.queue_capacity, 64);
        assert_eq!(config.bus.overflow, OverflowPolicy::DropNewest);
        assert_eq!(config.team.max_iterations, 3);
        assert_eq!(config.flow.step_ceiling, 25);
        assert!(config.persistence.enabled);
        assert_eq!(
            config.persistence.database_url.as_deref(),
            Some("sqlite://events.db")
        );
    }
}
