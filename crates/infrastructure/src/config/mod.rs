//! Daemon configuration: structs, parsing, and validation.
//!
//! Split across sub-modules:
//! - `common`: shared helpers, `ConfigError`, log level/format
//! - `firewall`: filter rules and the default action
//! - `nat`: SNAT rules

mod common;
mod firewall;
mod nat;

pub use common::{ConfigError, LogFormat, LogLevel};
pub use firewall::{FilterRuleConfig, FirewallConfig, PortRangeConfig};
pub use nat::{NatConfig, NatRuleConfig};

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CONTROL_SOCKET, MAX_CONFIG_FILTER_RULES, MAX_CONFIG_NAT_RULES};
use common::check_limit;

fn default_control_socket() -> String {
    DEFAULT_CONTROL_SOCKET.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentSection {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Unix socket the control plane listens on.
    #[serde(default = "default_control_socket")]
    pub control_socket: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            log_format: LogFormat::default(),
            control_socket: default_control_socket(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub firewall: FirewallConfig,

    #[serde(default)]
    pub nat: NatConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            agent: AgentSection::default(),
            firewall: FirewallConfig::default(),
            nat: NatConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load config from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string and validate it.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural validation: collection limits and that every rule
    /// actually parses into its domain form.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_limit(
            "firewall.rules",
            self.firewall.rules.len(),
            MAX_CONFIG_FILTER_RULES,
        )?;
        check_limit("nat.rules", self.nat.rules.len(), MAX_CONFIG_NAT_RULES)?;

        self.firewall.parsed_default_action()?;
        self.firewall.parsed_rules()?;
        self.nat.parsed_rules()?;

        if self.agent.control_socket.is_empty() {
            return Err(ConfigError::Validation {
                field: "agent.control_socket".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::common::entity::Action;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = AgentConfig::from_yaml("{}").unwrap();
        assert_eq!(config.agent.log_level, LogLevel::Info);
        assert_eq!(config.agent.control_socket, DEFAULT_CONTROL_SOCKET);
        assert!(config.firewall.rules.is_empty());
        assert!(config.nat.rules.is_empty());
    }

    #[test]
    fn full_config_parses() {
        let yaml = r#"
agent:
  log_level: debug
  log_format: json
  control_socket: /tmp/flowgate.sock
firewall:
  default_action: drop
  rules:
    - name: lan
      src: 192.168.1.0/24
      protocol: tcp
      action: accept
      log: true
nat:
  rules:
    - src: 192.168.1.0/24
      nat_ip: 203.0.113.5
      port_pool: { lo: 40000, hi: 60000 }
"#;
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.agent.log_level, LogLevel::Debug);
        assert_eq!(
            config.firewall.parsed_default_action().unwrap(),
            Action::Drop
        );
        assert_eq!(config.firewall.parsed_rules().unwrap().len(), 1);
        assert_eq!(config.nat.parsed_rules().unwrap().len(), 1);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(AgentConfig::from_yaml("bogus_section: {}").is_err());
    }

    #[test]
    fn invalid_rule_fails_validation() {
        let yaml = r#"
firewall:
  rules:
    - name: badrulename0  # 12 bytes, one over the limit
      action: drop
"#;
        assert!(AgentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn invalid_default_action_fails_validation() {
        let yaml = "firewall: { default_action: maybe }";
        assert!(AgentConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn empty_socket_path_fails_validation() {
        let yaml = "agent: { control_socket: \"\" }";
        assert!(AgentConfig::from_yaml(yaml).is_err());
    }
}
