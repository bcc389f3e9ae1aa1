use serde::{Deserialize, Serialize};

use domain::addr::entity::{Ipv4Net, PortRange};
use domain::common::entity::{Action, RuleName};
use domain::filter::entity::FilterRule;

use super::common::{ConfigError, parse_action, parse_protocol};

fn any_net() -> String {
    "0.0.0.0/0".to_string()
}

fn default_action() -> String {
    "accept".to_string()
}

fn max_port() -> u16 {
    65535
}

/// Inclusive port interval as written in YAML; defaults to the full
/// range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortRangeConfig {
    #[serde(default)]
    pub lo: u16,
    #[serde(default = "max_port")]
    pub hi: u16,
}

impl Default for PortRangeConfig {
    fn default() -> Self {
        Self { lo: 0, hi: 65535 }
    }
}

impl PortRangeConfig {
    pub(super) fn to_range(self, field: &str) -> Result<PortRange, ConfigError> {
        let range = PortRange::new(self.lo, self.hi);
        range.validate().map_err(|e| ConfigError::Validation {
            field: field.to_string(),
            message: e.to_string(),
        })?;
        Ok(range)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterRuleConfig {
    pub name: String,
    #[serde(default = "any_net")]
    pub src: String,
    #[serde(default = "any_net")]
    pub dst: String,
    #[serde(default)]
    pub sport: PortRangeConfig,
    #[serde(default)]
    pub dport: PortRangeConfig,
    #[serde(default = "any_protocol")]
    pub protocol: String,
    pub action: String,
    #[serde(default)]
    pub log: bool,
}

fn any_protocol() -> String {
    "any".to_string()
}

impl FilterRuleConfig {
    pub fn to_rule(&self) -> Result<FilterRule, ConfigError> {
        let parse_net = |s: &str, field: &str| -> Result<Ipv4Net, ConfigError> {
            s.parse().map_err(|e| ConfigError::Validation {
                field: field.to_string(),
                message: format!("{e}"),
            })
        };

        let rule = FilterRule {
            name: RuleName(self.name.clone()),
            src_net: parse_net(&self.src, "firewall.rules.src")?,
            dst_net: parse_net(&self.dst, "firewall.rules.dst")?,
            src_ports: self.sport.to_range("firewall.rules.sport")?,
            dst_ports: self.dport.to_range("firewall.rules.dport")?,
            protocol: parse_protocol(&self.protocol, "firewall.rules.protocol")?,
            action: parse_action(&self.action, "firewall.rules.action")?,
            log: self.log,
        };
        rule.validate().map_err(|e| ConfigError::Validation {
            field: "firewall.rules".to_string(),
            message: e.to_string(),
        })?;
        Ok(rule)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FirewallConfig {
    /// Verdict when no rule matches: `accept` or `drop`.
    #[serde(default = "default_action")]
    pub default_action: String,

    /// Rules loaded at startup, in chain order.
    #[serde(default)]
    pub rules: Vec<FilterRuleConfig>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            default_action: default_action(),
            rules: Vec::new(),
        }
    }
}

impl FirewallConfig {
    pub fn parsed_default_action(&self) -> Result<Action, ConfigError> {
        parse_action(&self.default_action, "firewall.default_action")
    }

    pub fn parsed_rules(&self) -> Result<Vec<FilterRule>, ConfigError> {
        self.rules.iter().map(FilterRuleConfig::to_rule).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::common::entity::Protocol;

    fn rule_config(yaml: &str) -> FilterRuleConfig {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn minimal_rule_uses_wildcards() {
        let cfg = rule_config("{ name: blk, action: drop }");
        let rule = cfg.to_rule().unwrap();
        assert_eq!(rule.src_net, Ipv4Net::ANY);
        assert_eq!(rule.dst_net, Ipv4Net::ANY);
        assert!(rule.src_ports.is_any());
        assert_eq!(rule.protocol, Protocol::Any);
        assert_eq!(rule.action, Action::Drop);
        assert!(!rule.log);
    }

    #[test]
    fn full_rule_parses() {
        let cfg = rule_config(
            "{ name: lan, src: 192.168.1.0/24, dst: 10.0.0.1, \
             sport: { lo: 1024, hi: 65535 }, dport: { lo: 80, hi: 80 }, \
             protocol: tcp, action: accept, log: true }",
        );
        let rule = cfg.to_rule().unwrap();
        assert_eq!(rule.src_net.prefix_len(), 24);
        assert_eq!(rule.dst_net.prefix_len(), 32);
        assert_eq!(rule.dst_ports, PortRange::new(80, 80));
        assert_eq!(rule.protocol, Protocol::Tcp);
        assert!(rule.log);
    }

    #[test]
    fn bad_subnet_is_rejected() {
        let cfg = rule_config("{ name: x, src: 300.0.0.1, action: drop }");
        assert!(cfg.to_rule().is_err());
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let cfg = rule_config("{ name: x, dport: { lo: 90, hi: 80 }, action: drop }");
        assert!(cfg.to_rule().is_err());
    }

    #[test]
    fn long_name_is_rejected() {
        let cfg = rule_config("{ name: muchtoolongname, action: drop }");
        assert!(cfg.to_rule().is_err());
    }

    #[test]
    fn default_config_is_accept_with_no_rules() {
        let cfg = FirewallConfig::default();
        assert_eq!(cfg.parsed_default_action().unwrap(), Action::Accept);
        assert!(cfg.parsed_rules().unwrap().is_empty());
    }
}
