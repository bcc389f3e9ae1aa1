use serde::{Deserialize, Serialize};

use domain::addr::entity::Ipv4Net;
use domain::nat::entity::NatRule;

use super::common::ConfigError;
use super::firewall::PortRangeConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NatRuleConfig {
    /// Origin subnet the rule applies to.
    pub src: String,
    /// Post-SNAT source address.
    pub nat_ip: String,
    pub port_pool: PortRangeConfig,
}

impl NatRuleConfig {
    pub fn to_rule(&self) -> Result<NatRule, ConfigError> {
        let src_net: Ipv4Net = self.src.parse().map_err(|e| ConfigError::Validation {
            field: "nat.rules.src".to_string(),
            message: format!("{e}"),
        })?;
        let nat_net: Ipv4Net = self.nat_ip.parse().map_err(|e| ConfigError::Validation {
            field: "nat.rules.nat_ip".to_string(),
            message: format!("{e}"),
        })?;

        let rule = NatRule::new(
            src_net,
            nat_net.addr,
            self.port_pool.to_range("nat.rules.port_pool")?,
        );
        rule.validate().map_err(|e| ConfigError::Validation {
            field: "nat.rules".to_string(),
            message: e.to_string(),
        })?;
        Ok(rule)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NatConfig {
    #[serde(default)]
    pub rules: Vec<NatRuleConfig>,
}

impl NatConfig {
    pub fn parsed_rules(&self) -> Result<Vec<NatRule>, ConfigError> {
        self.rules.iter().map(NatRuleConfig::to_rule).collect()
    }
}
