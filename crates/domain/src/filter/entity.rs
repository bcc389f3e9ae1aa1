use serde::{Deserialize, Serialize};

use wire::filter::WireFilterRule;

use crate::addr::entity::{Ipv4Net, PortRange};
use crate::common::entity::{Action, PacketMeta, Protocol, RuleName};

use super::error::FilterError;

/// One entry of the filter chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub name: RuleName,
    pub src_net: Ipv4Net,
    pub dst_net: Ipv4Net,
    pub src_ports: PortRange,
    pub dst_ports: PortRange,
    pub protocol: Protocol,
    pub action: Action,
    pub log: bool,
}

impl FilterRule {
    /// A rule matching every packet. Used as the purge predicate when the
    /// default action flips to drop.
    pub fn wildcard() -> Self {
        Self {
            name: RuleName("*".to_string()),
            src_net: Ipv4Net::ANY,
            dst_net: Ipv4Net::ANY,
            src_ports: PortRange::ANY,
            dst_ports: PortRange::ANY,
            protocol: Protocol::Any,
            action: Action::Drop,
            log: false,
        }
    }

    pub fn validate(&self) -> Result<(), FilterError> {
        self.name
            .validate()
            .map_err(|e| FilterError::InvalidName {
                reason: e.to_string(),
            })?;
        for range in [&self.src_ports, &self.dst_ports] {
            range.validate().map_err(|_| FilterError::InvalidPortRange {
                lo: range.lo,
                hi: range.hi,
            })?;
        }
        Ok(())
    }

    /// First-match predicate: source net, destination net, both port
    /// ranges, and protocol (Any matches everything) must all hold.
    pub fn matches(&self, meta: &PacketMeta) -> bool {
        self.src_net.contains(meta.src_ip)
            && self.dst_net.contains(meta.dst_ip)
            && self.src_ports.contains(meta.src_port)
            && self.dst_ports.contains(meta.dst_port)
            && (self.protocol == Protocol::Any || self.protocol.to_u8() == meta.protocol)
    }

    pub fn to_wire(&self) -> WireFilterRule {
        WireFilterRule {
            name: wire::encode_rule_name(self.name.as_str()),
            saddr: self.src_net.addr,
            smask: self.src_net.mask,
            daddr: self.dst_net.addr,
            dmask: self.dst_net.mask,
            sports: self.src_ports.pack(),
            dports: self.dst_ports.pack(),
            protocol: self.protocol.to_u8(),
            _pad: [0; 3],
            action: self.action.to_wire(),
            log: u32::from(self.log),
        }
    }

    pub fn from_wire(entry: &WireFilterRule) -> Result<Self, FilterError> {
        let rule = Self {
            name: RuleName(entry.name_str()),
            src_net: Ipv4Net::new(entry.saddr, entry.smask),
            dst_net: Ipv4Net::new(entry.daddr, entry.dmask),
            src_ports: PortRange::unpack(entry.sports),
            dst_ports: PortRange::unpack(entry.dports),
            protocol: Protocol::from_u8(entry.protocol),
            action: Action::from_wire(entry.action),
            log: entry.log != 0,
        };
        rule.validate()?;
        Ok(rule)
    }
}
