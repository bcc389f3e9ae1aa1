use serde::{Deserialize, Serialize};

use wire::nat::WireNatRule;

use crate::addr::entity::{Ipv4Net, PortRange};

use super::error::NatError;

/// Source-NAT rule: traffic originating in `src_net` leaves with source
/// address `nat_ip` and a source port drawn from `port_pool`.
///
/// `cursor` remembers where the last port search ended so allocation walks
/// the pool round-robin instead of re-probing the low end every time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRule {
    pub src_net: Ipv4Net,
    pub nat_ip: u32,
    pub port_pool: PortRange,
    pub cursor: u16,
}

impl NatRule {
    pub fn new(src_net: Ipv4Net, nat_ip: u32, port_pool: PortRange) -> Self {
        Self {
            src_net,
            nat_ip,
            port_pool,
            cursor: 0,
        }
    }

    pub fn validate(&self) -> Result<(), NatError> {
        self.port_pool
            .validate()
            .map_err(|_| NatError::InvalidPortPool {
                lo: self.port_pool.lo,
                hi: self.port_pool.hi,
            })
    }

    pub fn to_wire(&self) -> WireNatRule {
        WireNatRule {
            saddr: self.src_net.addr,
            smask: self.src_net.mask,
            daddr: self.nat_ip,
            sport: self.port_pool.lo,
            dport: self.port_pool.hi,
            now_port: self.cursor,
            _pad: [0; 2],
        }
    }

    pub fn from_wire(entry: &WireNatRule) -> Result<Self, NatError> {
        let rule = Self {
            src_net: Ipv4Net::new(entry.saddr, entry.smask),
            nat_ip: entry.daddr,
            port_pool: PortRange::new(entry.sport, entry.dport),
            cursor: entry.now_port,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_ok() {
        let rule = NatRule::new(
            "192.168.1.0/24".parse().unwrap(),
            0xCB00_7105,
            PortRange::new(40000, 60000),
        );
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn validate_inverted_pool() {
        let rule = NatRule::new(
            "192.168.1.0/24".parse().unwrap(),
            0xCB00_7105,
            PortRange::new(60000, 40000),
        );
        assert!(rule.validate().is_err());
    }

    #[test]
    fn wire_roundtrip() {
        let mut rule = NatRule::new(
            "192.168.1.0/24".parse().unwrap(),
            0xCB00_7105,
            PortRange::new(40000, 40001),
        );
        rule.cursor = 40000;
        assert_eq!(NatRule::from_wire(&rule.to_wire()).unwrap(), rule);
    }

    #[test]
    fn from_wire_rejects_inverted_pool() {
        let entry = WireNatRule {
            saddr: 0,
            smask: 0,
            daddr: 1,
            sport: 9,
            dport: 3,
            now_port: 0,
            _pad: [0; 2],
        };
        assert!(NatRule::from_wire(&entry).is_err());
    }
}
