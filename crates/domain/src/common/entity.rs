use serde::{Deserialize, Serialize};

use super::error::NameError;

/// Filter-rule name: 1 to [`wire::MAX_RULE_NAME_LEN`] bytes.
///
/// Names are not unique; delete-by-name removes every rule carrying the
/// name, while anchored insertion binds to the first occurrence. Matching
/// is plain byte equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleName(pub String);

impl RuleName {
    pub fn validate(&self) -> Result<(), NameError> {
        if self.0.is_empty() {
            return Err(NameError::Empty);
        }
        if self.0.len() > wire::MAX_RULE_NAME_LEN {
            return Err(NameError::TooLong {
                len: self.0.len(),
                max: wire::MAX_RULE_NAME_LEN,
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Any,
    Other(u8),
}

impl Protocol {
    /// Convert to the IP protocol number carried on the wire.
    /// Returns 0 for Any (wildcard, IPPROTO_IP).
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Tcp => 6,
            Self::Udp => 17,
            Self::Icmp => 1,
            Self::Any => 0,
            Self::Other(n) => n,
        }
    }

    pub fn from_u8(n: u8) -> Self {
        match n {
            0 => Self::Any,
            1 => Self::Icmp,
            6 => Self::Tcp,
            17 => Self::Udp,
            other => Self::Other(other),
        }
    }
}

/// Packet verdict, doubling as the action of a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Accept,
    Drop,
}

impl Action {
    pub fn to_wire(self) -> u32 {
        match self {
            Self::Accept => wire::ACTION_ACCEPT,
            Self::Drop => wire::ACTION_DROP,
        }
    }

    /// Anything that is not the accept code is treated as drop.
    pub fn from_wire(code: u32) -> Self {
        if code == wire::ACTION_ACCEPT {
            Self::Accept
        } else {
            Self::Drop
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Drop => "drop",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fields of one packet that rule matching and flow keying consume.
/// Addresses are host byte order; ports are 0 for protocols without them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketMeta {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
}
