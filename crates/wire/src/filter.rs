//! Filter-rule wire record.

use crate::{RULE_NAME_BYTES, decode_rule_name, encode_rule_name};

/// One filter rule as it travels in an `RSP_IP_RULES` array or an
/// `REQ_ADD_IP_RULE` payload.
///
/// Port ranges use the packed `(lo << 16) | hi` encoding; `0` is reserved
/// by clients as shorthand for "any" and is expanded before it reaches the
/// engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFilterRule {
    pub name: [u8; RULE_NAME_BYTES],
    /// Source network address, host byte order.
    pub saddr: u32,
    pub smask: u32,
    /// Destination network address, host byte order.
    pub daddr: u32,
    pub dmask: u32,
    /// Packed source port range.
    pub sports: u32,
    /// Packed destination port range.
    pub dports: u32,
    /// IP protocol number; 0 matches any.
    pub protocol: u8,
    pub _pad: [u8; 3],
    /// `ACTION_ACCEPT` or `ACTION_DROP`.
    pub action: u32,
    /// Non-zero when matches are logged.
    pub log: u32,
}

impl WireFilterRule {
    pub const SIZE: usize = 48;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut b = [0u8; Self::SIZE];
        b[0..12].copy_from_slice(&self.name);
        b[12..16].copy_from_slice(&self.saddr.to_ne_bytes());
        b[16..20].copy_from_slice(&self.smask.to_ne_bytes());
        b[20..24].copy_from_slice(&self.daddr.to_ne_bytes());
        b[24..28].copy_from_slice(&self.dmask.to_ne_bytes());
        b[28..32].copy_from_slice(&self.sports.to_ne_bytes());
        b[32..36].copy_from_slice(&self.dports.to_ne_bytes());
        b[36] = self.protocol;
        b[40..44].copy_from_slice(&self.action.to_ne_bytes());
        b[44..48].copy_from_slice(&self.log.to_ne_bytes());
        b
    }

    pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
        let mut name = [0u8; RULE_NAME_BYTES];
        name.copy_from_slice(&b[0..12]);
        Self {
            name,
            saddr: u32::from_ne_bytes([b[12], b[13], b[14], b[15]]),
            smask: u32::from_ne_bytes([b[16], b[17], b[18], b[19]]),
            daddr: u32::from_ne_bytes([b[20], b[21], b[22], b[23]]),
            dmask: u32::from_ne_bytes([b[24], b[25], b[26], b[27]]),
            sports: u32::from_ne_bytes([b[28], b[29], b[30], b[31]]),
            dports: u32::from_ne_bytes([b[32], b[33], b[34], b[35]]),
            protocol: b[36],
            _pad: [0; 3],
            action: u32::from_ne_bytes([b[40], b[41], b[42], b[43]]),
            log: u32::from_ne_bytes([b[44], b[45], b[46], b[47]]),
        }
    }

    pub fn name_str(&self) -> String {
        decode_rule_name(&self.name)
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = encode_rule_name(name);
    }
}
