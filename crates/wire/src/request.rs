//! Request framing.
//!
//! A control message is one `WireRequestHeader` followed by a kind-specific
//! payload: a `WireFilterRule` for `REQ_ADD_IP_RULE`, a `WireNatRule` for
//! `REQ_ADD_NAT_RULE`, a single `u32` for `REQ_SET_ACTION`,
//! `REQ_GET_ALL_IP_LOGS` and `REQ_DEL_NAT_RULE`, and nothing for the list
//! requests and `REQ_DEL_IP_RULE` (the name rides in the header).

use crate::RULE_NAME_BYTES;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireRequestHeader {
    pub kind: u32,
    pub rule_name: [u8; RULE_NAME_BYTES],
}

impl WireRequestHeader {
    pub const SIZE: usize = 16;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut b = [0u8; Self::SIZE];
        b[0..4].copy_from_slice(&self.kind.to_ne_bytes());
        b[4..16].copy_from_slice(&self.rule_name);
        b
    }

    pub fn from_bytes(b: &[u8; Self::SIZE]) -> Self {
        let mut rule_name = [0u8; RULE_NAME_BYTES];
        rule_name.copy_from_slice(&b[4..16]);
        Self {
            kind: u32::from_ne_bytes([b[0], b[1], b[2], b[3]]),
            rule_name,
        }
    }

    /// Size of the payload that follows a header of this kind.
    pub fn payload_len(&self) -> usize {
        match self.kind {
            crate::REQ_ADD_IP_RULE => crate::filter::WireFilterRule::SIZE,
            crate::REQ_ADD_NAT_RULE => crate::nat::WireNatRule::SIZE,
            crate::REQ_SET_ACTION | crate::REQ_GET_ALL_IP_LOGS | crate::REQ_DEL_NAT_RULE => 4,
            _ => 0,
        }
    }
}
