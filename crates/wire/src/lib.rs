//! Control-plane ABI shared between the engine and admin clients.
//!
//! Every struct here is `#[repr(C)]` with explicit padding and travels over
//! the control socket in native byte order, one fixed-size record per array
//! element. Encoding is done with safe field-by-field copies; layout is
//! pinned by size/offset tests in each module.

#![forbid(unsafe_code)]

pub mod conn;
pub mod filter;
pub mod log;
pub mod nat;
pub mod request;
pub mod response;

// ── Request kinds ───────────────────────────────────────────────────

pub const REQ_GET_ALL_IP_RULES: u32 = 1;
pub const REQ_ADD_IP_RULE: u32 = 2;
pub const REQ_DEL_IP_RULE: u32 = 3;
pub const REQ_SET_ACTION: u32 = 4;
pub const REQ_GET_ALL_IP_LOGS: u32 = 5;
pub const REQ_GET_ALL_CONNS: u32 = 6;
pub const REQ_ADD_NAT_RULE: u32 = 7;
pub const REQ_DEL_NAT_RULE: u32 = 8;
pub const REQ_GET_NAT_RULES: u32 = 9;

// ── Response body types ─────────────────────────────────────────────

pub const RSP_HEAD_ONLY: u32 = 10;
pub const RSP_MSG: u32 = 11;
pub const RSP_IP_RULES: u32 = 12;
pub const RSP_IP_LOGS: u32 = 13;
pub const RSP_NAT_RULES: u32 = 14;
pub const RSP_CONN_LOGS: u32 = 15;

// ── Verdict codes (netfilter numbering) ─────────────────────────────

pub const ACTION_DROP: u32 = 0;
pub const ACTION_ACCEPT: u32 = 1;

// ── NAT kinds ───────────────────────────────────────────────────────

pub const NAT_TYPE_NO: u32 = 0;
pub const NAT_TYPE_SRC: u32 = 1;
pub const NAT_TYPE_DEST: u32 = 2;

// ── Limits ──────────────────────────────────────────────────────────

/// Maximum filter-rule name length, excluding the NUL terminator.
pub const MAX_RULE_NAME_LEN: usize = 11;

/// On-wire width of the rule-name field (name + NUL).
pub const RULE_NAME_BYTES: usize = MAX_RULE_NAME_LEN + 1;

/// Hard cap on any single control-plane message body.
pub const MAX_PAYLOAD: usize = 1024 * 256;

/// Pack a rule name into the fixed NUL-padded wire field.
///
/// Names longer than [`MAX_RULE_NAME_LEN`] bytes are truncated; callers are
/// expected to have validated the length already.
pub fn encode_rule_name(name: &str) -> [u8; RULE_NAME_BYTES] {
    let mut field = [0u8; RULE_NAME_BYTES];
    let bytes = name.as_bytes();
    let n = bytes.len().min(MAX_RULE_NAME_LEN);
    field[..n].copy_from_slice(&bytes[..n]);
    field
}

/// Read a rule name from the wire field, stopping at the first NUL.
pub fn decode_rule_name(field: &[u8; RULE_NAME_BYTES]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
