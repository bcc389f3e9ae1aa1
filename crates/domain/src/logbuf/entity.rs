use serde::{Deserialize, Serialize};

use wire::log::WireLogRecord;

use crate::common::entity::{Action, PacketMeta};

/// One filtering decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Unix timestamp, seconds.
    pub ts: i64,
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: u8,
    /// IP payload length: total length minus header length.
    pub payload_len: u32,
    pub verdict: Action,
}

impl LogRecord {
    pub fn new(ts: i64, meta: &PacketMeta, payload_len: u32, verdict: Action) -> Self {
        Self {
            ts,
            src_ip: meta.src_ip,
            dst_ip: meta.dst_ip,
            src_port: meta.src_port,
            dst_port: meta.dst_port,
            protocol: meta.protocol,
            payload_len,
            verdict,
        }
    }

    pub fn to_wire(&self) -> WireLogRecord {
        WireLogRecord {
            tm: self.ts,
            saddr: self.src_ip,
            daddr: self.dst_ip,
            sport: self.src_port,
            dport: self.dst_port,
            protocol: self.protocol,
            _pad: [0; 3],
            len: self.payload_len,
            action: self.verdict.to_wire(),
        }
    }
}
