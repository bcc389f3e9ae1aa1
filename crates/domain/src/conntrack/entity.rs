use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use wire::conn::WireConnRecord;
use wire::nat::WireNatRule;

use crate::common::entity::PacketMeta;

/// Flow identity: the 4-tuple. Field order gives the lexicographic
/// ordering the tracker's map relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FlowKey {
    pub src_ip: u32,
    pub dst_ip: u32,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowKey {
    pub fn new(src_ip: u32, dst_ip: u32, src_port: u16, dst_port: u16) -> Self {
        Self {
            src_ip,
            dst_ip,
            src_port,
            dst_port,
        }
    }

    pub fn from_meta(meta: &PacketMeta) -> Self {
        Self::new(meta.src_ip, meta.dst_ip, meta.src_port, meta.dst_port)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NatKind {
    #[default]
    None,
    Source,
    Destination,
}

impl NatKind {
    pub fn to_wire(self) -> u32 {
        match self {
            Self::None => wire::NAT_TYPE_NO,
            Self::Source => wire::NAT_TYPE_SRC,
            Self::Destination => wire::NAT_TYPE_DEST,
        }
    }

    pub fn from_wire(code: u32) -> Self {
        match code {
            wire::NAT_TYPE_SRC => Self::Source,
            wire::NAT_TYPE_DEST => Self::Destination,
            _ => Self::None,
        }
    }
}

/// One address translation.
///
/// For a source-NAT flow this maps the original source endpoint to the
/// translated one; the sibling destination-NAT flow carries the inverse
/// mapping for the return path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatRecord {
    pub orig_ip: u32,
    pub orig_port: u16,
    pub trans_ip: u32,
    pub trans_port: u16,
}

impl NatRecord {
    pub fn new(orig_ip: u32, orig_port: u16, trans_ip: u32, trans_port: u16) -> Self {
        Self {
            orig_ip,
            orig_port,
            trans_ip,
            trans_port,
        }
    }

    pub fn to_wire(&self) -> WireNatRule {
        WireNatRule {
            saddr: self.orig_ip,
            smask: 0,
            daddr: self.trans_ip,
            sport: self.orig_port,
            dport: self.trans_port,
            now_port: 0,
            _pad: [0; 2],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NatBinding {
    pub kind: NatKind,
    pub record: NatRecord,
}

/// A live tracker entry.
///
/// `expires_at` is refreshed by concurrent readers, so it is an atomic and
/// every refresh is a `fetch_max`: a 7-second touch can never shorten the
/// 70-second deadline a NAT flow already holds, and observed deadlines are
/// monotone non-decreasing.
#[derive(Debug)]
pub struct Flow {
    key: FlowKey,
    protocol: u8,
    needs_log: bool,
    expires_at: AtomicU64,
    nat: RwLock<NatBinding>,
}

impl Flow {
    pub fn new(key: FlowKey, protocol: u8, needs_log: bool, expires_at_ms: u64) -> Self {
        Self {
            key,
            protocol,
            needs_log,
            expires_at: AtomicU64::new(expires_at_ms),
            nat: RwLock::new(NatBinding::default()),
        }
    }

    pub fn with_nat(
        key: FlowKey,
        protocol: u8,
        needs_log: bool,
        expires_at_ms: u64,
        kind: NatKind,
        record: NatRecord,
    ) -> Self {
        Self {
            key,
            protocol,
            needs_log,
            expires_at: AtomicU64::new(expires_at_ms),
            nat: RwLock::new(NatBinding { kind, record }),
        }
    }

    pub fn key(&self) -> FlowKey {
        self.key
    }

    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    pub fn needs_log(&self) -> bool {
        self.needs_log
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at.load(Ordering::Acquire)
    }

    /// Raise the deadline to `deadline_ms` if it is later than the current
    /// one. Lower values are ignored.
    pub fn refresh(&self, deadline_ms: u64) {
        self.expires_at.fetch_max(deadline_ms, Ordering::AcqRel);
    }

    pub fn nat_binding(&self) -> NatBinding {
        *self.nat.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn bind_nat(&self, record: NatRecord, kind: NatKind) {
        let mut guard = self.nat.write().unwrap_or_else(PoisonError::into_inner);
        *guard = NatBinding { kind, record };
    }

    pub fn meta(&self) -> PacketMeta {
        PacketMeta {
            src_ip: self.key.src_ip,
            dst_ip: self.key.dst_ip,
            src_port: self.key.src_port,
            dst_port: self.key.dst_port,
            protocol: self.protocol,
        }
    }

    /// Value snapshot for the control plane.
    pub fn record(&self) -> FlowRecord {
        let binding = self.nat_binding();
        FlowRecord {
            key: self.key,
            protocol: self.protocol,
            nat_kind: binding.kind,
            nat: binding.record,
        }
    }
}

/// Control-plane view of one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub key: FlowKey,
    pub protocol: u8,
    pub nat_kind: NatKind,
    pub nat: NatRecord,
}

impl FlowRecord {
    pub fn to_wire(&self) -> WireConnRecord {
        WireConnRecord {
            saddr: self.key.src_ip,
            daddr: self.key.dst_ip,
            sport: self.key.src_port,
            dport: self.key.dst_port,
            protocol: self.protocol,
            _pad: [0; 3],
            nat_type: self.nat_kind.to_wire(),
            nat: self.nat.to_wire(),
        }
    }
}

/// Time source for expiry bookkeeping, in monotonic milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Production clock: milliseconds since construction.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
