use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::common::entity::Protocol;
use crate::filter::entity::FilterRule;
use crate::nat::entity::NatRule;

use super::CONN_EXPIRES;
use super::entity::{Clock, Flow, FlowKey, FlowRecord, NatKind, NatRecord};

/// Indexed table of live flows.
///
/// Flows live in an ordered map behind a single readers-writer lock;
/// entries are shared (`Arc`) so a looked-up flow stays valid after the
/// guard is gone. Expiry refresh happens on the flow's atomic field under
/// the read guard, so the hot lookup path never takes the writer lock.
pub struct ConnTracker {
    flows: RwLock<BTreeMap<FlowKey, Arc<Flow>>>,
    clock: Arc<dyn Clock>,
}

impl ConnTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            flows: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Deadline `dur` from now, in clock milliseconds.
    pub fn deadline(&self, dur: Duration) -> u64 {
        self.clock.now_ms() + dur.as_millis() as u64
    }

    /// Find the flow for `key` and refresh its idle deadline. Never
    /// creates entries.
    pub fn lookup(&self, key: FlowKey) -> Option<Arc<Flow>> {
        let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
        let flow = flows.get(&key)?.clone();
        flow.refresh(self.deadline(CONN_EXPIRES));
        Some(flow)
    }

    /// Insert `flow` if its key is absent; otherwise the existing entry is
    /// returned untouched. At most one flow per key, always.
    pub fn insert(&self, flow: Flow) -> Arc<Flow> {
        let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
        flows.entry(flow.key()).or_insert_with(|| Arc::new(flow)).clone()
    }

    /// Write the NAT record and kind on an existing entry.
    pub fn set_nat(&self, flow: &Flow, record: NatRecord, kind: NatKind) {
        flow.bind_nat(record, kind);
    }

    /// Refresh the flow's deadline to `dur` from now.
    pub fn extend_expiry(&self, flow: &Flow, dur: Duration) {
        flow.refresh(self.deadline(dur));
    }

    /// Pick a source port from the rule's pool that no source-NAT flow
    /// translated to `rule.nat_ip` is currently using.
    ///
    /// The search starts after the rule's cursor, advances by one modulo
    /// the pool, and gives up after exactly one full revolution, so an
    /// exhausted pool terminates instead of spinning. The scan of live
    /// flows happens under a single read guard.
    pub fn allocate_nat_port(&self, rule: &NatRule) -> Option<u16> {
        let pool = rule.port_pool;
        if pool.validate().is_err() {
            return None;
        }

        let in_use: BTreeSet<u16> = {
            let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
            flows
                .values()
                .filter_map(|flow| {
                    let binding = flow.nat_binding();
                    if binding.kind == NatKind::Source && binding.record.trans_ip == rule.nat_ip {
                        Some(binding.record.trans_port)
                    } else {
                        None
                    }
                })
                .collect()
        };

        let span = pool.span();
        let start = if pool.contains(rule.cursor) {
            if rule.cursor == pool.hi {
                pool.lo
            } else {
                rule.cursor + 1
            }
        } else {
            pool.lo
        };
        let base = u32::from(start - pool.lo);

        for step in 0..span {
            let port = pool.lo + ((base + step) % span) as u16;
            if !in_use.contains(&port) {
                return Some(port);
            }
        }
        None
    }

    /// Remove every flow the rule would match, treating the rule's
    /// protocol as a wildcard. Victims are collected under a read guard
    /// and erased under a write guard, repeating until a pass comes back
    /// clean. Returns the number of flows removed.
    pub fn purge_matching(&self, rule: &FilterRule) -> usize {
        let mut predicate = rule.clone();
        predicate.protocol = Protocol::Any;

        let mut removed = 0;
        loop {
            let victims: Vec<FlowKey> = {
                let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
                flows
                    .values()
                    .filter(|flow| predicate.matches(&flow.meta()))
                    .map(|flow| flow.key())
                    .collect()
            };
            if victims.is_empty() {
                return removed;
            }
            let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
            for key in &victims {
                if flows.remove(key).is_some() {
                    removed += 1;
                }
            }
        }
    }

    /// Remove every flow whose deadline has passed. Same collect-then-
    /// erase pattern as [`ConnTracker::purge_matching`].
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut removed = 0;
        loop {
            let victims: Vec<FlowKey> = {
                let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
                flows
                    .values()
                    .filter(|flow| flow.expires_at() <= now)
                    .map(|flow| flow.key())
                    .collect()
            };
            if victims.is_empty() {
                return removed;
            }
            let mut flows = self.flows.write().unwrap_or_else(PoisonError::into_inner);
            for key in &victims {
                if flows.remove(key).is_some() {
                    removed += 1;
                }
            }
        }
    }

    /// Stable value copy of every flow, in key order.
    pub fn snapshot(&self) -> Vec<FlowRecord> {
        let flows = self.flows.read().unwrap_or_else(PoisonError::into_inner);
        flows.values().map(|flow| flow.record()).collect()
    }

    pub fn len(&self) -> usize {
        self.flows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
