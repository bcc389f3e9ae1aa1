use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use domain::addr::entity::fmt_ip;
use domain::common::entity::{Action, PacketMeta};
use domain::common::error::DomainError;
use domain::conntrack::entity::{Clock, Flow, FlowKey, FlowRecord, MonotonicClock, NatKind, NatRecord};
use domain::conntrack::table::ConnTracker;
use domain::conntrack::{CONN_EXPIRES, CONN_NAT_TIMES};
use domain::filter::chain::FilterChain;
use domain::filter::entity::FilterRule;
use domain::logbuf::buffer::LogBuffer;
use domain::logbuf::entity::LogRecord;
use domain::nat::chain::NatChain;
use domain::nat::entity::NatRule;
use domain::packet::Ipv4PacketMut;

/// The engine singleton: both rule chains, the connection tracker, the
/// decision log, and the process-wide default action.
///
/// Each structure carries its own lock. Hook stages take the chain locks
/// only for the duration of a match and never call into the tracker while
/// holding one, so rule mutations (which purge the tracker after releasing
/// the chain lock) cannot deadlock against the data path.
pub struct Engine {
    filter: RwLock<FilterChain>,
    nat: RwLock<NatChain>,
    tracker: ConnTracker,
    logs: Mutex<LogBuffer>,
    default_action: AtomicU32,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            filter: RwLock::new(FilterChain::new()),
            nat: RwLock::new(NatChain::new()),
            tracker: ConnTracker::new(clock),
            logs: Mutex::new(LogBuffer::new()),
            default_action: AtomicU32::new(Action::Accept.to_wire()),
        }
    }

    pub fn tracker(&self) -> &ConnTracker {
        &self.tracker
    }

    pub fn default_action(&self) -> Action {
        Action::from_wire(self.default_action.load(Ordering::Acquire))
    }

    /// Set the process-wide default verdict. Flipping to drop invalidates
    /// every cached flow so nothing rides a stale accept. Returns the
    /// number of flows purged.
    pub fn set_default_action(&self, action: Action) -> usize {
        self.default_action.store(action.to_wire(), Ordering::Release);
        if action == Action::Drop {
            let purged = self.tracker.purge_matching(&FilterRule::wildcard());
            debug!(purged, "default action set to drop");
            purged
        } else {
            0
        }
    }

    // ── Filter-rule operations ──────────────────────────────────────

    /// Insert a rule after the named anchor (empty anchor = head). A drop
    /// rule purges matching cached flows once the chain lock is released.
    pub fn add_filter_rule(&self, anchor: &str, rule: FilterRule) -> Result<(), DomainError> {
        {
            let mut chain = self.filter_write();
            chain.add_after(anchor, rule.clone())?;
        }
        if rule.action == Action::Drop {
            let purged = self.tracker.purge_matching(&rule);
            debug!(rule = %rule.name, purged, "purged cached flows for new drop rule");
        }
        Ok(())
    }

    /// Remove every rule with the given name, purging cached flows per
    /// removed rule. Returns the number of rules removed.
    pub fn delete_filter_rules(&self, name: &str) -> usize {
        let removed = {
            let mut chain = self.filter_write();
            chain.delete_by_name(name)
        };
        for rule in &removed {
            self.tracker.purge_matching(rule);
        }
        removed.len()
    }

    /// Replace the whole filter chain (startup seeding).
    pub fn reload_filter_rules(&self, rules: Vec<FilterRule>) -> Result<(), DomainError> {
        let mut chain = self.filter_write();
        chain.reload(rules)?;
        Ok(())
    }

    pub fn filter_rules(&self) -> Vec<FilterRule> {
        self.filter_read().snapshot()
    }

    // ── NAT-rule operations ─────────────────────────────────────────

    pub fn add_nat_rule(&self, rule: NatRule) -> Result<(), DomainError> {
        rule.validate().map_err(DomainError::from)?;
        self.nat_write().append(rule);
        Ok(())
    }

    /// Remove the NAT rule at `index`; returns 1 on success, 0 when out
    /// of bounds.
    pub fn delete_nat_rule(&self, index: usize) -> usize {
        self.nat_write().delete_at(index)
    }

    pub fn nat_rules(&self) -> Vec<NatRule> {
        self.nat_read().snapshot()
    }

    // ── Read-side state for the control plane ───────────────────────

    pub fn connections(&self) -> Vec<FlowRecord> {
        self.tracker.snapshot()
    }

    pub fn logs(&self, newest: usize) -> Vec<LogRecord> {
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(newest)
    }

    // ── Hook stages ─────────────────────────────────────────────────

    /// Shared filter stage, run at both the pre-routing and post-routing
    /// hook points.
    ///
    /// A tracker hit short-circuits to accept without re-running rule
    /// matching; a miss walks the chain, falls back to the default
    /// action, and caches the flow on accept.
    pub fn hook_filter(&self, buf: &mut [u8]) -> Action {
        let pkt = match Ipv4PacketMut::new(buf) {
            Ok(pkt) => pkt,
            Err(e) => {
                warn!(error = %e, "unparseable packet at filter hook");
                return Action::Accept;
            }
        };
        let meta = pkt.meta();
        let payload_len = pkt.payload_len();
        let key = FlowKey::from_meta(&meta);

        if let Some(flow) = self.tracker.lookup(key) {
            if flow.needs_log() {
                self.append_log(&meta, payload_len, Action::Accept);
            }
            return Action::Accept;
        }

        let (verdict, needs_log) = {
            let chain = self.filter_read();
            match chain.match_packet(&meta) {
                Some(rule) => {
                    debug!(rule = %rule.name, action = %rule.action, "filter rule matched");
                    (rule.action, rule.log)
                }
                None => (self.default_action(), false),
            }
        };
        if needs_log {
            self.append_log(&meta, payload_len, verdict);
        }

        if verdict == Action::Accept {
            let deadline = self.tracker.deadline(CONN_EXPIRES);
            self.tracker
                .insert(Flow::new(key, meta.protocol, needs_log, deadline));
        }
        verdict
    }

    /// Ingress DNAT stage: rewrite the destination of return traffic that
    /// carries a destination-NAT binding. Flows without one pass through
    /// untouched.
    pub fn hook_nat_in(&self, buf: &mut [u8]) -> Action {
        let mut pkt = match Ipv4PacketMut::new(buf) {
            Ok(pkt) => pkt,
            Err(e) => {
                warn!(error = %e, "unparseable packet at DNAT hook");
                return Action::Accept;
            }
        };
        let key = FlowKey::from_meta(&pkt.meta());

        let Some(flow) = self.tracker.lookup(key) else {
            // An unknown ingress flow has no DNAT state; the filter stage
            // decides its fate.
            return Action::Accept;
        };
        let binding = flow.nat_binding();
        if binding.kind != NatKind::Destination {
            return Action::Accept;
        }

        pkt.rewrite_dst(binding.record.trans_ip, binding.record.trans_port);
        Action::Accept
    }

    /// Egress SNAT stage: reuse the flow's source-NAT binding or establish
    /// one from the NAT chain, keep the reverse DNAT sibling alive, then
    /// rewrite the source endpoint. Every failure path accepts the packet
    /// without translation; the filter verdict is never degraded here.
    pub fn hook_nat_out(&self, buf: &mut [u8]) -> Action {
        let mut pkt = match Ipv4PacketMut::new(buf) {
            Ok(pkt) => pkt,
            Err(e) => {
                warn!(error = %e, "unparseable packet at SNAT hook");
                return Action::Accept;
            }
        };
        let meta = pkt.meta();
        let key = FlowKey::from_meta(&meta);

        let Some(conn) = self.tracker.lookup(key) else {
            // The filter stage creates flows; a miss here means the packet
            // was never accepted and must not be translated.
            return Action::Accept;
        };

        let binding = conn.nat_binding();
        let record = if binding.kind == NatKind::Source {
            binding.record
        } else {
            let matched = {
                let chain = self.nat_read();
                chain.match_src(meta.src_ip).map(|(idx, rule)| (idx, *rule))
            };
            let Some((idx, rule)) = matched else {
                return Action::Accept;
            };

            let new_port = if meta.src_port != 0 {
                match self.tracker.allocate_nat_port(&rule) {
                    Some(port) => port,
                    None => {
                        warn!(
                            nat_ip = %fmt_ip(rule.nat_ip),
                            "NAT port pool exhausted, sending without translation"
                        );
                        return Action::Accept;
                    }
                }
            } else {
                0
            };

            let record = NatRecord::new(meta.src_ip, meta.src_port, rule.nat_ip, new_port);
            self.tracker.set_nat(&conn, record, NatKind::Source);
            if new_port != 0 {
                self.nat_write().set_cursor(idx, new_port);
            }
            record
        };

        // Reverse mapping for the return path, keyed by the tuple the
        // peer will answer to.
        let sibling_key = FlowKey::new(meta.dst_ip, record.trans_ip, meta.dst_port, record.trans_port);
        let reverse = NatRecord::new(
            record.trans_ip,
            record.trans_port,
            record.orig_ip,
            record.orig_port,
        );
        let nat_deadline = self.tracker.deadline(CONN_EXPIRES * CONN_NAT_TIMES);
        let sibling = self.tracker.insert(Flow::with_nat(
            sibling_key,
            meta.protocol,
            false,
            nat_deadline,
            NatKind::Destination,
            reverse,
        ));
        let sibling_binding = sibling.nat_binding();
        if sibling_binding.kind != NatKind::Destination || sibling_binding.record != reverse {
            // Port collision: an unrelated flow already owns the return
            // tuple and its translation governs.
            warn!(
                key = %fmt_ip(sibling_key.src_ip),
                "return-tuple collision, sending without translation"
            );
            return Action::Accept;
        }

        self.tracker.extend_expiry(&conn, CONN_EXPIRES * CONN_NAT_TIMES);
        self.tracker
            .extend_expiry(&sibling, CONN_EXPIRES * CONN_NAT_TIMES);

        pkt.rewrite_src(record.trans_ip, record.trans_port);
        Action::Accept
    }

    // ── Internals ───────────────────────────────────────────────────

    fn append_log(&self, meta: &PacketMeta, payload_len: u32, verdict: Action) {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append(LogRecord::new(ts, meta, payload_len, verdict));
    }

    fn filter_read(&self) -> RwLockReadGuard<'_, FilterChain> {
        self.filter.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn filter_write(&self) -> RwLockWriteGuard<'_, FilterChain> {
        self.filter.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn nat_read(&self) -> RwLockReadGuard<'_, NatChain> {
        self.nat.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn nat_write(&self) -> RwLockWriteGuard<'_, NatChain> {
        self.nat.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::addr::entity::{Ipv4Net, PortRange};
    use domain::common::entity::{Protocol, RuleName};

    fn make_rule(name: &str, action: Action) -> FilterRule {
        FilterRule {
            name: RuleName(name.to_string()),
            src_net: Ipv4Net::ANY,
            dst_net: Ipv4Net::ANY,
            src_ports: PortRange::ANY,
            dst_ports: PortRange::ANY,
            protocol: Protocol::Any,
            action,
            log: false,
        }
    }

    fn seed_flow(engine: &Engine, src_port: u16) {
        let key = FlowKey::new(0x0A00_0001, 0x0A00_0002, src_port, 80);
        let deadline = engine.tracker().deadline(CONN_EXPIRES);
        engine.tracker().insert(Flow::new(key, 6, false, deadline));
    }

    #[test]
    fn default_action_starts_accept() {
        assert_eq!(Engine::new().default_action(), Action::Accept);
    }

    #[test]
    fn default_flip_to_drop_purges_everything() {
        let engine = Engine::new();
        seed_flow(&engine, 1);
        seed_flow(&engine, 2);
        assert_eq!(engine.set_default_action(Action::Drop), 2);
        assert!(engine.tracker().is_empty());
        assert_eq!(engine.default_action(), Action::Drop);
    }

    #[test]
    fn default_flip_to_accept_purges_nothing() {
        let engine = Engine::new();
        seed_flow(&engine, 1);
        assert_eq!(engine.set_default_action(Action::Accept), 0);
        assert_eq!(engine.tracker().len(), 1);
    }

    #[test]
    fn accept_rule_insert_keeps_cache() {
        let engine = Engine::new();
        seed_flow(&engine, 1);
        engine.add_filter_rule("", make_rule("ok", Action::Accept)).unwrap();
        assert_eq!(engine.tracker().len(), 1);
    }

    #[test]
    fn drop_rule_insert_purges_matching_cache() {
        let engine = Engine::new();
        seed_flow(&engine, 1);
        engine.add_filter_rule("", make_rule("blk", Action::Drop)).unwrap();
        assert!(engine.tracker().is_empty());
    }

    #[test]
    fn unknown_anchor_reports_error() {
        let engine = Engine::new();
        let err = engine.add_filter_rule("ghost", make_rule("x", Action::Accept));
        assert!(matches!(err, Err(DomainError::NoSuchAnchor(_))));
        assert!(engine.filter_rules().is_empty());
    }

    #[test]
    fn delete_purges_per_removed_rule() {
        let engine = Engine::new();
        engine.add_filter_rule("", make_rule("blk", Action::Accept)).unwrap();
        seed_flow(&engine, 1);
        assert_eq!(engine.delete_filter_rules("blk"), 1);
        assert!(engine.tracker().is_empty());
        assert_eq!(engine.delete_filter_rules("blk"), 0);
    }

    #[test]
    fn nat_rule_lifecycle() {
        let engine = Engine::new();
        let rule = NatRule::new(
            "192.168.1.0/24".parse().unwrap(),
            0xCB00_7105,
            PortRange::new(40000, 60000),
        );
        engine.add_nat_rule(rule).unwrap();
        assert_eq!(engine.nat_rules().len(), 1);
        assert_eq!(engine.delete_nat_rule(0), 1);
        assert_eq!(engine.delete_nat_rule(0), 0);
        assert!(engine.nat_rules().is_empty());
    }

    #[test]
    fn invalid_nat_rule_rejected() {
        let engine = Engine::new();
        let rule = NatRule::new(
            "192.168.1.0/24".parse().unwrap(),
            0xCB00_7105,
            PortRange::new(60000, 40000),
        );
        assert!(engine.add_nat_rule(rule).is_err());
        assert!(engine.nat_rules().is_empty());
    }
}
