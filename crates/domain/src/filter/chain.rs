use crate::common::entity::PacketMeta;

use super::entity::FilterRule;
use super::error::FilterError;

/// Ordered filter-rule chain, scanned top to bottom for each uncached
/// packet. First match wins; position is controlled at insertion time via
/// a named anchor.
#[derive(Debug, Default)]
pub struct FilterChain {
    rules: Vec<FilterRule>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Insert `rule` immediately after the first rule named `anchor`.
    /// An empty anchor inserts at the head. An anchor matching no rule
    /// fails and leaves the chain unchanged.
    pub fn add_after(&mut self, anchor: &str, rule: FilterRule) -> Result<(), FilterError> {
        rule.validate()?;

        if anchor.is_empty() {
            self.rules.insert(0, rule);
            return Ok(());
        }

        let pos = self
            .rules
            .iter()
            .position(|r| r.name.as_str() == anchor)
            .ok_or_else(|| FilterError::NoSuchAnchor {
                name: anchor.to_string(),
            })?;
        self.rules.insert(pos + 1, rule);
        Ok(())
    }

    /// Remove every rule named `name`, returning the removed rules in
    /// chain order. Callers purge cached flows per removed rule.
    pub fn delete_by_name(&mut self, name: &str) -> Vec<FilterRule> {
        let mut removed = Vec::new();
        self.rules.retain(|r| {
            if r.name.as_str() == name {
                removed.push(r.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Replace the whole chain. All rules are validated before anything
    /// is touched, so a bad batch leaves the chain as it was.
    pub fn reload(&mut self, rules: Vec<FilterRule>) -> Result<(), FilterError> {
        for rule in &rules {
            rule.validate()?;
        }
        self.rules = rules;
        Ok(())
    }

    /// First rule matching the packet, if any.
    pub fn match_packet(&self, meta: &PacketMeta) -> Option<&FilterRule> {
        self.rules.iter().find(|r| r.matches(meta))
    }

    /// Value copy of the chain in iteration order.
    pub fn snapshot(&self) -> Vec<FilterRule> {
        self.rules.clone()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::entity::{Ipv4Net, PortRange};
    use crate::common::entity::{Action, Protocol, RuleName};

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

    fn make_meta() -> PacketMeta {
        PacketMeta {
            src_ip: 0x0A00_0001,
            dst_ip: 0x0A00_0002,
            src_port: 3000,
            dst_port: 80,
            protocol: 6,
        }
    }

    fn names(chain: &FilterChain) -> Vec<String> {
        chain
            .snapshot()
            .iter()
            .map(|r| r.name.as_str().to_string())
            .collect()
    }

    // ── add_after ─────────────────────────────────────────────────

    #[test]
    fn empty_anchor_inserts_at_head() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("a", Action::Accept)).unwrap();
        chain.add_after("", make_rule("b", Action::Accept)).unwrap();
        assert_eq!(names(&chain), ["b", "a"]);
    }

    #[test]
    fn anchored_insert_lands_after_first_occurrence() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("a", Action::Accept)).unwrap();
        chain.add_after("a", make_rule("b", Action::Accept)).unwrap();
        chain.add_after("a", make_rule("c", Action::Accept)).unwrap();
        assert_eq!(names(&chain), ["a", "c", "b"]);
    }

    #[test]
    fn anchored_insert_with_duplicate_anchor_names() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("dup", Action::Accept)).unwrap();
        chain.add_after("dup", make_rule("dup", Action::Accept)).unwrap();
        chain.add_after("dup", make_rule("mid", Action::Accept)).unwrap();
        // lands after the FIRST "dup"
        assert_eq!(names(&chain), ["dup", "mid", "dup"]);
    }

    #[test]
    fn unknown_anchor_fails_without_adding() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("a", Action::Accept)).unwrap();
        let err = chain.add_after("ghost", make_rule("b", Action::Accept));
        assert!(matches!(err, Err(FilterError::NoSuchAnchor { .. })));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn invalid_rule_is_rejected() {
        let mut chain = FilterChain::new();
        assert!(chain.add_after("", make_rule("", Action::Accept)).is_err());
        assert!(chain.is_empty());
    }

    // ── delete_by_name ────────────────────────────────────────────

    #[test]
    fn delete_removes_all_occurrences() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("keep", Action::Accept)).unwrap();
        chain.add_after("", make_rule("del", Action::Accept)).unwrap();
        chain.add_after("keep", make_rule("del", Action::Drop)).unwrap();

        let removed = chain.delete_by_name("del");
        assert_eq!(removed.len(), 2);
        assert_eq!(names(&chain), ["keep"]);
    }

    #[test]
    fn delete_unknown_name_is_noop() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("a", Action::Accept)).unwrap();
        assert!(chain.delete_by_name("ghost").is_empty());
        assert_eq!(chain.len(), 1);
    }

    // ── reload ────────────────────────────────────────────────────

    #[test]
    fn reload_replaces_chain() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("old", Action::Accept)).unwrap();
        chain
            .reload(vec![
                make_rule("n1", Action::Accept),
                make_rule("n2", Action::Drop),
            ])
            .unwrap();
        assert_eq!(names(&chain), ["n1", "n2"]);
    }

    #[test]
    fn reload_keeps_old_chain_on_invalid_batch() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("old", Action::Accept)).unwrap();
        let bad = vec![make_rule("ok", Action::Accept), make_rule("", Action::Drop)];
        assert!(chain.reload(bad).is_err());
        assert_eq!(names(&chain), ["old"]);
    }

    // ── match_packet ──────────────────────────────────────────────

    #[test]
    fn empty_chain_matches_nothing() {
        assert!(FilterChain::new().match_packet(&make_meta()).is_none());
    }

    #[test]
    fn first_match_wins() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("last", Action::Accept)).unwrap();
        chain.add_after("", make_rule("first", Action::Drop)).unwrap();

        let hit = chain.match_packet(&make_meta()).unwrap();
        assert_eq!(hit.name.as_str(), "first");
        assert_eq!(hit.action, Action::Drop);
    }

    #[test]
    fn falls_through_non_matching_rules() {
        let mut chain = FilterChain::new();
        let mut udp_only = make_rule("udp", Action::Drop);
        udp_only.protocol = Protocol::Udp;
        chain.add_after("", make_rule("all", Action::Accept)).unwrap();
        chain.add_after("", udp_only).unwrap();

        let hit = chain.match_packet(&make_meta()).unwrap(); // TCP packet
        assert_eq!(hit.name.as_str(), "all");
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let mut chain = FilterChain::new();
        chain.add_after("", make_rule("c", Action::Accept)).unwrap();
        chain.add_after("", make_rule("b", Action::Accept)).unwrap();
        chain.add_after("b", make_rule("x", Action::Accept)).unwrap();
        assert_eq!(names(&chain), ["b", "x", "c"]);
    }
}
