use super::entity::NatRule;

/// Ordered NAT-rule chain, scanned on egress. Rules are addressed by
/// 0-based position; only the source subnet takes part in matching.
#[derive(Debug, Default)]
pub struct NatChain {
    rules: Vec<NatRule>,
}

impl NatChain {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn append(&mut self, rule: NatRule) {
        self.rules.push(rule);
    }

    /// Remove the rule at `index`. Returns 1 on success, 0 when the index
    /// is out of bounds. Negative indices never reach the chain.
    pub fn delete_at(&mut self, index: usize) -> usize {
        if index < self.rules.len() {
            self.rules.remove(index);
            1
        } else {
            0
        }
    }

    /// First rule whose source subnet contains `src_ip`, with its index.
    /// The destination address is deliberately not consulted.
    pub fn match_src(&self, src_ip: u32) -> Option<(usize, &NatRule)> {
        self.rules
            .iter()
            .enumerate()
            .find(|(_, r)| r.src_net.contains(src_ip))
    }

    /// Move a rule's port-search cursor. No-op when the rule has been
    /// deleted since it was matched.
    pub fn set_cursor(&mut self, index: usize, port: u16) {
        if let Some(rule) = self.rules.get_mut(index) {
            rule.cursor = port;
        }
    }

    pub fn snapshot(&self) -> Vec<NatRule> {
        self.rules.clone()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
