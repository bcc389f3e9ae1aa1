use domain::common::entity::Action;

use crate::engine::Engine;

/// The four interception stages the engine exposes to the host packet
/// framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStage {
    /// Reverse-DNAT for return traffic, pre-routing.
    NatIngress,
    /// Stateful filter, pre-routing.
    FilterIngress,
    /// Stateful filter, post-routing.
    FilterEgress,
    /// SNAT, post-routing.
    NatEgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    PreRouting,
    PostRouting,
}

/// Relative position at a hook point. `NatDest` runs before the filter on
/// ingress; `NatSource` runs after it on egress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityClass {
    First,
    NatDest,
    NatSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookRegistration {
    pub stage: HookStage,
    pub point: HookPoint,
    pub priority: PriorityClass,
}

/// Registration table, in per-packet execution order.
pub const REGISTRATIONS: [HookRegistration; 4] = [
    HookRegistration {
        stage: HookStage::NatIngress,
        point: HookPoint::PreRouting,
        priority: PriorityClass::NatDest,
    },
    HookRegistration {
        stage: HookStage::FilterIngress,
        point: HookPoint::PreRouting,
        priority: PriorityClass::First,
    },
    HookRegistration {
        stage: HookStage::FilterEgress,
        point: HookPoint::PostRouting,
        priority: PriorityClass::First,
    },
    HookRegistration {
        stage: HookStage::NatEgress,
        point: HookPoint::PostRouting,
        priority: PriorityClass::NatSource,
    },
];

impl Engine {
    /// Entry point for framework callbacks: run one stage over a mutable
    /// packet buffer.
    pub fn dispatch(&self, stage: HookStage, buf: &mut [u8]) -> Action {
        match stage {
            HookStage::NatIngress => self.hook_nat_in(buf),
            HookStage::FilterIngress | HookStage::FilterEgress => self.hook_filter(buf),
            HookStage::NatEgress => self.hook_nat_out(buf),
        }
    }
}
