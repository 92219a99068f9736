// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Qbitel Inc.

//! MLE and IPv6 counters

use crate::mle::Role;

/// Mesh Link Establishment counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MleCounters {
    /// Transitions into Disabled
    pub disabled_role: u16,
    /// Transitions into Detached
    pub detached_role: u16,
    /// Transitions into Child
    pub child_role: u16,
    /// Transitions into Router
    pub router_role: u16,
    /// Transitions into Leader
    pub leader_role: u16,
    /// Attach attempts started
    pub attach_attempts: u16,
    /// Partition ID changes
    pub partition_id_changes: u16,
    /// Attach attempts triggered by hearing a better partition
    pub better_partition_attach_attempts: u16,
    /// Parent changes
    pub parent_changes: u16,
    /// Frames or handshakes dropped on key or tag checks
    pub security_rejections: u16,
}

impl MleCounters {
    /// Count a role entry
    pub fn record_role(&mut self, role: Role) {
        let slot = match role {
            Role::Disabled => &mut self.disabled_role,
            Role::Detached => &mut self.detached_role,
            Role::Child => &mut self.child_role,
            Role::Router => &mut self.router_role,
            Role::Leader => &mut self.leader_role,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Control traffic counters at the IPv6 layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ip6Counters {
    /// Frames queued for transmission
    pub tx_success: u32,
    /// Frames dropped because the outbox was full or no route existed
    pub tx_failure: u32,
    /// Frames accepted
    pub rx_success: u32,
    /// Frames dropped on receive
    pub rx_failure: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_role() {
        let mut c = MleCounters::default();
        c.record_role(Role::Detached);
        c.record_role(Role::Detached);
        c.record_role(Role::Leader);
        assert_eq!(c.detached_role, 2);
        assert_eq!(c.leader_role, 1);
        assert_eq!(c.child_role, 0);
    }
}
