//! Read-only view of the topology for status reporting.

use adhoc_protocol::{GroupName, ProductCode};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopologySnapshot {
    /// Every connected session, logged in or not.
    pub user_count: usize,
    pub games: Vec<GameSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSnapshot {
    pub product: ProductCode,
    /// Directory title, or the product code when unknown.
    pub name: String,
    pub player_count: usize,
    pub groups: Vec<GroupSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    pub name: GroupName,
    /// Member nicknames, newest first.
    pub members: Vec<String>,
}

impl GroupSnapshot {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl GameSnapshot {
    /// Players of this game not in any group.
    pub fn groupless(&self) -> usize {
        let grouped: usize = self.groups.iter().map(GroupSnapshot::member_count).sum();
        self.player_count.saturating_sub(grouped)
    }
}
