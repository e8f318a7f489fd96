//! Ad-hoc network group: an ordered set of sessions playing the same
//! game under the same group name.

use std::collections::VecDeque;

use adhoc_protocol::GroupName;

use crate::session::SessionId;

/// Members are kept newest-first: a joiner goes to the front, so the
/// founder (earliest member still present) is always at the back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: GroupName,
    members: VecDeque<SessionId>,
}

impl Group {
    pub fn new(name: GroupName) -> Self {
        Group {
            name,
            members: VecDeque::new(),
        }
    }

    pub fn name(&self) -> &GroupName {
        &self.name
    }

    /// Members, newest first.
    pub fn members(&self) -> impl DoubleEndedIterator<Item = SessionId> + '_ {
        self.members.iter().copied()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.members.contains(&id)
    }

    /// Earliest-joined member still present.
    pub fn founder(&self) -> Option<SessionId> {
        self.members.back().copied()
    }

    pub(crate) fn push_front(&mut self, id: SessionId) {
        self.members.push_front(id);
    }

    /// Returns `false` if `id` was not a member.
    pub(crate) fn remove(&mut self, id: SessionId) -> bool {
        match self.members.iter().position(|&m| m == id) {
            Some(idx) => {
                self.members.remove(idx);
                true
            }
            None => false,
        }
    }
}
