//! One distinct product (game) with at least one player logged in.

use adhoc_protocol::{GroupName, ProductCode};

use crate::group::Group;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    product: ProductCode,
    player_count: usize,
    /// Newest group first.
    groups: Vec<Group>,
}

impl Game {
    pub fn new(product: ProductCode) -> Self {
        Game {
            product,
            player_count: 0,
            groups: Vec::new(),
        }
    }

    pub fn product(&self) -> &ProductCode {
        &self.product
    }

    /// Logged-in sessions playing this game, grouped or not.
    pub fn player_count(&self) -> usize {
        self.player_count
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, name: &GroupName) -> Option<&Group> {
        self.groups.iter().find(|g| g.name() == name)
    }

    pub(crate) fn add_player(&mut self) {
        self.player_count += 1;
    }

    pub(crate) fn remove_player(&mut self) {
        self.player_count = self.player_count.saturating_sub(1);
    }

    /// Existing group by name, or a new empty one inserted at the front.
    pub(crate) fn group_or_create(&mut self, name: &GroupName) -> &mut Group {
        let idx = match self.groups.iter().position(|g| g.name() == name) {
            Some(idx) => idx,
            None => {
                self.groups.insert(0, Group::new(*name));
                0
            }
        };
        &mut self.groups[idx]
    }

    pub(crate) fn group_mut(&mut self, name: &GroupName) -> Option<&mut Group> {
        self.groups.iter_mut().find(|g| g.name() == name)
    }

    pub(crate) fn remove_group(&mut self, name: &GroupName) {
        self.groups.retain(|g| g.name() != name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_are_listed_newest_first() {
        let mut game = Game::new(ProductCode(*b"ULUS10041"));
        game.group_or_create(&GroupName::new("A"));
        game.group_or_create(&GroupName::new("B"));
        // Existing name is reused, not moved.
        game.group_or_create(&GroupName::new("A"));

        let names: Vec<String> = game.groups().iter().map(|g| g.name().to_string()).collect();
        assert_eq!(names, vec!["B", "A"]);

        game.remove_group(&GroupName::new("B"));
        assert_eq!(game.group_count(), 1);
        assert!(game.group(&GroupName::new("A")).is_some());
    }

    #[test]
    fn player_count_never_underflows() {
        let mut game = Game::new(ProductCode(*b"ULUS10041"));
        game.add_player();
        game.remove_player();
        game.remove_player();
        assert_eq!(game.player_count(), 0);
    }
}
