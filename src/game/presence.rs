//! Process-wide record of which users are currently bound to a match

use dashmap::DashMap;

/// Usernames with at least one live match connection.
///
/// Counted per user so that a reconnect racing the old socket's teardown
/// does not drop the player from the set.
#[derive(Debug, Default)]
pub struct InGamePlayers {
    players: DashMap<String, usize>,
}

impl InGamePlayers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, username: &str) {
        *self.players.entry(username.to_string()).or_insert(0) += 1;
    }

    pub fn deregister(&self, username: &str) {
        self.players.remove_if_mut(username, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn contains(&self, username: &str) -> bool {
        self.players.contains_key(username)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_connections_keep_player_registered() {
        let set = InGamePlayers::new();
        set.register("ana");
        set.register("ana");
        set.deregister("ana");
        assert!(set.contains("ana"));
        set.deregister("ana");
        assert!(!set.contains("ana"));
        assert!(set.is_empty());
    }

    #[test]
    fn deregistering_unknown_user_is_harmless() {
        let set = InGamePlayers::new();
        set.deregister("ghost");
        assert_eq!(set.len(), 0);
    }
}
