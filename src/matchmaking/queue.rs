//! Matchmaking queue implementation

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::game::GameVariant;
use crate::ws::protocol::MatchmakingMsg;

use super::MatchmakingError;

/// Connection waiting in a queue
#[derive(Debug, Clone)]
pub struct QueuedPlayer {
    pub conn_id: Uuid,
    pub username: String,
    pub outbox: mpsc::UnboundedSender<MatchmakingMsg>,
    pub queued_at: Instant,
}

impl QueuedPlayer {
    pub fn new(conn_id: Uuid, username: String, outbox: mpsc::UnboundedSender<MatchmakingMsg>) -> Self {
        Self {
            conn_id,
            username,
            outbox,
            queued_at: Instant::now(),
        }
    }

    /// How long this player has been waiting
    pub fn wait_time(&self) -> Duration {
        self.queued_at.elapsed()
    }
}

/// Two players popped together, oldest first
#[derive(Debug)]
pub struct Pairing {
    pub player1: QueuedPlayer,
    pub player2: QueuedPlayer,
    pub variant: GameVariant,
}

/// One FIFO per game type
#[derive(Debug, Default)]
pub struct MatchmakingQueue {
    queues: HashMap<GameVariant, VecDeque<QueuedPlayer>>,
}

impl MatchmakingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `player` and pair the two oldest waiters if there are enough.
    /// A user can wait in at most one queue at a time.
    pub fn enqueue(
        &mut self,
        player: QueuedPlayer,
        variant: GameVariant,
    ) -> Result<Option<Pairing>, MatchmakingError> {
        match self.waiting_conn(&player.username) {
            Some(conn_id) if conn_id == player.conn_id => {
                return Err(MatchmakingError::AlreadyQueued)
            }
            Some(_) => return Err(MatchmakingError::QueuedElsewhere),
            None => {}
        }

        let queue = self.queues.entry(variant).or_default();
        queue.push_back(player);
        if queue.len() < 2 {
            return Ok(None);
        }

        let (Some(player1), Some(player2)) = (queue.pop_front(), queue.pop_front()) else {
            return Ok(None);
        };
        for other in self.queues.values_mut() {
            other.retain(|p| p.username != player1.username && p.username != player2.username);
        }
        Ok(Some(Pairing {
            player1,
            player2,
            variant,
        }))
    }

    /// Drop a connection from whichever queue holds it
    pub fn remove_connection(&mut self, conn_id: Uuid) -> Option<QueuedPlayer> {
        for queue in self.queues.values_mut() {
            if let Some(pos) = queue.iter().position(|p| p.conn_id == conn_id) {
                return queue.remove(pos);
            }
        }
        None
    }

    /// Connection `username` is currently waiting on, if any
    pub fn waiting_conn(&self, username: &str) -> Option<Uuid> {
        self.queues
            .values()
            .flat_map(|q| q.iter())
            .find(|p| p.username == username)
            .map(|p| p.conn_id)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.waiting_conn(username).is_some()
    }

    /// Total waiting connections over all game types
    pub fn len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn waiting_for(&self, variant: GameVariant) -> usize {
        self.queues.get(&variant).map_or(0, VecDeque::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str) -> QueuedPlayer {
        let (tx, _rx) = mpsc::unbounded_channel();
        QueuedPlayer::new(Uuid::new_v4(), name.to_string(), tx)
    }

    #[test]
    fn pairs_two_oldest_in_order() {
        let mut queue = MatchmakingQueue::new();
        assert!(queue.enqueue(player("ana"), GameVariant::ClassicPong).unwrap().is_none());

        let pairing = queue
            .enqueue(player("bo"), GameVariant::ClassicPong)
            .unwrap()
            .unwrap();
        assert_eq!(pairing.player1.username, "ana");
        assert_eq!(pairing.player2.username, "bo");
        assert!(queue.is_empty());
    }

    #[test]
    fn game_types_do_not_mix() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(player("ana"), GameVariant::ClassicPong).unwrap();
        assert!(queue.enqueue(player("bo"), GameVariant::SpaceRivalry).unwrap().is_none());
        assert_eq!(queue.waiting_for(GameVariant::ClassicPong), 1);
        assert_eq!(queue.waiting_for(GameVariant::SpaceRivalry), 1);
    }

    #[test]
    fn user_waits_in_one_queue_only() {
        let mut queue = MatchmakingQueue::new();
        let ana = player("ana");
        queue.enqueue(ana.clone(), GameVariant::ClassicPong).unwrap();

        let again = queue.enqueue(ana.clone(), GameVariant::ClassicPong);
        assert!(matches!(again, Err(MatchmakingError::AlreadyQueued)));
        let other_queue = queue.enqueue(ana, GameVariant::ThreeDPong);
        assert!(matches!(other_queue, Err(MatchmakingError::AlreadyQueued)));

        let second_tab = queue.enqueue(player("ana"), GameVariant::ThreeDPong);
        assert!(matches!(second_tab, Err(MatchmakingError::QueuedElsewhere)));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn third_arrival_waits() {
        let mut queue = MatchmakingQueue::new();
        queue.enqueue(player("ana"), GameVariant::ThreeDPong).unwrap();
        queue.enqueue(player("bo"), GameVariant::ThreeDPong).unwrap();
        assert!(queue.enqueue(player("cy"), GameVariant::ThreeDPong).unwrap().is_none());
        assert_eq!(queue.waiting_for(GameVariant::ThreeDPong), 1);
        assert!(queue.contains("cy"));
    }

    #[test]
    fn removing_connection_leaves_others() {
        let mut queue = MatchmakingQueue::new();
        let ana = player("ana");
        let ana_conn = ana.conn_id;
        queue.enqueue(ana, GameVariant::ClassicPong).unwrap();
        assert_eq!(queue.remove_connection(ana_conn).map(|p| p.username), Some("ana".into()));
        assert!(queue.remove_connection(ana_conn).is_none());
        assert!(queue.is_empty());
    }
}
