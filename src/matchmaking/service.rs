//! Matchmaking service - manages queues and match creation

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::game::{GameVariant, InGamePlayers};
use crate::store::{MatchStore, NewMatch};
use crate::ws::protocol::MatchmakingMsg;

use super::queue::{MatchmakingQueue, Pairing, QueuedPlayer};
use super::MatchmakingError;

/// Matchmaking service
pub struct MatchmakingService {
    queue: Mutex<MatchmakingQueue>,
    presence: Arc<InGamePlayers>,
    store: Arc<dyn MatchStore>,
}

impl MatchmakingService {
    pub fn new(presence: Arc<InGamePlayers>, store: Arc<dyn MatchStore>) -> Self {
        Self {
            queue: Mutex::new(MatchmakingQueue::new()),
            presence,
            store,
        }
    }

    /// Gate for a new matchmaking connection
    pub fn admit(&self, username: &str) -> Result<(), MatchmakingError> {
        if self.presence.contains(username) {
            return Err(MatchmakingError::InGame);
        }
        if self.queue.lock().contains(username) {
            return Err(MatchmakingError::QueuedElsewhere);
        }
        Ok(())
    }

    /// Handle `find_match`. Pairing happens under the queue lock so concurrent
    /// arrivals can never claim the same waiter twice.
    pub async fn find_match(
        &self,
        player: QueuedPlayer,
        game_type: Option<&str>,
    ) -> Result<(), MatchmakingError> {
        let game_type = game_type
            .filter(|t| !t.is_empty())
            .ok_or(MatchmakingError::MissingGameType)?;
        let variant: GameVariant = game_type.parse()?;

        if self.presence.contains(&player.username) {
            return Err(MatchmakingError::InGame);
        }

        info!(username = %player.username, conn_id = %player.conn_id, game_type = %variant, "Queued for match");
        let pairing = self.queue.lock().enqueue(player, variant)?;

        if let Some(pairing) = pairing {
            self.start_match(pairing).await;
        }
        Ok(())
    }

    async fn start_match(&self, pairing: Pairing) {
        let Pairing {
            player1,
            player2,
            variant,
        } = pairing;

        let created = self
            .store
            .create_match(NewMatch {
                player1: player1.username.clone(),
                player2: player2.username.clone(),
                game_type: variant,
            })
            .await;

        let game_id = match created {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to create match record");
                let failure = MatchmakingMsg::Error {
                    message: "Failed to create match".to_string(),
                };
                let _ = player1.outbox.send(failure.clone());
                let _ = player2.outbox.send(failure);
                return;
            }
        };

        info!(
            match_id = %game_id,
            player1 = %player1.username,
            player2 = %player2.username,
            waited_ms = player1.wait_time().as_millis() as u64,
            "Players matched"
        );

        let notice = |me: &QueuedPlayer, opponent: &QueuedPlayer| MatchmakingMsg::Matched {
            opponent: opponent.username.clone(),
            game_id,
            username: me.username.clone(),
            player1: player1.username.clone(),
            game_type: variant.to_string(),
        };
        let _ = player1.outbox.send(notice(&player1, &player2));
        let _ = player2.outbox.send(notice(&player2, &player1));
    }

    /// Connection closed; forget it if it was still waiting
    pub fn leave(&self, conn_id: Uuid) {
        if let Some(player) = self.queue.lock().remove_connection(conn_id) {
            info!(username = %player.username, conn_id = %conn_id, "Left matchmaking queue");
        }
    }

    pub fn queue_size(&self) -> usize {
        self.queue.lock().len()
    }
}
