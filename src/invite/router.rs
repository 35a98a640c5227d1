use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::{GameVariant, InGamePlayers};
use crate::store::{Collaborators, NewMatch};
use crate::util::time::unix_millis;
use crate::ws::protocol::InviteMsg;

use super::InviteError;

type Outbox = mpsc::UnboundedSender<InviteMsg>;

/// Held invites older than this are dropped undelivered
pub const PENDING_INVITE_TTL_MS: u64 = 10 * 60 * 1000;
/// Held invites kept per offline target; the oldest go first
pub const MAX_PENDING_PER_TARGET: usize = 16;

struct InviteConnection {
    conn_id: Uuid,
    outbox: Outbox,
}

struct HeldInvite {
    issued_at: u64,
    invite: InviteMsg,
}

fn is_fresh(held: &HeldInvite, now: u64) -> bool {
    now.saturating_sub(held.issued_at) < PENDING_INVITE_TTL_MS
}

/// Routes invites between named connections. Invites for users without an
/// open connection are held until that user connects.
pub struct InviteRouter {
    connections: DashMap<String, InviteConnection>,
    pending: DashMap<String, Vec<HeldInvite>>,
    presence: Arc<InGamePlayers>,
    collaborators: Collaborators,
}

impl InviteRouter {
    pub fn new(presence: Arc<InGamePlayers>, collaborators: Collaborators) -> Self {
        Self {
            connections: DashMap::new(),
            pending: DashMap::new(),
            presence,
            collaborators,
        }
    }

    /// Register `username`'s connection and flush anything waiting for it.
    /// Later connections from the same user replace earlier ones.
    pub fn connect(&self, username: &str, conn_id: Uuid, outbox: Outbox) -> Result<(), InviteError> {
        if self.presence.contains(username) {
            return Err(InviteError::InGame);
        }

        if let Some((_, waiting)) = self.pending.remove(username) {
            let now = unix_millis();
            debug!(username = %username, count = waiting.len(), "Delivering pending invites");
            for held in waiting.into_iter().filter(|h| is_fresh(h, now)) {
                let _ = outbox.send(held.invite);
            }
        }
        self.connections
            .insert(username.to_string(), InviteConnection { conn_id, outbox });
        info!(username = %username, conn_id = %conn_id, "Invite connection opened");
        Ok(())
    }

    pub fn disconnect(&self, username: &str, conn_id: Uuid) {
        self.connections
            .remove_if(username, |_, c| c.conn_id == conn_id);
        self.pending.remove(username);
        info!(username = %username, conn_id = %conn_id, "Invite connection closed");
    }

    #[cfg(test)]
    fn is_online(&self, username: &str) -> bool {
        self.connections.contains_key(username)
    }

    fn outbox_of(&self, username: &str) -> Option<Outbox> {
        self.connections.get(username).map(|c| c.outbox.clone())
    }

    /// Deliver an invite now, or queue it for the target's next connect.
    /// Returns the notice for the sender.
    pub fn send_invite(&self, from: &str, to: &str, game_type: &str) -> Result<InviteMsg, InviteError> {
        if from == to {
            return Err(InviteError::SelfInvite);
        }
        let variant: GameVariant = game_type.parse()?;

        let now = unix_millis();
        let invite = InviteMsg::GameInvite {
            from_username: from.to_string(),
            game_type: variant.to_string(),
            timestamp: now,
        };

        match self.outbox_of(to) {
            Some(outbox) if outbox.send(invite.clone()).is_ok() => {
                debug!(from = %from, to = %to, "Invite delivered");
            }
            _ => {
                debug!(from = %from, to = %to, "Target offline, invite held");
                self.hold(to, invite, now);
            }
        }

        Ok(InviteMsg::InviteSent {
            target_username: to.to_string(),
        })
    }

    /// Queue an invite for an offline target, dropping anything stale first
    fn hold(&self, to: &str, invite: InviteMsg, issued_at: u64) {
        let now = unix_millis();
        self.pending.retain(|_, held| {
            held.retain(|h| is_fresh(h, now));
            !held.is_empty()
        });

        let mut held = self.pending.entry(to.to_string()).or_default();
        held.push(HeldInvite { issued_at, invite });
        if held.len() > MAX_PENDING_PER_TARGET {
            let excess = held.len() - MAX_PENDING_PER_TARGET;
            held.drain(..excess);
            debug!(to = %to, dropped = excess, "Pending invite limit reached");
        }
    }

    #[cfg(test)]
    fn pending_for(&self, username: &str) -> usize {
        self.pending.get(username).map_or(0, |h| h.len())
    }

    /// Accept `from`'s invite. The acceptor becomes player1. Returns the
    /// notice for the acceptor; the inviter is notified directly.
    pub async fn accept_invite(
        &self,
        by: &str,
        from: &str,
        game_type: &str,
    ) -> Result<InviteMsg, InviteError> {
        let Some(inviter) = self.outbox_of(from) else {
            return Err(InviteError::InviterOffline);
        };
        if by == from {
            return Err(InviteError::SelfInvite);
        }
        let variant: GameVariant = game_type.parse()?;

        match self.collaborators.social.is_friend(by, from).await {
            Ok(true) => {}
            Ok(false) => return Err(InviteError::NotFriends),
            Err(e) => {
                warn!(by = %by, from = %from, error = %e, "Friendship lookup failed");
                return Err(InviteError::NotFriends);
            }
        }

        let game_id = self
            .collaborators
            .matches
            .create_match(NewMatch {
                player1: by.to_string(),
                player2: from.to_string(),
                game_type: variant,
            })
            .await
            .map_err(|e| {
                error!(by = %by, from = %from, error = %e, "Failed to create invited match");
                InviteError::from(e)
            })?;

        info!(match_id = %game_id, player1 = %by, player2 = %from, game_type = %variant, "Invite accepted");

        let accepted = |opponent: &str| InviteMsg::InviteAccepted {
            game_id,
            opponent: opponent.to_string(),
            player1: by.to_string(),
            game_type: variant.to_string(),
        };
        let _ = inviter.send(accepted(by));
        Ok(accepted(from))
    }

    pub fn decline_invite(&self, by: &str, from: &str) {
        if let Some(inviter) = self.outbox_of(from) {
            let _ = inviter.send(InviteMsg::InviteDeclined {
                by_username: by.to_string(),
            });
        }
    }
}
