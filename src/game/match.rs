//! Per-match actor, its handle, and the registry that owns them

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LifecycleConfig;
use crate::store::Collaborators;
use crate::util::time::{tick_duration, unix_millis};
use crate::ws::protocol::{GameClientMsg, ServerMsg};

use super::presence::InGamePlayers;
use super::state::{FinalResult, MatchState, SessionError};
use super::{GameVariant, MatchId, PlayerSlot};

const RECONNECTED_MESSAGE: &str = "Opponent has reconnected";
const DISCONNECTED_MESSAGE: &str = "Opponent disconnected. Waiting for reconnection...";
const UNSTABLE_MESSAGE: &str = "Unstable connection detected. Please check your internet connection.";

/// How long a match with no connections lingers after only transient drops
pub const ABANDONED_MATCH_TTL: Duration = Duration::from_secs(300);

/// Join attempts before giving up on a match that keeps shutting down
const JOIN_ATTEMPTS: usize = 3;

/// Services a match needs beyond its own state
#[derive(Clone)]
pub struct MatchDeps {
    pub collaborators: Collaborators,
    pub presence: Arc<InGamePlayers>,
    pub lifecycle: LifecycleConfig,
}

/// Requests from connection handlers to a match actor
pub enum MatchCommand {
    Join {
        conn_id: Uuid,
        username: String,
        outbox: mpsc::UnboundedSender<ServerMsg>,
        reply: oneshot::Sender<broadcast::Receiver<ServerMsg>>,
    },
    Leave {
        conn_id: Uuid,
    },
    Message {
        conn_id: Uuid,
        msg: GameClientMsg,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    #[error("match {0} is already completed")]
    Completed(MatchId),

    #[error("match {id} is a {actual} match")]
    VariantMismatch { id: MatchId, actual: GameVariant },

    #[error("match {0} is shutting down")]
    Unavailable(MatchId),
}

/// Handle to a running match
#[derive(Clone)]
pub struct MatchHandle {
    pub variant: GameVariant,
    /// Distinguishes successive actors spawned under the same id
    instance: Uuid,
    commands: mpsc::Sender<MatchCommand>,
    connection_count: Arc<AtomicUsize>,
}

impl MatchHandle {
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }
}

/// A joined connection's view of its match
pub struct MatchSession {
    pub events: broadcast::Receiver<ServerMsg>,
    sender: MatchSender,
}

impl MatchSession {
    pub fn conn_id(&self) -> Uuid {
        self.sender.conn_id
    }

    #[cfg(test)]
    pub async fn send(&self, msg: GameClientMsg) -> bool {
        self.sender.send(msg).await
    }

    #[cfg(test)]
    pub async fn leave(self) {
        self.sender.leave().await
    }

    /// Separate the event stream from the command side, for connections that
    /// read and write on different tasks
    pub fn split(self) -> (broadcast::Receiver<ServerMsg>, MatchSender) {
        (self.events, self.sender)
    }
}

/// Command side of a joined connection
#[derive(Clone)]
pub struct MatchSender {
    conn_id: Uuid,
    commands: mpsc::Sender<MatchCommand>,
}

impl MatchSender {
    /// Forward a client message. Returns false once the match is gone.
    pub async fn send(&self, msg: GameClientMsg) -> bool {
        self.commands
            .send(MatchCommand::Message {
                conn_id: self.conn_id,
                msg,
            })
            .await
            .is_ok()
    }

    pub async fn leave(self) {
        let _ = self
            .commands
            .send(MatchCommand::Leave {
                conn_id: self.conn_id,
            })
            .await;
    }
}

/// Registry of all active matches
pub struct MatchRegistry {
    matches: Arc<DashMap<MatchId, MatchHandle>>,
    deps: MatchDeps,
}

impl MatchRegistry {
    pub fn new(deps: MatchDeps) -> Self {
        Self {
            matches: Arc::new(DashMap::new()),
            deps,
        }
    }

    pub fn get(&self, id: MatchId) -> Option<MatchHandle> {
        self.matches.get(&id).map(|m| m.value().clone())
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn connected_players(&self) -> usize {
        self.matches
            .iter()
            .map(|m| m.value().connection_count())
            .sum()
    }

    /// Attach a connection to match `id`, starting the match actor on first join
    pub async fn join(
        &self,
        id: MatchId,
        variant: GameVariant,
        username: &str,
        outbox: mpsc::UnboundedSender<ServerMsg>,
    ) -> Result<MatchSession, JoinError> {
        for _ in 0..JOIN_ATTEMPTS {
            match self.deps.collaborators.matches.is_completed(id).await {
                Ok(true) => return Err(JoinError::Completed(id)),
                Ok(false) => {}
                Err(e) => {
                    warn!(match_id = %id, error = %e, "Match status lookup failed, admitting join");
                }
            }

            let handle = self.get_or_spawn(id, variant)?;
            let conn_id = Uuid::new_v4();
            let (reply_tx, reply_rx) = oneshot::channel();
            let join = MatchCommand::Join {
                conn_id,
                username: username.to_string(),
                outbox: outbox.clone(),
                reply: reply_tx,
            };

            if handle.commands.send(join).await.is_ok() {
                if let Ok(events) = reply_rx.await {
                    return Ok(MatchSession {
                        events,
                        sender: MatchSender {
                            conn_id,
                            commands: handle.commands.clone(),
                        },
                    });
                }
            }

            // the actor exited between lookup and join
            debug!(match_id = %id, "Match actor gone, retrying join");
            self.matches.remove_if(&id, |_, h| h.instance == handle.instance);
        }
        Err(JoinError::Unavailable(id))
    }

    fn get_or_spawn(&self, id: MatchId, variant: GameVariant) -> Result<MatchHandle, JoinError> {
        let handle = match self.matches.entry(id) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let (game, handle) =
                    GameMatch::new(id, variant, rand::random(), self.deps.clone(), self.matches.clone());
                entry.insert(handle.clone());
                tokio::spawn(game.run());
                handle
            }
        };

        if handle.variant != variant {
            return Err(JoinError::VariantMismatch {
                id,
                actual: handle.variant,
            });
        }
        Ok(handle)
    }
}

struct Connection {
    username: String,
    slot: Option<PlayerSlot>,
    outbox: mpsc::UnboundedSender<ServerMsg>,
    joined_at: Instant,
}

enum CleanupKind {
    /// Forfeit the disconnected player if the match is still undecided
    Forfeit {
        username: String,
        slot: Option<PlayerSlot>,
    },
    /// Nobody is left; tear down without touching the result
    Abandoned,
}

struct PendingCleanup {
    at: Instant,
    kind: CleanupKind,
}

/// The authoritative game match: sole owner of one MatchState
pub struct GameMatch {
    state: MatchState,
    rng: ChaCha8Rng,
    instance: Uuid,
    commands: mpsc::Receiver<MatchCommand>,
    events: broadcast::Sender<ServerMsg>,
    connections: HashMap<Uuid, Connection>,
    connection_count: Arc<AtomicUsize>,
    cleanup: Option<PendingCleanup>,
    last_tick: Instant,
    deps: MatchDeps,
    registry: Arc<DashMap<MatchId, MatchHandle>>,
}

async fn cleanup_due(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

impl GameMatch {
    pub fn new(
        id: MatchId,
        variant: GameVariant,
        seed: u64,
        deps: MatchDeps,
        registry: Arc<DashMap<MatchId, MatchHandle>>,
    ) -> (Self, MatchHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(256);
        let (events, _) = broadcast::channel(64);
        let connection_count = Arc::new(AtomicUsize::new(0));
        let instance = Uuid::new_v4();

        let handle = MatchHandle {
            variant,
            instance,
            commands: commands_tx,
            connection_count: connection_count.clone(),
        };

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let state = MatchState::new(id, variant, &mut rng);

        let game_match = Self {
            state,
            rng,
            instance,
            commands: commands_rx,
            events,
            connections: HashMap::new(),
            connection_count,
            cleanup: None,
            last_tick: Instant::now(),
            deps,
            registry,
        };

        (game_match, handle)
    }

    /// Run until cleanup fires or every handle is dropped
    pub async fn run(mut self) {
        let id = self.state.game_id;
        info!(match_id = %id, variant = %self.state.game_type, "Match started");

        let mut ticker = interval(tick_duration());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let cleanup_at = self.cleanup.as_ref().map(|c| c.at);
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = ticker.tick() => self.tick().await,
                _ = cleanup_due(cleanup_at) => {
                    if let Some(pending) = self.cleanup.take() {
                        self.run_cleanup(pending).await;
                    }
                    break;
                }
            }
        }

        self.registry
            .remove_if(&id, |_, h| h.instance == self.instance);
        for conn in self.connections.values() {
            self.deps.presence.deregister(&conn.username);
        }
        self.connection_count.store(0, Ordering::Relaxed);
        info!(match_id = %id, "Match torn down");
    }

    fn snapshot(&self) -> Arc<MatchState> {
        Arc::new(self.state.clone())
    }

    fn broadcast(&self, msg: ServerMsg) {
        // no subscribers is fine; the match may be waiting for reconnects
        let _ = self.events.send(msg);
    }

    fn broadcast_state(&self) {
        self.broadcast(ServerMsg::GameState {
            state: self.snapshot(),
        });
    }

    async fn handle_command(&mut self, cmd: MatchCommand) {
        match cmd {
            MatchCommand::Join {
                conn_id,
                username,
                outbox,
                reply,
            } => self.handle_join(conn_id, username, outbox, reply),
            MatchCommand::Leave { conn_id } => self.handle_leave(conn_id),
            MatchCommand::Message { conn_id, msg } => self.handle_message(conn_id, msg).await,
        }
    }

    fn handle_join(
        &mut self,
        conn_id: Uuid,
        username: String,
        outbox: mpsc::UnboundedSender<ServerMsg>,
        reply: oneshot::Sender<broadcast::Receiver<ServerMsg>>,
    ) {
        if reply.send(self.events.subscribe()).is_err() {
            debug!(match_id = %self.state.game_id, username = %username, "Joiner went away before admission");
            return;
        }

        let previous = self.connection_count.fetch_add(1, Ordering::Relaxed);
        if self.cleanup.take().is_some() {
            info!(match_id = %self.state.game_id, username = %username, "Pending cleanup cancelled by join");
        }
        self.deps.presence.register(&username);

        let slot = self.state.slot_of(&username).filter(|&s| self.state.player(s) == Some(username.as_str()));
        let _ = outbox.send(ServerMsg::GameState {
            state: self.snapshot(),
        });

        info!(
            match_id = %self.state.game_id,
            username = %username,
            conn_id = %conn_id,
            connections = previous + 1,
            "Player joined match"
        );

        self.connections.insert(
            conn_id,
            Connection {
                username,
                slot,
                outbox,
                joined_at: Instant::now(),
            },
        );

        if previous > 0 {
            self.broadcast(ServerMsg::PlayerReconnected {
                message: RECONNECTED_MESSAGE.to_string(),
            });
        }
    }

    fn handle_leave(&mut self, conn_id: Uuid) {
        let Some(conn) = self.connections.remove(&conn_id) else {
            return;
        };
        let remaining = self.connection_count.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        self.deps.presence.deregister(&conn.username);

        let lifecycle = self.deps.lifecycle;
        if conn.joined_at.elapsed() < lifecycle.unstable_threshold {
            warn!(
                match_id = %self.state.game_id,
                username = %conn.username,
                conn_id = %conn_id,
                "Transient disconnect"
            );
            self.broadcast(ServerMsg::ConnectionWarning {
                message: UNSTABLE_MESSAGE.to_string(),
            });
            if remaining == 0 && self.cleanup.is_none() {
                self.cleanup = Some(PendingCleanup {
                    at: Instant::now() + ABANDONED_MATCH_TTL,
                    kind: CleanupKind::Abandoned,
                });
            }
            return;
        }

        let slot = conn.slot.or_else(|| self.state.slot_of(&conn.username));
        info!(
            match_id = %self.state.game_id,
            username = %conn.username,
            conn_id = %conn_id,
            remaining,
            "Player left match"
        );
        self.broadcast(ServerMsg::PlayerDisconnected {
            player: slot,
            message: DISCONNECTED_MESSAGE.to_string(),
        });

        // an earlier forfeit deadline stays in force
        let keep_existing = matches!(
            self.cleanup,
            Some(PendingCleanup {
                kind: CleanupKind::Forfeit { .. },
                ..
            })
        );
        if !keep_existing {
            self.cleanup = Some(PendingCleanup {
                at: Instant::now() + lifecycle.reconnection_grace,
                kind: CleanupKind::Forfeit {
                    username: conn.username,
                    slot,
                },
            });
        }
    }

    async fn handle_message(&mut self, conn_id: Uuid, msg: GameClientMsg) {
        let Some(conn) = self.connections.get(&conn_id) else {
            return;
        };
        let outbox = conn.outbox.clone();

        let result = match msg {
            GameClientMsg::Ping => {
                let _ = outbox.send(ServerMsg::Pong {
                    timestamp: unix_millis(),
                });
                return;
            }
            GameClientMsg::ClientDisconnect => {
                self.broadcast(ServerMsg::PlayerDisconnected {
                    player: conn.slot,
                    message: "Opponent left the game".to_string(),
                });
                return;
            }
            GameClientMsg::Init {
                username,
                opponent,
                is_player1,
            } => {
                let identity = conn.username.clone();
                self.handle_init(conn_id, &identity, &username, &opponent, is_player1)
            }
            other => match conn.slot {
                Some(slot) => self.state.apply(slot, other),
                None => Err(SessionError::StateConflict(
                    "send init before game input".into(),
                )),
            },
        };

        match result {
            Ok(winner) => {
                self.broadcast_state();
                if let Some(winner) = winner {
                    self.finish(winner).await;
                }
            }
            Err(e) => {
                debug!(match_id = %self.state.game_id, conn_id = %conn_id, error = %e, "Message rejected");
                let _ = outbox.send(ServerMsg::error(e.to_string()));
            }
        }
    }

    fn handle_init(
        &mut self,
        conn_id: Uuid,
        identity: &str,
        username: &str,
        opponent: &str,
        is_player1: bool,
    ) -> Result<Option<PlayerSlot>, SessionError> {
        let was_running = self.state.phase == super::MatchPhase::Running;
        let slot = self.state.claim_slot(identity, username, opponent, is_player1)?;
        if let Some(conn) = self.connections.get_mut(&conn_id) {
            conn.slot = Some(slot);
        }
        if !was_running && self.state.phase == super::MatchPhase::Running {
            info!(match_id = %self.state.game_id, "Both players seated, match running");
            self.last_tick = Instant::now();
        }
        Ok(None)
    }

    async fn tick(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick).as_secs_f32();
        self.last_tick = now;

        if self.state.phase != super::MatchPhase::Running {
            return;
        }
        match self.state.tick(dt, &mut self.rng) {
            Some(winner) => {
                self.broadcast_state();
                self.finish(winner).await;
            }
            None => self.broadcast_state(),
        }
    }

    /// Normal completion; teardown follows once players leave
    async fn finish(&mut self, winner: PlayerSlot) {
        let Some(result) = self.state.complete(winner, false) else {
            return;
        };
        info!(
            match_id = %result.match_id,
            username = %result.winner,
            score1 = result.score1,
            score2 = result.score2,
            "Match completed"
        );
        self.record(&result).await;
        self.broadcast(ServerMsg::GameEnded {
            winner: result.winner.clone(),
            state: self.snapshot(),
        });
    }

    async fn run_cleanup(&mut self, pending: PendingCleanup) {
        let CleanupKind::Forfeit { username, slot } = pending.kind else {
            info!(match_id = %self.state.game_id, "Abandoned match expired");
            return;
        };
        if self.state.is_completed() {
            return;
        }

        let Some(loser) = slot.or_else(|| self.state.slot_of(&username)) else {
            warn!(
                match_id = %self.state.game_id,
                username = %username,
                "Cannot place disconnected player, skipping forfeit"
            );
            return;
        };
        let Some(result) = self.state.complete(loser.opponent(), true) else {
            warn!(match_id = %self.state.game_id, "Forfeit winner unknown, skipping forfeit");
            return;
        };

        info!(
            match_id = %result.match_id,
            username = %result.winner,
            "Match forfeited"
        );
        self.record(&result).await;
        self.broadcast(ServerMsg::GameEndedByForfeit {
            state: self.snapshot(),
            message: format!(
                "Game ended due to player disconnection. {} wins by forfeit.",
                result.winner
            ),
        });
    }

    /// Persist the result and pay the winner; failures are logged only
    async fn record(&self, result: &FinalResult) {
        let collaborators = &self.deps.collaborators;
        if let Err(e) = collaborators.matches.persist_result(result).await {
            warn!(match_id = %result.match_id, error = %e, "Failed to persist match result");
        }
        match collaborators
            .leveling
            .award_experience(&result.winner, result.xp())
            .await
        {
            Ok(progress) => debug!(
                username = %result.winner,
                level = progress.level,
                xp = progress.xp,
                "Experience awarded"
            ),
            Err(e) => {
                warn!(username = %result.winner, error = %e, "Failed to award experience");
            }
        }
    }
}
