//! Per-match state shared by all variants

use rand::Rng;
use serde::Serialize;

use crate::store::StoreError;
use crate::ws::protocol::GameClientMsg;

use super::pong::ClassicPong;
use super::relay::ThreeDPong;
use super::space::SpaceRivalry;
use super::{GameVariant, MatchId, PlayerSlot};

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPhase {
    /// At least one seat is still unclaimed
    AwaitingPlayers,
    Running,
    /// Winner recorded, state frozen until teardown
    Completed,
}

/// Failures while handling one inbound message
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("malformed message: {0}")]
    Protocol(String),
    #[error("{0}")]
    StateConflict(String),
    #[error("collaborator failure: {0}")]
    Collaborator(#[from] StoreError),
}

/// Variant kinematics, flattened into the snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum VariantState {
    Classic(ClassicPong),
    ThreeD(ThreeDPong),
    Space(SpaceRivalry),
}

impl VariantState {
    pub fn new<R: Rng>(variant: GameVariant, rng: &mut R) -> Self {
        match variant {
            GameVariant::ClassicPong => VariantState::Classic(ClassicPong::new(rng)),
            GameVariant::ThreeDPong => VariantState::ThreeD(ThreeDPong::new()),
            GameVariant::SpaceRivalry => VariantState::Space(SpaceRivalry::new()),
        }
    }

    pub fn scores(&self) -> (u32, u32) {
        match self {
            VariantState::Classic(g) => g.scores(),
            VariantState::ThreeD(g) => g.scores(),
            VariantState::Space(g) => g.scores(),
        }
    }

    fn step<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Option<PlayerSlot> {
        match self {
            VariantState::Classic(g) => g.step(dt, rng),
            VariantState::Space(g) => g.step(dt, rng),
            // relayed state only changes on client messages
            VariantState::ThreeD(_) => None,
        }
    }

    fn apply_forfeit(&mut self, winner: PlayerSlot) {
        match self {
            VariantState::Classic(g) => g.apply_forfeit(winner),
            VariantState::ThreeD(g) => g.apply_forfeit(winner),
            VariantState::Space(g) => g.apply_forfeit(winner),
        }
    }
}

/// Outcome handed to the result store once a match completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalResult {
    pub match_id: MatchId,
    pub variant: GameVariant,
    pub winner: String,
    pub score1: u32,
    pub score2: u32,
    pub forfeited: bool,
}

impl FinalResult {
    pub fn xp(&self) -> u32 {
        self.variant.winner_xp()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchState {
    pub game_id: MatchId,
    pub game_type: GameVariant,
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub phase: MatchPhase,
    winner: Option<String>,
    forfeited: bool,
    /// Opponent names announced in handshakes, used before that side joins
    #[serde(skip)]
    declared: [Option<String>; 2],
    #[serde(flatten)]
    pub game: VariantState,
}

impl MatchState {
    pub fn new<R: Rng>(game_id: MatchId, variant: GameVariant, rng: &mut R) -> Self {
        Self {
            game_id,
            game_type: variant,
            player1: None,
            player2: None,
            phase: MatchPhase::AwaitingPlayers,
            winner: None,
            forfeited: false,
            declared: [None, None],
            game: VariantState::new(variant, rng),
        }
    }

    pub fn player(&self, slot: PlayerSlot) -> Option<&str> {
        match slot {
            PlayerSlot::Player1 => self.player1.as_deref(),
            PlayerSlot::Player2 => self.player2.as_deref(),
        }
    }

    fn player_mut(&mut self, slot: PlayerSlot) -> &mut Option<String> {
        match slot {
            PlayerSlot::Player1 => &mut self.player1,
            PlayerSlot::Player2 => &mut self.player2,
        }
    }

    /// Seat held or announced for `username`
    pub fn slot_of(&self, username: &str) -> Option<PlayerSlot> {
        [PlayerSlot::Player1, PlayerSlot::Player2]
            .into_iter()
            .find(|&slot| self.name_for(slot) == Some(username))
    }

    fn name_for(&self, slot: PlayerSlot) -> Option<&str> {
        self.player(slot)
            .or_else(|| self.declared[slot.index()].as_deref())
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn forfeited(&self) -> bool {
        self.forfeited
    }

    pub fn is_completed(&self) -> bool {
        self.phase == MatchPhase::Completed
    }

    /// Handle the `init` handshake for the authenticated `identity`.
    ///
    /// A seat is bound to one username for the lifetime of the match. The same
    /// user may claim it again after reconnecting; anyone else is refused.
    pub fn claim_slot(
        &mut self,
        identity: &str,
        username: &str,
        opponent: &str,
        is_player1: bool,
    ) -> Result<PlayerSlot, SessionError> {
        if username != identity {
            return Err(SessionError::StateConflict(
                "init username does not match the connected user".into(),
            ));
        }
        if opponent == username {
            return Err(SessionError::StateConflict(
                "cannot play against yourself".into(),
            ));
        }
        if self.is_completed() {
            return Err(SessionError::StateConflict("match already completed".into()));
        }

        let slot = if is_player1 {
            PlayerSlot::Player1
        } else {
            PlayerSlot::Player2
        };

        if self.player(slot.opponent()) == Some(username) {
            return Err(SessionError::StateConflict(
                "already seated on the other side".into(),
            ));
        }
        if matches!(self.player(slot), Some(owner) if owner != username) {
            let seat = match slot {
                PlayerSlot::Player1 => "player1",
                PlayerSlot::Player2 => "player2",
            };
            return Err(SessionError::StateConflict(format!("{} is already taken", seat)));
        }
        if self.player(slot).is_none() {
            *self.player_mut(slot) = Some(username.to_string());
        }

        let other = slot.opponent().index();
        if self.declared[other].is_none() {
            self.declared[other] = Some(opponent.to_string());
        }

        if self.phase == MatchPhase::AwaitingPlayers && self.player1.is_some() && self.player2.is_some() {
            self.phase = MatchPhase::Running;
        }
        Ok(slot)
    }

    /// Apply a gameplay message from `slot`. Returns the winner when the
    /// message decided the match.
    pub fn apply(
        &mut self,
        slot: PlayerSlot,
        msg: GameClientMsg,
    ) -> Result<Option<PlayerSlot>, SessionError> {
        if self.is_completed() {
            return Err(SessionError::StateConflict("match already completed".into()));
        }

        let kind = msg.kind();
        let variant = self.game_type;
        let rejected =
            move || SessionError::Protocol(format!("{} is not accepted in {}", kind, variant));

        match (&mut self.game, msg) {
            (VariantState::Classic(g), GameClientMsg::PlayerInput { input }) => {
                g.move_paddle(slot, input);
                Ok(None)
            }
            (VariantState::Space(g), GameClientMsg::PlayerInput { input }) => {
                g.handle_input(slot, input);
                Ok(None)
            }
            (VariantState::ThreeD(g), GameClientMsg::MouseMove { mouse_position }) => {
                g.mouse_move(slot, mouse_position);
                Ok(None)
            }
            (VariantState::ThreeD(g), GameClientMsg::BallPosition { ball_position }) => {
                g.set_ball(ball_position);
                Ok(None)
            }
            (VariantState::ThreeD(g), GameClientMsg::ScoreUpdate { scores, scoring_player }) => {
                g.score_update(scores, scoring_player);
                Ok(None)
            }
            (VariantState::ThreeD(g), GameClientMsg::GameWon { matches, winner }) => {
                Ok(g.game_won(matches, winner))
            }
            (VariantState::ThreeD(g), GameClientMsg::MatchComplete { winner, final_score }) => {
                g.match_complete(final_score);
                Ok(Some(winner))
            }
            _ => Err(rejected()),
        }
    }

    /// Advance the simulation while both seats are filled
    pub fn tick<R: Rng>(&mut self, dt: f32, rng: &mut R) -> Option<PlayerSlot> {
        if self.phase != MatchPhase::Running {
            return None;
        }
        self.game.step(dt, rng)
    }

    /// Record the outcome. Only the first call has any effect.
    ///
    /// Returns `None` when the match was already completed or the winner's
    /// name is unknown.
    pub fn complete(&mut self, winner: PlayerSlot, forfeited: bool) -> Option<FinalResult> {
        if self.is_completed() {
            return None;
        }
        let name = self.name_for(winner)?.to_string();

        if forfeited {
            self.game.apply_forfeit(winner);
        }
        let (score1, score2) = self.game.scores();

        self.phase = MatchPhase::Completed;
        self.winner = Some(name.clone());
        self.forfeited = forfeited;

        Some(FinalResult {
            match_id: self.game_id,
            variant: self.game_type,
            winner: name,
            score1,
            score2,
            forfeited,
        })
    }
}
