//! 3D pong: the clients simulate, the server records and re-broadcasts

use serde::{Deserialize, Serialize};

use super::PlayerSlot;

/// First side to win this many rounds takes the match
pub const ROUNDS_TO_WIN: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A per-slot counter pair as the clients send it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotScores {
    #[serde(default)]
    pub player1: u32,
    #[serde(default)]
    pub player2: u32,
}

impl SlotScores {
    pub fn set(&mut self, slot: PlayerSlot, value: u32) {
        match slot {
            PlayerSlot::Player1 => self.player1 = value,
            PlayerSlot::Player2 => self.player2 = value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreEvent {
    pub scorer: PlayerSlot,
    pub score: SlotScores,
}

#[derive(Debug, Clone, Serialize)]
pub struct ThreeDPong {
    pub ball_position: Vec3,
    pub paddle1_position: Vec3,
    pub paddle2_position: Vec3,
    pub scores: SlotScores,
    pub rounds_won: SlotScores,
    pub scoring_history: Vec<ScoreEvent>,
    pub current_game_winner: Option<PlayerSlot>,
    pub final_score: Option<SlotScores>,
}

impl Default for ThreeDPong {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreeDPong {
    pub fn new() -> Self {
        Self {
            ball_position: Vec3 {
                x: 0.0,
                y: 5.0387,
                z: -8.0,
            },
            paddle1_position: Vec3 {
                x: 0.0,
                y: 4.0387,
                z: 10.0,
            },
            paddle2_position: Vec3 {
                x: 0.0,
                y: 4.0387,
                z: -10.0,
            },
            scores: SlotScores::default(),
            rounds_won: SlotScores::default(),
            scoring_history: Vec::new(),
            current_game_winner: None,
            final_score: None,
        }
    }

    /// Map a normalised pointer position onto the caller's paddle
    pub fn mouse_move(&mut self, slot: PlayerSlot, mouse: Vec2) {
        let lean = (mouse.x * 2.0).abs();
        let y = 5.03 + mouse.y * 2.0;
        match slot {
            PlayerSlot::Player1 => {
                self.paddle1_position = Vec3 {
                    x: 5.5 * mouse.x,
                    y,
                    z: 11.0 - lean,
                };
            }
            PlayerSlot::Player2 => {
                self.paddle2_position = Vec3 {
                    x: -5.5 * mouse.x,
                    y,
                    z: -11.0 + lean,
                };
            }
        }
    }

    pub fn set_ball(&mut self, position: Vec3) {
        self.ball_position = position;
    }

    pub fn score_update(&mut self, scores: SlotScores, scorer: PlayerSlot) {
        self.scores = scores;
        self.scoring_history.push(ScoreEvent {
            scorer,
            score: scores,
        });
    }

    /// A round finished; returns the match winner once a side reaches the round target
    pub fn game_won(&mut self, rounds: SlotScores, winner: PlayerSlot) -> Option<PlayerSlot> {
        self.rounds_won = rounds;
        self.current_game_winner = Some(winner);
        self.scores = SlotScores::default();
        self.match_winner()
    }

    pub fn match_complete(&mut self, final_score: SlotScores) {
        self.final_score = Some(final_score);
    }

    pub fn match_winner(&self) -> Option<PlayerSlot> {
        let SlotScores { player1, player2 } = self.rounds_won;
        if player1.max(player2) < ROUNDS_TO_WIN {
            return None;
        }
        if player1 > player2 {
            Some(PlayerSlot::Player1)
        } else {
            Some(PlayerSlot::Player2)
        }
    }

    /// Recorded result is rounds won, not points in the current round
    pub fn scores(&self) -> (u32, u32) {
        (self.rounds_won.player1, self.rounds_won.player2)
    }

    pub fn apply_forfeit(&mut self, winner: PlayerSlot) {
        self.rounds_won.set(winner, ROUNDS_TO_WIN);
        self.rounds_won.set(winner.opponent(), 0);
    }
}
