//! Match simulation modules

pub mod combat;
pub mod r#match;
pub mod physics;
pub mod pong;
pub mod presence;
pub mod relay;
pub mod space;
pub mod state;

pub use presence::InGamePlayers;
pub use r#match::{MatchDeps, MatchRegistry, MatchSender};
pub use state::{FinalResult, MatchPhase, MatchState};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted match identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub i64);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MatchId {
    type Err = MalformedMatchId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim_end_matches('/');
        if s.is_empty() || s.len() > 19 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(MalformedMatchId(s.to_string()));
        }
        s.parse::<i64>()
            .map(MatchId)
            .map_err(|_| MalformedMatchId(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed match id: {0:?}")]
pub struct MalformedMatchId(pub String);

/// Supported rule-sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameVariant {
    #[serde(rename = "classic-pong")]
    ClassicPong,
    #[serde(rename = "pong")]
    ThreeDPong,
    #[serde(rename = "space-rivalry")]
    SpaceRivalry,
}

impl GameVariant {
    pub const ALL: [GameVariant; 3] = [
        GameVariant::ClassicPong,
        GameVariant::ThreeDPong,
        GameVariant::SpaceRivalry,
    ];

    /// Wire name, also the URL segment for match sockets
    pub fn as_str(self) -> &'static str {
        match self {
            GameVariant::ClassicPong => "classic-pong",
            GameVariant::ThreeDPong => "pong",
            GameVariant::SpaceRivalry => "space-rivalry",
        }
    }

    /// Experience granted to the winner
    pub fn winner_xp(self) -> u32 {
        match self {
            GameVariant::ThreeDPong => 100,
            GameVariant::ClassicPong | GameVariant::SpaceRivalry => 50,
        }
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameVariant {
    type Err = UnknownGameType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameVariant::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownGameType(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown game type: {0:?}")]
pub struct UnknownGameType(pub String);

/// One of the two seats in a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerSlot {
    Player1,
    Player2,
}

impl PlayerSlot {
    pub fn opponent(self) -> Self {
        match self {
            PlayerSlot::Player1 => PlayerSlot::Player2,
            PlayerSlot::Player2 => PlayerSlot::Player1,
        }
    }

    pub fn index(self) -> usize {
        match self {
            PlayerSlot::Player1 => 0,
            PlayerSlot::Player2 => 1,
        }
    }
}

/// Discrete input vocabulary; pong uses up/down, space rivalry left/right/shoot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputCommand {
    Up,
    Down,
    Left,
    Right,
    Shoot,
}
