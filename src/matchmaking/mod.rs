//! Queue-based pairing of players into new matches

pub mod queue;
pub mod service;

pub use queue::QueuedPlayer;
pub use service::MatchmakingService;

use crate::game::UnknownGameType;

#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Game type is required")]
    MissingGameType,

    #[error("Unknown game type: {0}")]
    UnknownGameType(String),

    #[error("Already waiting for a match")]
    AlreadyQueued,

    #[error("Already waiting for a match on another connection")]
    QueuedElsewhere,

    #[error("Already in a game")]
    InGame,
}

impl From<UnknownGameType> for MatchmakingError {
    fn from(e: UnknownGameType) -> Self {
        MatchmakingError::UnknownGameType(e.0)
    }
}

impl MatchmakingError {
    /// Errors that end the connection rather than just being reported
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            MatchmakingError::InGame | MatchmakingError::QueuedElsewhere
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflicting_sessions_close_the_socket() {
        assert!(MatchmakingError::InGame.closes_connection());
        assert!(MatchmakingError::QueuedElsewhere.closes_connection());
        assert!(!MatchmakingError::AlreadyQueued.closes_connection());
        assert!(!MatchmakingError::MissingGameType.closes_connection());
        assert!(!MatchmakingError::UnknownGameType("chess".into()).closes_connection());
    }
}
