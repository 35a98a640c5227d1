//! WebSocket protocol message definitions
//! These are the wire types for the match, matchmaking and invite sockets

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::game::relay::{SlotScores, Vec2, Vec3};
use crate::game::{InputCommand, MatchId, MatchState, PlayerSlot};

/// Messages sent from a client to its match socket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameClientMsg {
    /// Handshake declaring which seat the caller takes
    Init {
        username: String,
        opponent: String,
        #[serde(rename = "isPlayer1")]
        is_player1: bool,
    },

    /// Discrete command for server-simulated variants
    PlayerInput { input: InputCommand },

    /// 3D pong pointer position, normalised to [-1, 1]
    MouseMove { mouse_position: Vec2 },

    /// 3D pong ball position as simulated by the client
    BallPosition { ball_position: Vec3 },

    ScoreUpdate {
        scores: SlotScores,
        #[serde(rename = "scoringPlayer")]
        scoring_player: PlayerSlot,
    },

    /// A 3D pong round finished
    GameWon {
        matches: SlotScores,
        winner: PlayerSlot,
    },

    MatchComplete {
        winner: PlayerSlot,
        #[serde(rename = "finalScore")]
        final_score: SlotScores,
    },

    /// Latency probe, answered to the caller only
    Ping,

    /// The client is leaving on purpose
    ClientDisconnect,
}

impl GameClientMsg {
    pub fn kind(&self) -> &'static str {
        match self {
            GameClientMsg::Init { .. } => "init",
            GameClientMsg::PlayerInput { .. } => "player_input",
            GameClientMsg::MouseMove { .. } => "mouse_move",
            GameClientMsg::BallPosition { .. } => "ball_position",
            GameClientMsg::ScoreUpdate { .. } => "score_update",
            GameClientMsg::GameWon { .. } => "game_won",
            GameClientMsg::MatchComplete { .. } => "match_complete",
            GameClientMsg::Ping => "ping",
            GameClientMsg::ClientDisconnect => "client_disconnect",
        }
    }
}

/// Messages sent from the server on a match socket
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Snapshot, sent after every tick and accepted message
    GameState { state: Arc<MatchState> },

    GameEnded {
        winner: String,
        state: Arc<MatchState>,
    },

    GameEndedByForfeit {
        state: Arc<MatchState>,
        message: String,
    },

    PlayerDisconnected {
        player: Option<PlayerSlot>,
        message: String,
    },

    PlayerReconnected { message: String },

    /// Sent instead of a disconnect notice for very short-lived connections
    ConnectionWarning { message: String },

    Pong {
        /// Server time in milliseconds
        timestamp: u64,
    },

    Error { message: String },
}

impl ServerMsg {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMsg::Error {
            message: message.into(),
        }
    }
}

fn default_game_type() -> String {
    "pong".to_string()
}

/// Inbound matchmaking messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchmakingClientMsg {
    FindMatch {
        #[serde(default)]
        game_type: Option<String>,
    },
}

/// Outbound matchmaking messages, discriminated by `status`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchmakingMsg {
    Searching {
        username: String,
    },
    Matched {
        opponent: String,
        game_id: MatchId,
        username: String,
        player1: String,
        game_type: String,
    },
    Error {
        message: String,
    },
}

/// Inbound invite messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InviteClientMsg {
    SendInvite {
        target_username: String,
        #[serde(default = "default_game_type")]
        game_type: String,
    },
    AcceptInvite {
        from_username: String,
        #[serde(default = "default_game_type")]
        game_type: String,
    },
    DeclineInvite {
        from_username: String,
    },
}

/// Outbound invite messages
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InviteMsg {
    GameInvite {
        from_username: String,
        game_type: String,
        /// Issue time in milliseconds
        timestamp: u64,
    },
    InviteSent {
        target_username: String,
    },
    InviteAccepted {
        game_id: MatchId,
        opponent: String,
        player1: String,
        game_type: String,
    },
    InviteDeclined {
        by_username: String,
    },
    InviteError {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_init_handshake() {
        let msg: GameClientMsg = serde_json::from_str(
            r#"{"type":"init","username":"ana","opponent":"bo","isPlayer1":true}"#,
        )
        .unwrap();
        match msg {
            GameClientMsg::Init {
                username,
                opponent,
                is_player1,
            } => {
                assert_eq!(username, "ana");
                assert_eq!(opponent, "bo");
                assert!(is_player1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn parses_relay_messages() {
        let msg: GameClientMsg = serde_json::from_str(
            r#"{"type":"score_update","scores":{"player1":2,"player2":1},"scoringPlayer":"player1"}"#,
        )
        .unwrap();
        assert_eq!(msg.kind(), "score_update");

        let ping: GameClientMsg =
            serde_json::from_str(r#"{"type":"ping","timestamp":123}"#).unwrap();
        assert!(matches!(ping, GameClientMsg::Ping));
    }

    #[test]
    fn rejects_unknown_input() {
        let res = serde_json::from_str::<GameClientMsg>(
            r#"{"type":"player_input","input":"jump"}"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn matchmaking_status_tag() {
        let msg = MatchmakingMsg::Matched {
            opponent: "bo".into(),
            game_id: MatchId(7),
            username: "ana".into(),
            player1: "ana".into(),
            game_type: "classic-pong".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["status"], "matched");
        assert_eq!(json["game_id"], 7);
    }

    #[test]
    fn invite_defaults_to_3d_pong() {
        let msg: InviteClientMsg =
            serde_json::from_str(r#"{"type":"send_invite","target_username":"bo"}"#).unwrap();
        match msg {
            InviteClientMsg::SendInvite { game_type, .. } => assert_eq!(game_type, "pong"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
