//! WebSocket upgrade handlers for match connections

use std::fmt::Display;

use axum::{
    extract::{
        ws::{Message, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{GameVariant, MatchId, MatchSender};
use crate::http::middleware::{authenticate, AuthError};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{GameClientMsg, ServerMsg};

/// Query parameters for WebSocket connections
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn classic_pong_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    upgrade_match(ws, GameVariant::ClassicPong, game_id, query, state)
}

pub async fn three_d_pong_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    upgrade_match(ws, GameVariant::ThreeDPong, game_id, query, state)
}

pub async fn space_rivalry_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    upgrade_match(ws, GameVariant::SpaceRivalry, game_id, query, state)
}

fn upgrade_match(
    ws: WebSocketUpgrade,
    variant: GameVariant,
    game_id: String,
    query: WsQuery,
    state: AppState,
) -> Response {
    let identity = authenticate(query.token.as_deref(), &state.config.jwt_secret);
    ws.on_upgrade(move |socket| {
        let (sink, stream) = socket.split();
        serve_match(sink, stream, variant, game_id, identity, state)
    })
}

/// Run one match connection over the two halves of an accepted socket
pub(crate) async fn serve_match<Tx, Rx, E>(
    mut sink: Tx,
    stream: Rx,
    variant: GameVariant,
    game_id: String,
    identity: Result<String, AuthError>,
    state: AppState,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    let username = match identity {
        Ok(username) => username,
        Err(e) => {
            warn!(error = %e, game_type = %variant, "Match connection without identity, closing");
            close_socket(&mut sink).await;
            return;
        }
    };

    let match_id: MatchId = match game_id.parse() {
        Ok(id) => id,
        Err(e) => {
            warn!(username = %username, error = %e, "Rejecting match connection");
            let _ = send_msg(&mut sink, &ServerMsg::error("Invalid game id")).await;
            close_socket(&mut sink).await;
            return;
        }
    };

    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let session = match state
        .match_registry
        .join(match_id, variant, &username, outbox_tx.clone())
        .await
    {
        Ok(session) => session,
        Err(e) => {
            info!(match_id = %match_id, username = %username, error = %e, "Join refused");
            let _ = send_msg(&mut sink, &ServerMsg::error(e.to_string())).await;
            close_socket(&mut sink).await;
            return;
        }
    };

    let conn_id = session.conn_id();
    info!(match_id = %match_id, username = %username, conn_id = %conn_id, "Match connection opened");

    let (events, sender) = session.split();

    let writer = tokio::spawn(write_loop(sink, outbox_rx, events, username.clone()));
    read_loop(stream, &sender, &outbox_tx, &username).await;

    sender.leave().await;
    drop(outbox_tx);
    writer.abort();

    info!(match_id = %match_id, username = %username, conn_id = %conn_id, "Match connection closed");
}

/// Merge direct replies and match broadcasts onto the socket
async fn write_loop<Tx>(
    mut ws_sink: Tx,
    mut outbox: mpsc::UnboundedReceiver<ServerMsg>,
    mut events: broadcast::Receiver<ServerMsg>,
    username: String,
) where
    Tx: Sink<Message> + Unpin + Send,
    Tx::Error: Display,
{
    loop {
        let msg = tokio::select! {
            direct = outbox.recv() => match direct {
                Some(msg) => msg,
                None => break,
            },
            event = events.recv() => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(username = %username, lagged_count = n, "Client lagged, skipping {} events", n);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(username = %username, "Match event channel closed");
                    break;
                }
            },
        };

        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(username = %username, error = %e, "WebSocket send failed");
            return;
        }
    }
    close_socket(&mut ws_sink).await;
}

/// Socket to match actor, until the client goes away
async fn read_loop<Rx, E>(
    mut ws_stream: Rx,
    sender: &MatchSender,
    outbox: &mpsc::UnboundedSender<ServerMsg>,
    username: &str,
) where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let rate_limiter = ConnectionRateLimiter::for_match();

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(username = %username, "Rate limited match message");
                    continue;
                }

                let msg = match serde_json::from_str::<GameClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(username = %username, error = %e, "Failed to parse client message");
                        let _ = outbox.send(ServerMsg::error("Invalid message format"));
                        continue;
                    }
                };
                let leaving = matches!(msg, GameClientMsg::ClientDisconnect);

                if !sender.send(msg).await {
                    debug!(username = %username, "Match actor gone");
                    break;
                }
                if leaving {
                    info!(username = %username, "Client left the match");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(username = %username, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                debug!(username = %username, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(username = %username, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Close frame for connections that cannot proceed
pub(crate) async fn close_socket<Tx>(sink: &mut Tx)
where
    Tx: Sink<Message> + Unpin,
{
    let _ = sink.send(Message::Close(None)).await;
}

/// Serialize onto the write half of a socket
pub(crate) async fn send_msg<Tx, T>(sink: &mut Tx, msg: &T) -> Result<(), String>
where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
    T: Serialize,
{
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::channel::mpsc as wire;

    use crate::config::Config;
    use crate::store::{Collaborators, MemoryStore};

    pub(crate) type Inbound = wire::UnboundedSender<Result<Message, axum::Error>>;
    pub(crate) type Outbound = wire::UnboundedReceiver<Message>;

    pub(crate) fn app_state() -> AppState {
        AppState::with_collaborators(
            Config::for_tests(),
            Collaborators::in_memory(Arc::new(MemoryStore::new())),
        )
    }

    /// A socket pair: what the client sends in, and what the server wrote out
    pub(crate) fn socket() -> (
        (wire::UnboundedSender<Message>, wire::UnboundedReceiver<Result<Message, axum::Error>>),
        (Inbound, Outbound),
    ) {
        let (out_tx, out_rx) = wire::unbounded();
        let (in_tx, in_rx) = wire::unbounded();
        ((out_tx, in_rx), (in_tx, out_rx))
    }

    pub(crate) fn text(json: serde_json::Value) -> Result<Message, axum::Error> {
        Ok(Message::Text(json.to_string()))
    }

    /// Next frame written by the server, as JSON, or None for a close frame
    pub(crate) async fn next_frame(out: &mut Outbound) -> Option<serde_json::Value> {
        let frame = tokio::time::timeout(Duration::from_secs(2), out.next())
            .await
            .expect("server wrote nothing")
            .expect("server dropped the socket without a close frame");
        match frame {
            Message::Text(json) => Some(serde_json::from_str(&json).unwrap()),
            Message::Close(_) => None,
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn anonymous_connection_is_closed_without_joining() {
        let state = app_state();
        let ((sink, stream), (_inbound, mut out)) = socket();

        serve_match(
            sink,
            stream,
            GameVariant::ClassicPong,
            "42".into(),
            Err(AuthError::MissingToken),
            state.clone(),
        )
        .await;

        assert_eq!(next_frame(&mut out).await, None);
        assert!(out.next().await.is_none());
        assert_eq!(state.match_registry.active_matches(), 0);
        assert_eq!(state.match_registry.connected_players(), 0);
    }

    #[tokio::test]
    async fn malformed_game_id_is_reported_then_closed() {
        let state = app_state();
        let ((sink, stream), (_inbound, mut out)) = socket();

        serve_match(
            sink,
            stream,
            GameVariant::SpaceRivalry,
            "not-a-number".into(),
            Ok("ana".into()),
            state.clone(),
        )
        .await;

        let error = next_frame(&mut out).await.unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["message"], "Invalid game id");
        assert_eq!(next_frame(&mut out).await, None);
        assert_eq!(state.match_registry.active_matches(), 0);
    }

    #[tokio::test]
    async fn unreadable_message_gets_an_error_reply() {
        let state = app_state();
        let ((sink, stream), (inbound, mut out)) = socket();
        let session = tokio::spawn(serve_match(
            sink,
            stream,
            GameVariant::ClassicPong,
            "7".into(),
            Ok("ana".into()),
            state.clone(),
        ));

        inbound
            .unbounded_send(Ok(Message::Text("{not json".into())))
            .unwrap();
        inbound
            .unbounded_send(text(serde_json::json!({"type": "warp_drive"})))
            .unwrap();

        let mut errors = 0;
        while errors < 2 {
            let frame = next_frame(&mut out).await.unwrap();
            if frame["type"] == "error" {
                assert_eq!(frame["message"], "Invalid message format");
                errors += 1;
            }
        }
        assert_eq!(state.match_registry.active_matches(), 1);

        // client hangs up; the connection leaves its match
        drop(inbound);
        session.await.unwrap();
    }
}
