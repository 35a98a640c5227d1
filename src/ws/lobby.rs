//! Matchmaking and invite sockets

use std::fmt::Display;

use axum::{
    extract::{
        ws::{Message, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{Sink, Stream, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::http::middleware::{authenticate, AuthError};
use crate::matchmaking::QueuedPlayer;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::handler::{close_socket, send_msg, WsQuery};
use crate::ws::protocol::{InviteClientMsg, InviteMsg, MatchmakingClientMsg, MatchmakingMsg};

pub async fn matchmaking_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let identity = authenticate(query.token.as_deref(), &state.config.jwt_secret);
    ws.on_upgrade(move |socket| {
        let (sink, stream) = socket.split();
        serve_matchmaking(sink, stream, identity, state)
    })
}

pub async fn invites_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let identity = authenticate(query.token.as_deref(), &state.config.jwt_secret);
    ws.on_upgrade(move |socket| {
        let (sink, stream) = socket.split();
        serve_invites(sink, stream, identity, state)
    })
}

/// Text frames until the client closes or the stream fails, rate limited
async fn next_text<Rx, E>(
    ws_stream: &mut Rx,
    rate_limiter: &ConnectionRateLimiter,
    username: &str,
) -> Option<String>
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    while let Some(Ok(message)) = ws_stream.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return None,
            _ => continue,
        };
        if !rate_limiter.check() {
            warn!(username = %username, "Rate limited lobby message");
            continue;
        }
        return Some(text);
    }
    None
}

pub(crate) async fn serve_matchmaking<Tx, Rx, E>(
    mut sink: Tx,
    mut ws_stream: Rx,
    identity: Result<String, AuthError>,
    state: AppState,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Send,
{
    let username = match identity {
        Ok(username) => username,
        Err(e) => {
            warn!(error = %e, "Matchmaking connection without identity, closing");
            close_socket(&mut sink).await;
            return;
        }
    };
    if let Err(e) = state.matchmaking.admit(&username) {
        info!(username = %username, error = %e, "Matchmaking connection refused");
        close_socket(&mut sink).await;
        return;
    }

    let conn_id = Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(forward(sink, rx));

    let _ = tx.send(MatchmakingMsg::Searching {
        username: username.clone(),
    });
    info!(username = %username, conn_id = %conn_id, "Matchmaking connection opened");

    let rate_limiter = ConnectionRateLimiter::for_lobby();
    while let Some(text) = next_text(&mut ws_stream, &rate_limiter, &username).await {
        if find_match(&state, conn_id, &username, &text, &tx).await {
            break;
        }
    }

    state.matchmaking.leave(conn_id);
    drop(tx);
    // pending notices (a pairing that just happened) still flush
    let _ = writer.await;
    info!(username = %username, conn_id = %conn_id, "Matchmaking connection closed");
}

/// Handle one matchmaking frame. Returns true when the connection must end.
async fn find_match(
    state: &AppState,
    conn_id: Uuid,
    username: &str,
    text: &str,
    tx: &mpsc::UnboundedSender<MatchmakingMsg>,
) -> bool {
    let game_type = match serde_json::from_str::<MatchmakingClientMsg>(text) {
        Ok(MatchmakingClientMsg::FindMatch { game_type }) => game_type,
        Err(e) => {
            debug!(username = %username, error = %e, "Ignoring matchmaking message");
            return false;
        }
    };

    let player = QueuedPlayer::new(conn_id, username.to_string(), tx.clone());
    match state.matchmaking.find_match(player, game_type.as_deref()).await {
        Ok(()) => false,
        Err(e) => {
            warn!(username = %username, error = %e, "find_match rejected");
            let _ = tx.send(MatchmakingMsg::Error {
                message: e.to_string(),
            });
            e.closes_connection()
        }
    }
}

pub(crate) async fn serve_invites<Tx, Rx, E>(
    mut sink: Tx,
    mut ws_stream: Rx,
    identity: Result<String, AuthError>,
    state: AppState,
) where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Tx::Error: Display,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Send,
{
    let username = match identity {
        Ok(username) => username,
        Err(e) => {
            warn!(error = %e, "Invite connection without identity, closing");
            close_socket(&mut sink).await;
            return;
        }
    };

    let conn_id = Uuid::new_v4();
    let (tx, rx) = mpsc::unbounded_channel();
    if let Err(e) = state.invites.connect(&username, conn_id, tx.clone()) {
        info!(username = %username, error = %e, "Invite connection refused");
        close_socket(&mut sink).await;
        return;
    }

    let writer = tokio::spawn(forward(sink, rx));

    let rate_limiter = ConnectionRateLimiter::for_lobby();
    while let Some(text) = next_text(&mut ws_stream, &rate_limiter, &username).await {
        if let Some(reply) = route_invite(&state, &username, &text).await {
            let _ = tx.send(reply);
        }
    }

    state.invites.disconnect(&username, conn_id);
    drop(tx);
    writer.abort();
}

/// Handle one invite frame, producing the caller's reply if there is one
async fn route_invite(state: &AppState, username: &str, text: &str) -> Option<InviteMsg> {
    let msg = match serde_json::from_str::<InviteClientMsg>(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(username = %username, error = %e, "Ignoring invite message");
            return None;
        }
    };

    let reply = match msg {
        InviteClientMsg::SendInvite {
            target_username,
            game_type,
        } => state
            .invites
            .send_invite(username, &target_username, &game_type)
            .map(Some),
        InviteClientMsg::AcceptInvite {
            from_username,
            game_type,
        } => state
            .invites
            .accept_invite(username, &from_username, &game_type)
            .await
            .map(Some),
        InviteClientMsg::DeclineInvite { from_username } => {
            state.invites.decline_invite(username, &from_username);
            Ok(None)
        }
    };

    match reply {
        Ok(notice) => notice,
        Err(e) => {
            debug!(username = %username, error = %e, "Invite request failed");
            Some(InviteMsg::InviteError {
                message: e.to_string(),
            })
        }
    }
}

/// Drain an outbox onto the socket until every sender is gone, then close
async fn forward<Tx, T>(mut ws_sink: Tx, mut rx: mpsc::UnboundedReceiver<T>)
where
    Tx: Sink<Message> + Unpin + Send,
    Tx::Error: Display,
    T: Serialize + Send + Sync,
{
    while let Some(msg) = rx.recv().await {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(error = %e, "Lobby send failed");
            return;
        }
    }
    close_socket(&mut ws_sink).await;
}
