//! WebSocket endpoints for streaming sessions.
//!
//! Each upgrade runs one [`Session`] on its own task. The socket adapter
//! maps WebSocket frames onto the session's [`Inbound`] events: normal
//! closure, going away, abnormal closure and a vanished peer count as
//! graceful, any other close code as a failure.

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::SinkExt;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

use courier_core::session::{
    ChannelError, CloseReason, ConversationMode, Inbound, Session, SessionChannel, SessionState,
};
use courier_core::{Conversation, Principal};

use crate::api::AppState;
use crate::auth::Authenticated;

pub struct WsChannel {
    socket: WebSocket,
}

impl WsChannel {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }

    async fn close(mut self) {
        if let Err(e) = self.socket.close().await {
            debug!(error = %e, "close handshake failed");
        }
    }
}

#[async_trait]
impl SessionChannel for WsChannel {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        self.socket
            .send(WsMessage::Text(text.into()))
            .await
            .map_err(|e| ChannelError(e.to_string()))
    }

    async fn recv(&mut self) -> Inbound {
        loop {
            match self.socket.recv().await {
                None => {
                    return Inbound::Closed {
                        graceful: true,
                        detail: "connection dropped".into(),
                    }
                }
                Some(Err(e)) => return classify_read_error(&e),
                Some(Ok(WsMessage::Text(text))) => return Inbound::Message(text.as_str().to_owned()),
                Some(Ok(WsMessage::Binary(bytes))) => {
                    return Inbound::Message(String::from_utf8_lossy(&bytes).into_owned())
                }
                Some(Ok(WsMessage::Close(frame))) => return classify_close(frame),
                // Pings are answered by the socket itself.
                Some(Ok(WsMessage::Ping(_) | WsMessage::Pong(_))) => continue,
            }
        }
    }
}

fn classify_close(frame: Option<CloseFrame>) -> Inbound {
    let Some(frame) = frame else {
        return Inbound::Closed {
            graceful: true,
            detail: "closed without status".into(),
        };
    };

    let graceful = matches!(
        frame.code,
        close_code::NORMAL | close_code::AWAY | close_code::ABNORMAL
    );
    Inbound::Closed {
        graceful,
        detail: format!("code {} {}", frame.code, frame.reason.as_str()),
    }
}

/// A peer that drops the connection without a close frame surfaces as a read
/// error, but it is the "vanished peer" case and ends the session normally.
fn classify_read_error(err: &(dyn std::error::Error + 'static)) -> Inbound {
    let mut cause = Some(err);
    while let Some(e) = cause {
        let vanished = match e.downcast_ref::<std::io::Error>() {
            Some(io) => matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::BrokenPipe
            ),
            None => e.to_string().to_lowercase().contains("without closing handshake"),
        };
        if vanished {
            return Inbound::Closed {
                graceful: true,
                detail: e.to_string(),
            };
        }
        cause = e.source();
    }
    Inbound::Failed(err.to_string())
}

async fn run_session<F, Fut>(socket: WebSocket, principal: Principal, flow: &'static str, drive: F)
where
    F: FnOnce(Session<WsChannel>) -> Fut,
    Fut: std::future::Future<Output = Session<WsChannel>>,
{
    let span = info_span!("session", id = %Uuid::new_v4(), %principal, flow);
    async move {
        let session = drive(Session::new(principal, WsChannel::new(socket))).await;
        if session.state() == SessionState::Closed(CloseReason::Exit) {
            session.into_channel().close().await;
        }
    }
    .instrument(span)
    .await
}

pub async fn directory_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
) -> Response {
    ws.on_upgrade(move |socket| {
        run_session(socket, principal, "directory", move |mut session| async move {
            // Failures are logged by the session.
            let _ = session.run_directory(&state.messaging.directory).await;
            session
        })
    })
}

fn conversation_socket(
    ws: WebSocketUpgrade,
    state: AppState,
    principal: Principal,
    conversation: Conversation,
    mode: ConversationMode,
) -> Response {
    let flow = match mode {
        ConversationMode::Message => "send",
        ConversationMode::Fetch => "fetch",
    };
    ws.on_upgrade(move |socket| {
        run_session(socket, principal, flow, move |mut session| async move {
            let _ = session
                .run_conversation(&state.messaging.ledger, conversation, mode)
                .await;
            session
        })
    })
}

pub async fn chat_send_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(chat_id): Path<u64>,
) -> Response {
    conversation_socket(ws, state, principal, Conversation::direct(chat_id), ConversationMode::Message)
}

pub async fn chat_fetch_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(chat_id): Path<u64>,
) -> Response {
    conversation_socket(ws, state, principal, Conversation::direct(chat_id), ConversationMode::Fetch)
}

pub async fn group_send_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
) -> Response {
    conversation_socket(ws, state, principal, Conversation::group(group_id), ConversationMode::Message)
}

pub async fn group_fetch_socket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Authenticated(principal): Authenticated,
    Path(group_id): Path<u64>,
) -> Response {
    conversation_socket(ws, state, principal, Conversation::group(group_id), ConversationMode::Fetch)
}
