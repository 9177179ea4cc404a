//! Long-lived streaming sessions.
//!
//! A session is a small state machine, `Open -> Active -> Closed`, driven
//! over any bidirectional message channel:
//!
//! - **Live Directory** pushes the principal's conversation list once on
//!   entry, then again on every `"new"` command, until `"exit"`.
//! - **Live Conversation** waits for structured requests and either sends a
//!   message (`Message` mode) or pushes a recent-message snapshot (`Fetch`
//!   mode), until `"exit"`.
//!
//! Between requests a session waits only on [`SessionChannel::recv`]. The
//! principal is fixed for the session's lifetime. Push failures are terminal
//! and never retried. Rejections a client can fix (not a participant, empty
//! content) are answered inline and the session keeps going.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::error::{CoreError, Result};
use crate::ledger::MessageLedger;
use crate::types::{Conversation, Principal};

pub const NOTICE_SENT: &str = "Message sent";
pub const NOTICE_MISSING: &str = "This conversation does not exist";
pub const NOTICE_MALFORMED: &str = "Malformed request";
pub const NOTICE_COUNT_REQUIRED: &str = "A message count is required";

/// What the peer did when we waited on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text frame.
    Message(String),
    /// The peer closed the connection. `graceful` covers normal closure,
    /// going away and abnormal closure (the peer simply vanishing).
    Closed { graceful: bool, detail: String },
    /// Reading from the connection failed.
    Failed(String),
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct ChannelError(pub String);

/// The transport under a session.
#[async_trait]
pub trait SessionChannel: Send {
    async fn send_text(&mut self, text: String) -> std::result::Result<(), ChannelError>;

    /// Wait for the next thing the peer does.
    async fn recv(&mut self) -> Inbound;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationMode {
    /// Inbound requests carry message content to send.
    Message,
    /// Inbound requests carry a count of recent messages to push back.
    Fetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer sent the exit command.
    Exit,
    /// The peer closed gracefully.
    PeerGone,
    /// Abnormal close, read failure, push failure or storage failure.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Active,
    Closed(CloseReason),
}

pub struct Session<C> {
    principal: Principal,
    channel: C,
    state: SessionState,
    snapshots: usize,
}

impl<C: SessionChannel> Session<C> {
    /// A session for an already-authenticated principal.
    pub fn new(principal: Principal, channel: C) -> Self {
        Self {
            principal,
            channel,
            state: SessionState::Open,
            snapshots: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Number of directory or message snapshots pushed so far.
    pub fn snapshots_pushed(&self) -> usize {
        self.snapshots
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Run a Live Directory session to completion.
    ///
    /// `Ok` for exit and graceful closes; an error for everything else.
    pub async fn run_directory(&mut self, directory: &Directory) -> Result<()> {
        self.activate("directory");
        let outcome = self.directory_loop(directory).await;
        self.finish(outcome)
    }

    /// Run a Live Conversation session to completion.
    pub async fn run_conversation(
        &mut self,
        ledger: &MessageLedger,
        conversation: Conversation,
        mode: ConversationMode,
    ) -> Result<()> {
        self.activate("conversation");
        let outcome = self.conversation_loop(ledger, conversation, mode).await;
        self.finish(outcome)
    }

    fn activate(&mut self, flow: &'static str) {
        debug_assert_eq!(self.state, SessionState::Open, "session already ran");
        self.state = SessionState::Active;
        info!(principal = %self.principal, flow, "session active");
    }

    fn finish(&mut self, outcome: Result<CloseReason>) -> Result<()> {
        match outcome {
            Ok(reason) => {
                info!(principal = %self.principal, ?reason, "session closed");
                self.state = SessionState::Closed(reason);
                Ok(())
            }
            Err(e) => {
                warn!(principal = %self.principal, error = %e, "session failed");
                self.state = SessionState::Closed(CloseReason::Failed);
                Err(e)
            }
        }
    }

    async fn directory_loop(&mut self, directory: &Directory) -> Result<CloseReason> {
        loop {
            let summaries = directory.list_conversations(self.principal)?;
            self.push_snapshot(&summaries).await?;

            loop {
                let Some(text) = self.next_text().await? else {
                    return Ok(CloseReason::PeerGone);
                };
                match DirectoryCommand::parse(&text) {
                    DirectoryCommand::Refresh => break,
                    DirectoryCommand::Exit => return Ok(CloseReason::Exit),
                    DirectoryCommand::Ignore => {
                        debug!(principal = %self.principal, "ignoring directory command");
                    }
                }
            }
        }
    }

    async fn conversation_loop(
        &mut self,
        ledger: &MessageLedger,
        conversation: Conversation,
        mode: ConversationMode,
    ) -> Result<CloseReason> {
        loop {
            let Some(text) = self.next_text().await? else {
                return Ok(CloseReason::PeerGone);
            };

            let request = match ConversationRequest::parse(&text) {
                Some(request) => request,
                None => {
                    self.push_text(NOTICE_MALFORMED).await?;
                    continue;
                }
            };
            if request.is_exit() {
                return Ok(CloseReason::Exit);
            }

            match mode {
                ConversationMode::Message => {
                    let content = request.content.unwrap_or_default();
                    match ledger.send(self.principal, conversation, &content) {
                        Ok(_) => self.push_text(NOTICE_SENT).await?,
                        Err(e) => self.push_rejection(e).await?,
                    }
                }
                ConversationMode::Fetch => {
                    let Some(count) = request.count else {
                        self.push_text(NOTICE_COUNT_REQUIRED).await?;
                        continue;
                    };
                    let count = usize::try_from(count).unwrap_or(usize::MAX);
                    match ledger.fetch_recent(self.principal, conversation, count) {
                        Ok(messages) => self.push_snapshot(&messages).await?,
                        Err(e) => self.push_rejection(e).await?,
                    }
                }
            }
        }
    }

    /// The next text frame, or `None` once the peer has closed gracefully.
    async fn next_text(&mut self) -> Result<Option<String>> {
        match self.channel.recv().await {
            Inbound::Message(text) => Ok(Some(text)),
            Inbound::Closed { graceful: true, .. } => Ok(None),
            Inbound::Closed { graceful: false, detail } => {
                Err(CoreError::Stream(format!("peer closed: {detail}")))
            }
            Inbound::Failed(detail) => Err(CoreError::Stream(format!("read failed: {detail}"))),
        }
    }

    /// Answer a client-fixable rejection inline; anything else ends the session.
    async fn push_rejection(&mut self, error: CoreError) -> Result<()> {
        match error {
            e if e.is_not_found() => self.push_text(NOTICE_MISSING).await,
            CoreError::InvalidInput(reason) => self.push_text(&reason).await,
            other => Err(other),
        }
    }

    async fn push_snapshot<T: serde::Serialize>(&mut self, snapshot: &T) -> Result<()> {
        let body = serde_json::to_string(snapshot)
            .map_err(|e| CoreError::Stream(format!("encode snapshot: {e}")))?;
        self.push(body).await?;
        self.snapshots += 1;
        Ok(())
    }

    async fn push_text(&mut self, text: &str) -> Result<()> {
        self.push(text.to_string()).await
    }

    async fn push(&mut self, body: String) -> Result<()> {
        self.channel
            .send_text(body)
            .await
            .map_err(|e| CoreError::Stream(format!("push failed: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Inbound control messages
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum DirectoryCommand {
    Refresh,
    Exit,
    Ignore,
}

#[derive(Deserialize)]
struct DirectoryRequest {
    message: String,
}

impl DirectoryCommand {
    /// Accepts `{"message": "new"}` or the bare word.
    fn parse(text: &str) -> Self {
        let command = serde_json::from_str::<DirectoryRequest>(text)
            .map(|r| r.message)
            .unwrap_or_else(|_| text.trim().to_string());
        match command.as_str() {
            "new" => DirectoryCommand::Refresh,
            "exit" => DirectoryCommand::Exit,
            _ => DirectoryCommand::Ignore,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConversationRequest {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default, alias = "stat")]
    command: Option<String>,
}

impl ConversationRequest {
    /// JSON object, or the bare word `exit`.
    fn parse(text: &str) -> Option<Self> {
        if text.trim() == "exit" {
            return Some(Self {
                command: Some("exit".into()),
                ..Self::default()
            });
        }
        serde_json::from_str(text).ok()
    }

    fn is_exit(&self) -> bool {
        self.command.as_deref() == Some("exit")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use courier_store::{MessageFilter, Repository};

    use super::*;
    use crate::testing::messaging;

    #[derive(Default)]
    struct ScriptedChannel {
        inbound: VecDeque<Inbound>,
        sent: Vec<String>,
        fail_sends: bool,
    }

    impl ScriptedChannel {
        fn with(frames: &[&str]) -> Self {
            Self {
                inbound: frames
                    .iter()
                    .map(|f| Inbound::Message(f.to_string()))
                    .collect(),
                ..Self::default()
            }
        }

        fn then(mut self, inbound: Inbound) -> Self {
            self.inbound.push_back(inbound);
            self
        }
    }

    #[async_trait]
    impl SessionChannel for ScriptedChannel {
        async fn send_text(&mut self, text: String) -> std::result::Result<(), ChannelError> {
            if self.fail_sends {
                return Err(ChannelError("broken pipe".into()));
            }
            self.sent.push(text);
            Ok(())
        }

        async fn recv(&mut self) -> Inbound {
            self.inbound.pop_front().unwrap_or(Inbound::Closed {
                graceful: true,
                detail: "script exhausted".into(),
            })
        }
    }

    #[tokio::test]
    async fn immediate_exit_pushes_exactly_once() {
        let (m, db) = messaging();
        db.create_direct_chat(1, 2).unwrap();

        let mut session = Session::new(Principal(1), ScriptedChannel::with(&[r#"{"message":"exit"}"#]));
        session.run_directory(&m.directory).await.unwrap();

        assert_eq!(session.channel().sent.len(), 1);
        assert_eq!(session.snapshots_pushed(), 1);
        assert_eq!(session.state(), SessionState::Closed(CloseReason::Exit));
    }

    #[tokio::test]
    async fn new_repushes_and_unknown_commands_are_ignored() {
        let (m, _db) = messaging();

        let channel = ScriptedChannel::with(&[r#"{"message":"new"}"#, "hello", "new", "exit"]);
        let mut session = Session::new(Principal(1), channel);
        session.run_directory(&m.directory).await.unwrap();

        assert_eq!(session.snapshots_pushed(), 3);
        assert!(session.channel().sent.iter().all(|s| s == "[]"));
    }

    #[tokio::test]
    async fn directory_push_reflects_new_messages() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();

        let mut session = Session::new(Principal(1), ScriptedChannel::with(&["exit"]));
        m.ledger
            .send(Principal(2), Conversation::direct(chat.id), "ping")
            .unwrap();
        session.run_directory(&m.directory).await.unwrap();

        let pushed: serde_json::Value =
            serde_json::from_str(&session.channel().sent[0]).unwrap();
        assert_eq!(pushed[0]["unread"], 1);
    }

    #[tokio::test]
    async fn graceful_close_is_not_an_error() {
        let (m, _db) = messaging();
        let channel = ScriptedChannel::default().then(Inbound::Closed {
            graceful: true,
            detail: "going away".into(),
        });

        let mut session = Session::new(Principal(1), channel);
        session.run_directory(&m.directory).await.unwrap();
        assert_eq!(session.state(), SessionState::Closed(CloseReason::PeerGone));
    }

    #[tokio::test]
    async fn other_closes_and_read_failures_surface() {
        let (m, _db) = messaging();

        for inbound in [
            Inbound::Closed {
                graceful: false,
                detail: "policy violation".into(),
            },
            Inbound::Failed("protocol error".into()),
        ] {
            let mut session = Session::new(Principal(1), ScriptedChannel::default().then(inbound));
            let err = session.run_directory(&m.directory).await.unwrap_err();
            assert!(matches!(err, CoreError::Stream(_)));
            assert_eq!(session.state(), SessionState::Closed(CloseReason::Failed));
        }
    }

    #[tokio::test]
    async fn push_failure_is_terminal() {
        let (m, _db) = messaging();
        let channel = ScriptedChannel {
            fail_sends: true,
            ..ScriptedChannel::with(&["new", "new"])
        };

        let mut session = Session::new(Principal(1), channel);
        assert!(session.run_directory(&m.directory).await.is_err());
        assert_eq!(session.channel().inbound.len(), 2);
        assert_eq!(session.snapshots_pushed(), 0);
    }

    #[tokio::test]
    async fn message_flow_reports_rejections_inline() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);

        let channel = ScriptedChannel::with(&[
            r#"{"content":""}"#,
            "not json",
            r#"{"content":"hi there"}"#,
            r#"{"stat":"exit"}"#,
            r#"{"content":"never sent"}"#,
        ]);
        let mut session = Session::new(Principal(1), channel);
        session
            .run_conversation(&m.ledger, conv, ConversationMode::Message)
            .await
            .unwrap();

        assert_eq!(
            session.channel().sent,
            vec![
                "message content can not be empty".to_string(),
                NOTICE_MALFORMED.to_string(),
                NOTICE_SENT.to_string(),
            ]
        );
        assert_eq!(db.find_messages(&MessageFilter::default()).unwrap().len(), 1);
        assert_eq!(session.snapshots_pushed(), 0);
    }

    #[tokio::test]
    async fn outsider_message_flow_keeps_running() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();

        let channel = ScriptedChannel::with(&[r#"{"content":"a"}"#, r#"{"content":"b"}"#]);
        let mut session = Session::new(Principal(3), channel);
        session
            .run_conversation(&m.ledger, Conversation::direct(chat.id), ConversationMode::Message)
            .await
            .unwrap();

        assert_eq!(session.channel().sent, vec![NOTICE_MISSING, NOTICE_MISSING]);
        assert_eq!(session.state(), SessionState::Closed(CloseReason::PeerGone));
        assert!(db.find_messages(&MessageFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_flow_pushes_snapshots_on_demand() {
        let (m, db) = messaging();
        let chat = db.create_direct_chat(1, 2).unwrap();
        let conv = Conversation::direct(chat.id);
        m.ledger.send(Principal(1), conv, "first").unwrap();
        m.ledger.send(Principal(1), conv, "second").unwrap();

        let channel = ScriptedChannel::with(&[r#"{"count":1}"#, "{}", r#"{"count":0,"command":"exit"}"#]);
        let mut session = Session::new(Principal(2), channel);
        session
            .run_conversation(&m.ledger, conv, ConversationMode::Fetch)
            .await
            .unwrap();

        let sent = &session.channel().sent;
        assert_eq!(sent.len(), 2);
        let snapshot: serde_json::Value = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(snapshot.as_array().unwrap().len(), 1);
        assert_eq!(sent[1], NOTICE_COUNT_REQUIRED);
        assert_eq!(session.snapshots_pushed(), 1);
        assert_eq!(m.ledger.unread_count(conv).unwrap(), 0);
    }

    #[test]
    fn directory_commands_parse_json_and_bare_words() {
        assert_eq!(DirectoryCommand::parse(r#"{"message":"new"}"#), DirectoryCommand::Refresh);
        assert_eq!(DirectoryCommand::parse(" exit "), DirectoryCommand::Exit);
        assert_eq!(DirectoryCommand::parse(r#"{"message":"hey"}"#), DirectoryCommand::Ignore);
    }
}
