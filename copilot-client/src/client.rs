//! Socket driver.
//!
//! One task owns the socket. The [`CopilotClient`] handle talks to it over an
//! `mpsc` channel and shares the [`Conversation`] behind a lock; connection
//! state is published on a `watch` channel. Dropping the handle stops the
//! driver.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{sleep_until, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::CopilotConfig;
use crate::conversation::Conversation;
use crate::error::{CopilotError, CopilotResult};
use crate::graph::InteractionGraph;
use crate::message::{CopilotMessage, Frame};
use crate::policy::{CloseKind, ReadyState, ABNORMAL_CLOSURE, NO_STATUS_RECEIVED};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const USER_DISCONNECT_REASON: &str = "User initiated disconnect";
/// How long a user disconnect waits for the server to acknowledge the close.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug)]
enum Command {
    Send(String),
    Disconnect,
    Reconnect,
}

/// Handle to a running channel.
pub struct CopilotClient {
    commands: mpsc::Sender<Command>,
    conversation: Arc<RwLock<Conversation>>,
    state: watch::Receiver<ReadyState>,
}

impl CopilotClient {
    /// Spawns the driver and starts connecting. Must be called inside a tokio runtime.
    pub fn connect(config: CopilotConfig) -> Self {
        let (commands, receiver) = mpsc::channel(64);
        let (state_tx, state) = watch::channel(ReadyState::Uninstantiated);
        let conversation = Arc::new(RwLock::new(Conversation::default()));

        let driver = Driver {
            config,
            commands: receiver,
            conversation: Arc::clone(&conversation),
            state: state_tx,
            pending: VecDeque::new(),
        };
        tokio::spawn(driver.run());

        Self {
            commands,
            conversation,
            state,
        }
    }

    /// Sends a user question and starts a new turn.
    ///
    /// While the socket is down the message is queued and sent once it opens.
    pub async fn send_message(&self, content: &str, client_id: u64, token: &str) -> CopilotResult<()> {
        let frame = CopilotMessage::user(content, client_id, token).to_json()?;
        self.conversation
            .write()
            .await
            .begin_user_message(content, client_id);
        self.command(Command::Send(frame)).await
    }

    /// Closes the socket with code 1000; no reconnect follows.
    pub async fn disconnect(&self) -> CopilotResult<()> {
        self.command(Command::Disconnect).await
    }

    /// Connects again after a disconnect or after reconnect attempts ran out.
    pub async fn reconnect(&self) -> CopilotResult<()> {
        self.command(Command::Reconnect).await
    }

    pub async fn clear_chat(&self) {
        self.conversation.write().await.clear();
    }

    pub fn ready_state(&self) -> ReadyState {
        *self.state.borrow()
    }

    pub fn connection_status(&self) -> &'static str {
        self.ready_state().status()
    }

    /// Subscribes to connection state changes.
    pub fn watch_state(&self) -> watch::Receiver<ReadyState> {
        self.state.clone()
    }

    /// Snapshot of the conversation.
    pub async fn conversation(&self) -> Conversation {
        self.conversation.read().await.clone()
    }

    pub async fn interaction_graph(&self) -> InteractionGraph {
        self.conversation.read().await.interaction_graph()
    }

    async fn command(&self, command: Command) -> CopilotResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CopilotError::ChannelClosed)
    }
}

/// How a connected session ended.
enum SessionEnd {
    Closed(CloseKind),
    HandleDropped,
}

/// What interrupted a backoff wait.
enum Wake {
    Elapsed,
    Stop,
    Now,
    HandleDropped,
}

struct Driver {
    config: CopilotConfig,
    commands: mpsc::Receiver<Command>,
    conversation: Arc<RwLock<Conversation>>,
    state: watch::Sender<ReadyState>,
    /// Frames sent while the socket was down.
    pending: VecDeque<String>,
}

impl Driver {
    async fn run(mut self) {
        let mut attempt: u32 = 0;
        let mut enabled = true;

        loop {
            if !enabled {
                self.state.send_replace(ReadyState::Closed);
                match self.commands.recv().await {
                    None => return,
                    Some(Command::Reconnect) => {
                        enabled = true;
                        attempt = 0;
                    }
                    Some(Command::Send(frame)) => self.pending.push_back(frame),
                    Some(Command::Disconnect) => {}
                }
                continue;
            }

            self.state.send_replace(ReadyState::Connecting);
            let close = match connect_async(self.config.endpoint.as_str()).await {
                Ok((socket, _)) => {
                    attempt = 0;
                    match self.session(socket).await {
                        SessionEnd::Closed(close) => close,
                        SessionEnd::HandleDropped => return,
                    }
                }
                Err(e) => {
                    warn!(endpoint = %self.config.endpoint, error = %e, "copilot connection failed");
                    CloseKind::Remote(ABNORMAL_CLOSURE)
                }
            };
            self.state.send_replace(ReadyState::Closed);

            if !self.config.reconnect.should_reconnect(close) {
                info!(?close, "copilot socket closed");
                enabled = false;
                continue;
            }
            let Some(delay) = self.config.reconnect.delay(attempt) else {
                warn!(attempts = attempt, "copilot reconnect attempts exhausted");
                enabled = false;
                continue;
            };
            info!(?close, attempt, delay_ms = delay.as_millis() as u64, "reconnecting to copilot");
            attempt += 1;

            match self.wait(delay).await {
                Wake::Elapsed | Wake::Now => {}
                Wake::Stop => enabled = false,
                Wake::HandleDropped => return,
            }
        }
    }

    /// Sleeps for a backoff delay while still taking commands.
    async fn wait(&mut self, delay: Duration) -> Wake {
        let deadline = Instant::now() + delay;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return Wake::Elapsed,
                command = self.commands.recv() => match command {
                    None => return Wake::HandleDropped,
                    Some(Command::Disconnect) => return Wake::Stop,
                    Some(Command::Reconnect) => return Wake::Now,
                    Some(Command::Send(frame)) => self.pending.push_back(frame),
                },
            }
        }
    }

    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut stream) = socket.split();
        self.state.send_replace(ReadyState::Open);
        info!(endpoint = %self.config.endpoint, "copilot connection open");

        while let Some(frame) = self.pending.pop_front() {
            if let Err(e) = sink.send(Message::text(frame.clone())).await {
                warn!(error = %e, "failed to flush queued message");
                self.pending.push_front(frame);
                return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE));
            }
        }

        let heartbeat = self.config.heartbeat.clone();
        let ping = match heartbeat.ping().to_json() {
            Ok(ping) => ping,
            Err(e) => {
                warn!(error = %e, "failed to encode heartbeat");
                return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE));
            }
        };
        let mut ticker = tokio::time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Close(frame))) => {
                        let code = frame.map_or(NO_STATUS_RECEIVED, |f| u16::from(f.code));
                        return SessionEnd::Closed(CloseKind::Remote(code));
                    }
                    Some(Ok(message)) => {
                        last_seen = Instant::now();
                        receive(&self.conversation, message).await;
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "copilot socket error");
                        return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE));
                    }
                    None => return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE)),
                },
                _ = ticker.tick() => {
                    if let Err(e) = sink.send(Message::text(ping.clone())).await {
                        warn!(error = %e, "heartbeat failed");
                        return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE));
                    }
                }
                _ = sleep_until(last_seen + heartbeat.timeout) => {
                    warn!(timeout_secs = heartbeat.timeout.as_secs(), "no frame from copilot, dropping socket");
                    return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE));
                }
                command = self.commands.recv() => match command {
                    Some(Command::Send(frame)) => {
                        if let Err(e) = sink.send(Message::text(frame.clone())).await {
                            warn!(error = %e, "failed to send message");
                            self.pending.push_back(frame);
                            return SessionEnd::Closed(CloseKind::Remote(ABNORMAL_CLOSURE));
                        }
                    }
                    Some(Command::Reconnect) => {}
                    Some(Command::Disconnect) => {
                        self.state.send_replace(ReadyState::Closing);
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: USER_DISCONNECT_REASON.into(),
                        }))).await;
                        let drained = tokio::time::timeout(CLOSE_GRACE, async {
                            while let Some(Ok(message)) = stream.next().await {
                                if matches!(message, Message::Close(_)) {
                                    break;
                                }
                            }
                        });
                        if drained.await.is_err() {
                            debug!("server did not acknowledge close");
                        }
                        info!("copilot disconnected by user");
                        return SessionEnd::Closed(CloseKind::UserInitiated);
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::HandleDropped;
                    }
                },
            }
        }
    }
}

/// Applies one inbound frame to the conversation.
async fn receive(conversation: &RwLock<Conversation>, message: Message) {
    let text = match &message {
        Message::Text(text) => text.as_str(),
        Message::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => return,
        },
        _ => return,
    };
    if text.is_empty() {
        return;
    }

    match Frame::decode(text) {
        Ok(Frame::Pong) => {}
        Ok(Frame::Message(message)) => {
            debug!(message_type = ?message.message_type, "copilot message");
            conversation.write().await.apply(message);
        }
        Err(e) => {
            warn!(error = %e, "undecodable copilot frame");
            conversation.write().await.fail(e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use crate::policy::{HeartbeatPolicy, ReconnectPolicy};

    const PATIENCE: Duration = Duration::from_secs(5);

    async fn listener() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    fn fast_config(url: &str) -> CopilotConfig {
        CopilotConfig {
            endpoint: url.to_string(),
            reconnect: ReconnectPolicy {
                base: Duration::from_millis(10),
                cap: Duration::from_millis(40),
                max_attempts: 10,
            },
            heartbeat: HeartbeatPolicy {
                interval: Duration::from_secs(10),
                timeout: Duration::from_secs(60),
            },
        }
    }

    async fn wait_for_state(client: &CopilotClient, wanted: ReadyState) {
        let mut state = client.watch_state();
        tokio::time::timeout(PATIENCE, state.wait_for(|s| *s == wanted))
            .await
            .expect("state not reached in time")
            .unwrap();
    }

    async fn eventually(client: &CopilotClient, check: impl Fn(&Conversation) -> bool) -> Conversation {
        let deadline = Instant::now() + PATIENCE;
        loop {
            let conversation = client.conversation().await;
            if check(&conversation) {
                return conversation;
            }
            assert!(Instant::now() < deadline, "conversation never reached expected state");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn eventually_count(counter: &AtomicUsize, wanted: usize) {
        let deadline = Instant::now() + PATIENCE;
        while counter.load(Ordering::SeqCst) < wanted {
            assert!(Instant::now() < deadline, "only {} connections", counter.load(Ordering::SeqCst));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_turn_round_trip() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let Some(Ok(Message::Text(question))) = ws.next().await else {
                panic!("expected the user message");
            };
            let question: serde_json::Value = serde_json::from_str(question.as_str()).unwrap();
            for frame in [
                r#"{"message_type":"activity","content":"planning","agent_name":"Planner","sender_agent":"Copilot"}"#,
                "pong",
                r#"{"message_type":"function","content":"2 rows","agent_name":"Analyst","sender_agent":"Planner","data_source":"Eventhouse"}"#,
                r#"{"message_type":"response","content":"MSFT closed higher","agent_name":"Copilot","sender_agent":"Planner"}"#,
            ] {
                ws.send(Message::text(frame)).await.unwrap();
            }
            while let Some(Ok(_)) = ws.next().await {}
            question
        });

        let client = CopilotClient::connect(fast_config(&url));
        wait_for_state(&client, ReadyState::Open).await;
        assert_eq!(client.connection_status(), "Connected");

        client.send_message("how did MSFT do?", 7, "user-token").await.unwrap();
        assert!(client.conversation().await.is_thinking());

        let conversation = eventually(&client, |c| !c.is_thinking()).await;
        assert_eq!(conversation.transcript().len(), 2);
        assert_eq!(conversation.transcript()[1].reply.as_deref(), Some("MSFT closed higher"));
        assert_eq!(conversation.activities().len(), 3);
        assert_eq!(conversation.error(), None);
        let graph = client.interaction_graph().await;
        assert!(graph.node("function_Analyst_Eventhouse").is_some());

        client.disconnect().await.unwrap();
        let question = server.await.unwrap();
        assert_eq!(question["message_type"], "user_message");
        assert_eq!(question["content"], "how did MSFT do?");
        assert_eq!(question["client_id"], 7);
        assert_eq!(question["token"], "user-token");
    }

    #[tokio::test]
    async fn test_error_frame_stops_thinking() {
        let (listener, url) = listener().await;
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            let _ = ws.next().await;
            ws.send(Message::text("{not json")).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let client = CopilotClient::connect(fast_config(&url));
        client.send_message("queued before open", 1, "t").await.unwrap();

        let conversation = eventually(&client, |c| c.error().is_some()).await;
        assert!(!conversation.is_thinking());
    }

    #[tokio::test]
    async fn test_normal_closure_does_not_reconnect() {
        let (listener, url) = listener().await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                let mut ws = accept_async(tcp).await.unwrap();
                ws.close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "bye".into(),
                }))
                .await
                .unwrap();
                while let Some(Ok(_)) = ws.next().await {}
            }
        });

        let client = CopilotClient::connect(fast_config(&url));
        eventually_count(&accepted, 1).await;
        wait_for_state(&client, ReadyState::Closed).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(accepted.load(Ordering::SeqCst), 1);
        assert_eq!(client.connection_status(), "Disconnected");
    }

    #[tokio::test]
    async fn test_dropped_connection_reconnects() {
        let (listener, url) = listener().await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut kept = Vec::new();
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let ws = accept_async(tcp).await.unwrap();
                if n > 0 {
                    kept.push(ws);
                }
            }
        });

        let client = CopilotClient::connect(fast_config(&url));

        eventually_count(&accepted, 2).await;
        wait_for_state(&client, ReadyState::Open).await;
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (listener, url) = listener().await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                drop(tcp);
            }
        });
        let mut config = fast_config(&url);
        config.reconnect.max_attempts = 3;

        let client = CopilotClient::connect(config);

        eventually_count(&accepted, 4).await;
        wait_for_state(&client, ReadyState::Closed).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), 4);
        assert_eq!(client.ready_state(), ReadyState::Closed);

        client.reconnect().await.unwrap();
        eventually_count(&accepted, 5).await;
    }

    #[tokio::test]
    async fn test_heartbeat_sends_ping() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            match ws.next().await {
                Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                other => panic!("expected a ping, got {other:?}"),
            }
        });
        let mut config = fast_config(&url);
        config.heartbeat.interval = Duration::from_millis(30);

        let _client = CopilotClient::connect(config);

        let ping = tokio::time::timeout(PATIENCE, server).await.unwrap().unwrap();
        assert_eq!(ping, r#"{"message_type":"ping","content":""}"#);
    }

    #[tokio::test]
    async fn test_silent_server_is_treated_as_dead() {
        let (listener, url) = listener().await;
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            let mut kept = Vec::new();
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                counter.fetch_add(1, Ordering::SeqCst);
                kept.push(accept_async(tcp).await.unwrap());
            }
        });
        let mut config = fast_config(&url);
        config.heartbeat.timeout = Duration::from_millis(100);

        let _client = CopilotClient::connect(config);

        eventually_count(&accepted, 2).await;
    }

    #[tokio::test]
    async fn test_user_disconnect_closes_normally_and_can_reconnect() {
        let (listener, url) = listener().await;
        let (codes_tx, mut codes) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = accept_async(tcp).await.unwrap();
                let codes_tx = codes_tx.clone();
                tokio::spawn(async move {
                    while let Some(Ok(message)) = ws.next().await {
                        if let Message::Close(Some(frame)) = message {
                            let _ = codes_tx.send((u16::from(frame.code), frame.reason.as_str().to_string()));
                        }
                    }
                });
            }
        });

        let client = CopilotClient::connect(fast_config(&url));
        wait_for_state(&client, ReadyState::Open).await;

        client.disconnect().await.unwrap();

        let (code, reason) = tokio::time::timeout(PATIENCE, codes.recv()).await.unwrap().unwrap();
        assert_eq!(code, 1000);
        assert_eq!(reason, "User initiated disconnect");
        wait_for_state(&client, ReadyState::Closed).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(client.ready_state(), ReadyState::Closed);

        client.reconnect().await.unwrap();
        wait_for_state(&client, ReadyState::Open).await;
    }

    #[tokio::test]
    async fn test_clear_chat() {
        let (_listener, url) = listener().await;
        let client = CopilotClient::connect(fast_config(&url));
        client.send_message("q", 1, "t").await.unwrap();

        client.clear_chat().await;

        assert!(client.conversation().await.transcript().is_empty());
    }
}
