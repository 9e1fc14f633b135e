//! Connection loop: one socket at a time, reconnecting with backoff
//!
//! The `TerminalSession` outlives every socket, so the grid, the active
//! prompt and any type-ahead survive a reconnect. The server replays its
//! last batch on resume and the session skips it when nothing was missed.

use anyhow::{bail, Result};
use cellquest_core::transport::{Backoff, Heartbeat, ReconnectConfig, KEEPALIVE_INTERVAL};
use cellquest_core::types::{ServerControl, ServerMessage};
use cellquest_core::{
    ClientMessage, MessageCodec, Surface, TerminalSession, VirtualTerminal, TERM_COLS, TERM_ROWS,
};
use crossterm::event::Event;
use futures::{SinkExt, Stream, StreamExt};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::keys::{translate, Input};
use crate::token_file;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    /// Where the session token is kept between runs
    pub token_file: PathBuf,
    /// Ignore any stored token and start a new game
    pub fresh: bool,
    pub reconnect: ReconnectConfig,
    pub keepalive: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, token_file: PathBuf) -> Self {
        Self {
            url: url.into(),
            token_file,
            fresh: false,
            reconnect: ReconnectConfig::default(),
            keepalive: KEEPALIVE_INTERVAL,
        }
    }
}

/// Why the client stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The player pressed Ctrl+C
    Quit,
    /// The server closed the session
    SessionEnded,
}

/// How one socket ended
enum Link {
    Quit,
    Ended,
    Lost,
}

pub struct Client<S: Surface> {
    config: ClientConfig,
    session: TerminalSession,
    surface: S,
}

impl<S: Surface> Client<S> {
    pub fn new(config: ClientConfig, surface: S) -> Self {
        let token = if config.fresh {
            None
        } else {
            token_file::load(&config.token_file)
        };
        if token.is_some() {
            info!("Resuming with stored token");
        }
        let session =
            TerminalSession::new(VirtualTerminal::new(TERM_ROWS, TERM_COLS)).with_token(token);
        Self {
            config,
            session,
            surface,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Play until the player quits or the server ends the session
    pub async fn run<K>(&mut self, keys: &mut K) -> Result<Exit>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        let mut backoff = Backoff::new(self.config.reconnect.clone());
        self.surface.present(self.session.terminal())?;

        loop {
            self.surface
                .status(&format!("Connecting to {}...", self.config.url))?;

            match tokio_tungstenite::connect_async(self.config.url.as_str()).await {
                Ok((socket, _)) => {
                    info!("Connected to {}", self.config.url);
                    backoff.reset();
                    self.surface.status("")?;
                    match self.drive(socket, keys).await? {
                        Link::Quit => return Ok(Exit::Quit),
                        Link::Ended => return Ok(Exit::SessionEnded),
                        Link::Lost => info!("Connection lost"),
                    }
                }
                Err(e) => warn!("Connect to {} failed: {}", self.config.url, e),
            }

            let Some(delay) = backoff.next_delay() else {
                bail!("Gave up after {} attempts", backoff.attempts());
            };
            self.surface.status(&format!(
                "Disconnected. Reconnecting in {}s... (Ctrl+C quits)",
                delay.as_secs().max(1)
            ))?;
            if self.wait_offline(delay, keys).await? {
                return Ok(Exit::Quit);
            }
        }
    }

    /// Run one socket until it ends
    async fn drive<K>(&mut self, socket: Socket, keys: &mut K) -> Result<Link>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        let (mut sink, mut stream) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        let _ = tx.send(self.session.connect_message());
        let heartbeat = Heartbeat::spawn(tx.clone(), self.config.keepalive);

        let link = loop {
            tokio::select! {
                biased;

                Some(msg) = rx.recv() => {
                    let frame = MessageCodec::encode_client(&msg)?;
                    if let Err(e) = sink.send(Message::Text(frame)).await {
                        debug!("Send failed: {}", e);
                        break Link::Lost;
                    }
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.on_frame(&text, &tx)?,
                    Some(Ok(Message::Close(Some(frame)))) if frame.code == CloseCode::Normal => {
                        info!("Server ended the session: {}", frame.reason);
                        break Link::Ended;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Server dropped the connection: {:?}", frame);
                        break Link::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("Socket error: {}", e);
                        break Link::Lost;
                    }
                    None => break Link::Lost,
                },
                event = keys.next() => match event {
                    Some(Ok(event)) => {
                        if self.on_event(event, &tx)? {
                            let frame = MessageCodec::encode_client(&ClientMessage::reset())?;
                            let _ = sink.send(Message::Text(frame)).await;
                            break Link::Quit;
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => break Link::Quit,
                },
            }
        };

        heartbeat.abort();
        let _ = sink.close().await;
        Ok(link)
    }

    /// Sleep out a backoff delay while still taking keys; true on quit
    async fn wait_offline<K>(&mut self, delay: Duration, keys: &mut K) -> Result<bool>
    where
        K: Stream<Item = std::io::Result<Event>> + Unpin,
    {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        // Answers given now are resent when the server replays on resume
        let (tx, _rx) = mpsc::unbounded_channel();
        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(false),
                event = keys.next() => match event {
                    Some(Ok(event)) => {
                        if self.on_event(event, &tx)? {
                            return Ok(true);
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(true),
                },
            }
        }
    }

    fn on_frame(&mut self, text: &str, tx: &mpsc::UnboundedSender<ClientMessage>) -> Result<()> {
        let msg = match MessageCodec::decode_server(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Dropping malformed server frame: {}", e);
                return Ok(());
            }
        };

        if let ServerMessage::Control(ServerControl::Token { token }) = &msg {
            if let Err(e) = token_file::save(&self.config.token_file, token) {
                warn!("{:#}", e);
            }
        }

        for response in self.session.handle_server(msg) {
            let _ = tx.send(response);
        }
        self.surface.present(self.session.terminal())?;
        Ok(())
    }

    /// Handle a terminal event; true when the player asked to quit
    fn on_event(&mut self, event: Event, tx: &mpsc::UnboundedSender<ClientMessage>) -> Result<bool> {
        match event {
            Event::Key(key) => match translate(&key) {
                Some(Input::Quit) => return Ok(true),
                Some(Input::Key(key)) => {
                    if let Some(response) = self.session.handle_key(key) {
                        let _ = tx.send(response);
                    }
                    self.surface.present(self.session.terminal())?;
                }
                None => {}
            },
            Event::Resize(..) => self.surface.present(self.session.terminal())?,
            _ => {}
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellquest_core::{MockSurface, RenderCommand};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use cellquest_core::protocol::CLOSE_SESSION_ENDED;
    use futures::channel::mpsc as fmpsc;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;

    type KeyFeed = fmpsc::UnboundedSender<std::io::Result<Event>>;
    type KeyStream = fmpsc::UnboundedReceiver<std::io::Result<Event>>;

    const TOKEN: &str = "00112233445566778899aabbccddeeff00112233445566778899aabbccddeeff";

    fn key_feed() -> (KeyFeed, KeyStream) {
        fmpsc::unbounded()
    }

    fn press(feed: &KeyFeed, code: KeyCode, modifiers: KeyModifiers) {
        feed.unbounded_send(Ok(Event::Key(KeyEvent::new(code, modifiers))))
            .unwrap();
    }

    fn scratch_token_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cellquest-client-{}-{}", std::process::id(), name))
    }

    fn config(url: String, token_file: PathBuf) -> ClientConfig {
        let mut config = ClientConfig::new(url, token_file);
        config.reconnect.initial_backoff = Duration::from_millis(10);
        config
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws", listener.local_addr().unwrap());
        (listener, url)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (tcp, _) = listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(tcp).await.unwrap()
    }

    async fn read_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => return serde_json::from_str(&text).unwrap(),
                _ => continue,
            }
        }
    }

    async fn send_json(ws: &mut WebSocketStream<TcpStream>, value: Value) {
        ws.send(Message::Text(value.to_string())).await.unwrap();
    }

    async fn end_session(ws: &mut WebSocketStream<TcpStream>) {
        ws.close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: CLOSE_SESSION_ENDED.into(),
        }))
        .await
        .unwrap();
    }

    fn welcome() -> Value {
        serde_json::to_value(vec![
            RenderCommand::print("Welcome!"),
            RenderCommand::GetKey { options: None, epoch: 1 },
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_plays_until_server_closes() {
        let (listener, url) = listen().await;
        let token_path = scratch_token_file("play");
        let _ = std::fs::remove_file(&token_path);

        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            assert_eq!(read_json(&mut ws).await, json!({"type": "connect"}));
            send_json(&mut ws, json!({"type": "token", "token": TOKEN})).await;
            send_json(&mut ws, welcome()).await;

            let answer = read_json(&mut ws).await;
            end_session(&mut ws).await;
            answer
        });

        let (feed, mut keys) = key_feed();
        press(&feed, KeyCode::Char('y'), KeyModifiers::NONE);

        let mut client = Client::new(config(url, token_path.clone()), MockSurface::new());
        let exit = client.run(&mut keys).await.unwrap();

        assert_eq!(exit, Exit::SessionEnded);
        assert_eq!(server.await.unwrap(), json!({"input": "y", "epoch": 1}));
        assert_eq!(token_file::load(&token_path), Some(TOKEN.to_string()));
        let frame = client.surface().last_frame().unwrap();
        assert!(frame[0].starts_with("Welcome!"));

        let _ = std::fs::remove_file(&token_path);
    }

    #[tokio::test]
    async fn test_reconnects_with_token() {
        let (listener, url) = listen().await;
        let token_path = scratch_token_file("reconnect");
        let _ = std::fs::remove_file(&token_path);

        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            read_json(&mut ws).await;
            send_json(&mut ws, json!({"type": "token", "token": TOKEN})).await;
            send_json(&mut ws, welcome()).await;
            drop(ws);

            // a bare close, as when the server drops an idle socket
            let mut ws = accept(&listener).await;
            let first = read_json(&mut ws).await;
            ws.close(None).await.unwrap();

            let mut ws = accept(&listener).await;
            let second = read_json(&mut ws).await;
            end_session(&mut ws).await;
            (first, second)
        });

        let (_feed, mut keys) = key_feed();
        let mut client = Client::new(config(url, token_path.clone()), MockSurface::new());
        let exit = client.run(&mut keys).await.unwrap();

        assert_eq!(exit, Exit::SessionEnded);
        let (first, second) = server.await.unwrap();
        assert_eq!(first, json!({"type": "connect", "token": TOKEN}));
        assert_eq!(second, json!({"type": "connect", "token": TOKEN}));

        let _ = std::fs::remove_file(&token_path);
    }

    #[tokio::test]
    async fn test_ctrl_c_sends_reset() {
        let (listener, url) = listen().await;
        let token_path = scratch_token_file("quit");

        let server = tokio::spawn(async move {
            let mut ws = accept(&listener).await;
            assert_eq!(read_json(&mut ws).await, json!({"type": "connect"}));
            read_json(&mut ws).await
        });

        let (feed, mut keys) = key_feed();
        press(&feed, KeyCode::Char('c'), KeyModifiers::CONTROL);

        let mut config = config(url, token_path.clone());
        config.fresh = true;
        let mut client = Client::new(config, MockSurface::new());

        assert_eq!(client.run(&mut keys).await.unwrap(), Exit::Quit);
        assert_eq!(server.await.unwrap(), json!({"type": "reset"}));

        let _ = std::fs::remove_file(&token_path);
    }
}
