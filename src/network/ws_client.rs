use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::codec;
use super::config::ClientConfig;
use crate::constants::{CMD_SET_BAUD_RATE, WS_CLOSE_NORMAL};
use crate::error::{ClientError, ClientResult};

/// `WebSocket.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ReadyState {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            2 => ReadyState::Closing,
            _ => ReadyState::Closed,
        }
    }
}

/// A single socket as seen by the connection manager.
pub trait IWsClient {
    fn ready_state(&self) -> ReadyState;
    fn send_text(&self, text: &str) -> ClientResult<()>;
    fn close(&self, code: u16) -> ClientResult<()>;
}

/// Creates sockets.  `generation` identifies the socket in the events it
/// later reports back through [`SocketEvent`].
pub trait SocketOpener {
    fn open(&self, url: &str, protocol: &str, generation: u64) -> ClientResult<Box<dyn IWsClient>>;
}

/// Events a socket reports back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Open,
    Text(String),
    Error(String),
    Close { code: u16, reason: String },
}

/// Represents the current state of the WebSocket connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new socket was created; the session starts over.
    Opened,
    /// The current socket is still usable and was kept.
    Reused,
}

/// Owns the one socket of a session.  Nothing else writes to it.
pub struct ConnectionManager {
    config: ClientConfig,
    opener: Rc<dyn SocketOpener>,
    socket: Option<Box<dyn IWsClient>>,
    generation: u64,
    state: ConnectionState,
    url: Option<String>,
    baud: u32,
}

impl ConnectionManager {
    pub fn new(config: ClientConfig, opener: Rc<dyn SocketOpener>) -> Self {
        let baud = config.default_baud;
        Self {
            config,
            opener,
            socket: None,
            generation: 0,
            state: ConnectionState::Disconnected,
            url: None,
            baud,
        }
    }

    pub fn connection_state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.socket
            .as_ref()
            .map_or(false, |ws| ws.ready_state() == ReadyState::Open)
    }

    /// Open a socket to `address`, or keep the current one if it is still
    /// connecting or open.
    pub fn connect(&mut self, address: &str, baud: u32) -> ClientResult<ConnectOutcome> {
        let baud = self.config.resolve_baud(baud);

        if let Some(ws) = &self.socket {
            match ws.ready_state() {
                ReadyState::Open => {
                    if baud != self.baud {
                        self.baud = baud;
                        self.send_baud_rate()?;
                    }
                    debug!(url = ?self.url, "reusing open websocket");
                    return Ok(ConnectOutcome::Reused);
                }
                ReadyState::Connecting => {
                    // The pending open will announce the new rate.
                    self.baud = baud;
                    debug!(url = ?self.url, "reusing websocket that is still connecting");
                    return Ok(ConnectOutcome::Reused);
                }
                ReadyState::Closing | ReadyState::Closed => {
                    self.socket = None;
                }
            }
        }

        let url = self.config.ws_url(address);
        self.generation += 1;
        info!(%url, baud, generation = self.generation, "connecting to gateway");

        match self.opener.open(&url, &self.config.subprotocol, self.generation) {
            Ok(ws) => {
                self.socket = Some(ws);
                self.url = Some(url);
                self.baud = baud;
                self.state = ConnectionState::Connecting;
                Ok(ConnectOutcome::Opened)
            }
            Err(e) => {
                let detail = e.to_string();
                warn!(%url, error = %detail, "could not create websocket");
                self.state = ConnectionState::Error(detail.clone());
                Err(ClientError::ConnectionFailed(detail))
            }
        }
    }

    /// Encode and send one command.  Fails with `NotConnected` unless the
    /// socket is open; nothing is queued or retried.
    pub fn send<T: Serialize + ?Sized>(&self, command: &str, data: Option<&T>) -> ClientResult<()> {
        let ws = match &self.socket {
            Some(ws) if ws.ready_state() == ReadyState::Open => ws,
            _ => {
                warn!(command, "attempted to send while websocket is not connected");
                return Err(ClientError::NotConnected);
            }
        };
        let wire = codec::encode(command, data)?;
        debug!(command, "sending");
        ws.send_text(&wire)
    }

    fn send_baud_rate(&self) -> ClientResult<()> {
        self.send(CMD_SET_BAUD_RATE, Some(&self.baud))
    }

    /// Whether an event tagged with `generation` comes from the current socket.
    pub fn is_current(&self, generation: u64) -> bool {
        self.socket.is_some() && generation == self.generation
    }

    /// The socket finished its handshake.  Announces the baud rate first.
    pub fn handle_open(&mut self) -> ClientResult<()> {
        info!(url = ?self.url, "websocket connected");
        self.state = ConnectionState::Connected;
        self.send_baud_rate()
    }

    /// The socket failed.  It is dropped; reconnecting is up to the user.
    pub fn handle_error(&mut self, detail: &str) -> ClientError {
        warn!(url = ?self.url, error = detail, "websocket error");
        self.socket = None;
        self.state = ConnectionState::Error(detail.to_string());
        ClientError::ConnectionFailed(detail.to_string())
    }

    pub fn handle_close(&mut self, code: u16, reason: &str) {
        info!(url = ?self.url, code, reason, "websocket closed");
        self.socket = None;
        self.state = ConnectionState::Disconnected;
    }

    /// Close the socket on purpose.
    pub fn close(&mut self) -> ClientResult<()> {
        self.state = ConnectionState::Disconnected;
        match self.socket.take() {
            Some(ws) => {
                info!(url = ?self.url, "closing websocket");
                ws.close(WS_CLOSE_NORMAL)
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct MockState {
        ready: Option<ReadyState>,
        sent: Vec<String>,
        opened: Vec<(String, String, u64)>,
        closed_with: Option<u16>,
    }

    struct MockWsClient(Rc<RefCell<MockState>>);

    impl IWsClient for MockWsClient {
        fn ready_state(&self) -> ReadyState {
            self.0.borrow().ready.unwrap_or(ReadyState::Closed)
        }

        fn send_text(&self, text: &str) -> ClientResult<()> {
            self.0.borrow_mut().sent.push(text.to_string());
            Ok(())
        }

        fn close(&self, code: u16) -> ClientResult<()> {
            let mut state = self.0.borrow_mut();
            state.closed_with = Some(code);
            state.ready = Some(ReadyState::Closed);
            Ok(())
        }
    }

    struct MockOpener(Rc<RefCell<MockState>>);

    impl SocketOpener for MockOpener {
        fn open(&self, url: &str, protocol: &str, generation: u64) -> ClientResult<Box<dyn IWsClient>> {
            let mut state = self.0.borrow_mut();
            state.opened.push((url.to_string(), protocol.to_string(), generation));
            state.ready = Some(ReadyState::Connecting);
            Ok(Box::new(MockWsClient(self.0.clone())))
        }
    }

    fn manager() -> (ConnectionManager, Rc<RefCell<MockState>>) {
        let mock = Rc::new(RefCell::new(MockState::default()));
        let opener = Rc::new(MockOpener(mock.clone()));
        (ConnectionManager::new(ClientConfig::default(), opener), mock)
    }

    #[test]
    fn connect_uses_defaults_and_announces_baud_on_open() {
        let (mut conn, mock) = manager();
        assert_eq!(conn.connect("", 0), Ok(ConnectOutcome::Opened));
        assert_eq!(
            mock.borrow().opened,
            vec![("ws://127.0.0.1:8000".to_string(), "j1939-protocol".to_string(), 1)]
        );
        assert_eq!(conn.connection_state(), &ConnectionState::Connecting);

        mock.borrow_mut().ready = Some(ReadyState::Open);
        conn.handle_open().unwrap();
        assert_eq!(mock.borrow().sent, vec![r#"{"command":"set baud rate","data":250}"#]);
        assert_eq!(conn.connection_state(), &ConnectionState::Connected);
    }

    #[test]
    fn send_requires_open_socket() {
        let (mut conn, mock) = manager();
        assert_eq!(conn.send::<u32>("list frames", None), Err(ClientError::NotConnected));

        conn.connect("10.0.0.2", 500).unwrap();
        assert_eq!(conn.send::<u32>("list frames", None), Err(ClientError::NotConnected));
        assert!(mock.borrow().sent.is_empty());
    }

    #[test]
    fn open_socket_is_reused() {
        let (mut conn, mock) = manager();
        conn.connect("10.0.0.2", 500).unwrap();
        mock.borrow_mut().ready = Some(ReadyState::Open);
        conn.handle_open().unwrap();

        assert_eq!(conn.connect("10.0.0.3", 500), Ok(ConnectOutcome::Reused));
        assert_eq!(mock.borrow().opened.len(), 1);
        assert_eq!(mock.borrow().sent.len(), 1);

        assert_eq!(conn.connect("", 1000), Ok(ConnectOutcome::Reused));
        assert_eq!(
            mock.borrow().sent.last().map(String::as_str),
            Some(r#"{"command":"set baud rate","data":1000}"#)
        );
    }

    #[test]
    fn error_drops_socket_and_reports_failure() {
        let (mut conn, mock) = manager();
        conn.connect("", 0).unwrap();
        let generation = conn.generation();
        assert!(conn.is_current(generation));

        let err = conn.handle_error("refused");
        assert_eq!(err, ClientError::ConnectionFailed("refused".into()));
        assert!(!conn.is_current(generation));
        assert_eq!(conn.send::<u32>("list frames", None), Err(ClientError::NotConnected));

        // A fresh connect opens a new socket with a new generation.
        assert_eq!(conn.connect("", 0), Ok(ConnectOutcome::Opened));
        assert_eq!(mock.borrow().opened[1].2, generation + 1);
    }

    #[test]
    fn close_is_manual_and_final() {
        let (mut conn, mock) = manager();
        conn.connect("", 0).unwrap();
        mock.borrow_mut().ready = Some(ReadyState::Open);
        conn.close().unwrap();
        assert_eq!(mock.borrow().closed_with, Some(1000));
        assert_eq!(conn.connection_state(), &ConnectionState::Disconnected);
        assert!(!conn.is_open());
        assert_eq!(mock.borrow().opened.len(), 1);
    }
}
