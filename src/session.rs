use std::rc::Rc;

use tracing::{debug, info_span, warn};
use uuid::Uuid;

use crate::constants::{CMD_CREATE_FRAME, CMD_LIST_FRAMES, CMD_REQ_FRAME};
use crate::error::{ClientError, ClientResult, SpnField};
use crate::frame::{HeaderField, SpnEntry};
use crate::messages::Message;
use crate::network::codec;
use crate::network::command_bus::{CommandBus, DispatchOutcome};
use crate::network::config::ClientConfig;
use crate::network::handlers::register_default_handlers;
use crate::network::ws_client::{ConnectOutcome, ConnectionManager, SocketEvent, SocketOpener};
use crate::state::{SessionSnapshot, SessionState};
use crate::utils::now_ms;

/// One client session: a connection, the command bus and the state inbound
/// messages act on.
///
/// All input arrives through two doors: [`Session::dispatch`] for user
/// intents and [`Session::handle_socket_event`] for the socket.  Errors
/// returned from either are meant for the user; protocol noise (bad frames,
/// unknown commands, stale replies) is logged and swallowed.
pub struct Session {
    id: Uuid,
    config: ClientConfig,
    connection: ConnectionManager,
    bus: CommandBus<SessionState>,
    state: SessionState,
}

impl Session {
    pub fn new(config: ClientConfig, opener: Rc<dyn SocketOpener>) -> Self {
        let mut bus = CommandBus::new();
        register_default_handlers(&mut bus);
        let state = SessionState::new(config.catalog_policy, &config.default_interface);
        Self {
            id: Uuid::new_v4(),
            connection: ConnectionManager::new(config.clone(), opener),
            config,
            bus,
            state,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// For handlers beyond the built-in ones.
    pub fn bus_mut(&mut self) -> &mut CommandBus<SessionState> {
        &mut self.bus
    }

    pub fn dispatch(&mut self, msg: Message) -> ClientResult<()> {
        let _span = info_span!("session", id = %self.id).entered();
        debug!(?msg, "dispatch");
        match msg {
            Message::Connect { address, baud } => self.connect(&address, baud).map(|_| ()),
            Message::Disconnect => self.disconnect(),
            Message::ListFrames => self.list_frames(),
            Message::ChooseFrame(name) => self.choose_frame(&name),
            Message::ChooseFrameAt(position) => self.choose_frame_at(position),
            Message::SetHeaderInput { field, text } => {
                self.set_header_input(field, &text);
                Ok(())
            }
            Message::AddSpnRow => {
                self.add_spn_row();
                Ok(())
            }
            Message::RemoveLastSpnRow => {
                self.remove_last_spn_row();
                Ok(())
            }
            Message::EditSpn { row, field, text } => self.edit_spn(row, field, text),
            Message::SubmitSpn(row) => self.submit_spn(row),
        }
    }

    /// Connect, or keep the current socket.  A new socket means a new
    /// session: the catalog and the active frame start out empty.
    pub fn connect(&mut self, address: &str, baud: u32) -> ClientResult<ConnectOutcome> {
        let outcome = self.connection.connect(address, baud)?;
        if outcome == ConnectOutcome::Opened {
            self.state.reset();
        }
        Ok(outcome)
    }

    pub fn disconnect(&mut self) -> ClientResult<()> {
        self.connection.close()
    }

    pub fn list_frames(&self) -> ClientResult<()> {
        self.connection.send::<()>(CMD_LIST_FRAMES, None)
    }

    pub fn choose_frame(&self, name: &str) -> ClientResult<()> {
        if self.state.catalog.find(name).is_none() {
            debug!(name, "requesting a frame that is not in the catalog");
        }
        self.connection.send(CMD_REQ_FRAME, Some(name))
    }

    pub fn choose_frame_at(&self, position: usize) -> ClientResult<()> {
        let frame = self
            .state
            .catalog
            .get(position)
            .ok_or(ClientError::NoSuchFrame(position))?;
        self.connection.send(CMD_REQ_FRAME, Some(frame.name.as_str()))
    }

    pub fn set_header_input(&mut self, field: HeaderField, text: &str) {
        self.state.frame.set_header_input(field, text);
    }

    pub fn add_spn_row(&mut self) -> usize {
        self.state.frame.entries_mut().add_entry()
    }

    pub fn remove_last_spn_row(&mut self) -> Option<SpnEntry> {
        self.state.frame.entries_mut().remove_last()
    }

    pub fn edit_spn(&mut self, row: usize, field: SpnField, text: impl Into<String>) -> ClientResult<()> {
        self.state.frame.entries_mut().edit(row, field, text)
    }

    /// Send a `create frame` for `row`.  The row only turns `Sending` once
    /// the request actually went out.
    pub fn submit_spn(&mut self, row: usize) -> ClientResult<()> {
        let write = self.state.frame.entries().prepare(row)?;
        let request = self.state.frame.write_request(write)?;
        self.connection.send(CMD_CREATE_FRAME, Some(&request))?;
        self.state.frame.entries_mut().mark_sending(row, now_ms())
    }

    /// Feed one socket event.  Events from a socket that has since been
    /// replaced or dropped are ignored.
    pub fn handle_socket_event(&mut self, generation: u64, event: SocketEvent) -> ClientResult<()> {
        let _span = info_span!("session", id = %self.id, generation).entered();
        if !self.connection.is_current(generation) {
            debug!(?event, "event from a stale socket ignored");
            return Ok(());
        }

        match event {
            SocketEvent::Open => {
                self.connection.handle_open()?;
                if self.config.list_frames_on_open {
                    self.list_frames()?;
                }
                Ok(())
            }
            SocketEvent::Text(raw) => {
                self.receive(&raw);
                Ok(())
            }
            SocketEvent::Error(detail) => Err(self.connection.handle_error(&detail)),
            SocketEvent::Close { code, reason } => {
                self.connection.handle_close(code, &reason);
                Ok(())
            }
        }
    }

    /// Decode and dispatch one text frame.  `None` when the frame could not
    /// be decoded.
    pub fn receive(&mut self, raw: &str) -> Option<DispatchOutcome> {
        match codec::decode(raw) {
            Ok(message) => {
                debug!(command = %message.command, "received");
                Some(self.bus.dispatch(&mut self.state, &message))
            }
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                None
            }
        }
    }

    /// Fail SPN writes that waited longer than the configured timeout.
    pub fn expire_stale_requests(&mut self, now_ms: u64) -> Vec<usize> {
        match self.config.spn_reply_timeout_ms {
            Some(timeout) => self.state.frame.entries_mut().expire_stale(now_ms, timeout),
            None => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::capture(
            self.id.to_string(),
            self.connection.connection_state(),
            self.connection.url().map(str::to_string),
            self.connection.baud(),
            &self.state,
        )
    }
}
