//! JavaScript façade over [`Session`].
//!
//! Every method is one user intent.  Failures are shown as a toast and
//! rethrown, so the page may ignore them or react.  After anything that may
//! have changed state the `onChange` callback runs with no borrow held; it is
//! free to call back into the client.

mod socket;
mod toast;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_timers::callback::Interval;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::error::{ClientError, ClientResult, SpnField};
use crate::frame::HeaderField;
use crate::network::config::ClientConfig;
use crate::network::ws_client::SocketEvent;
use crate::session::Session;
use crate::utils::now_ms;

use socket::{BrowserOpener, EventSink};

const EXPIRY_TICK_MAX_MS: u64 = 1_000;

impl From<ClientError> for JsValue {
    fn from(err: ClientError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

struct ClientInner {
    session: RefCell<Session>,
    on_change: RefCell<Option<js_sys::Function>>,
}

impl ClientInner {
    fn deliver(&self, generation: u64, event: SocketEvent) {
        let result = match self.session.try_borrow_mut() {
            Ok(mut session) => session.handle_socket_event(generation, event),
            Err(_) => {
                tracing::error!(?event, "socket event arrived while the session was busy");
                return;
            }
        };
        if let Err(e) = result {
            toast::error(&e.to_string());
        }
        self.notify();
    }

    fn expire(&self) {
        let expired = match self.session.try_borrow_mut() {
            Ok(mut session) => session.expire_stale_requests(now_ms()),
            Err(_) => return,
        };
        if !expired.is_empty() {
            tracing::info!(rows = ?expired, "SPN writes timed out");
            self.notify();
        }
    }

    fn notify(&self) {
        let callback = self.on_change.borrow().clone();
        if let Some(callback) = callback {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                tracing::warn!(error = ?e, "onChange callback threw");
            }
        }
    }
}

#[wasm_bindgen]
pub struct J1939Client {
    inner: Rc<ClientInner>,
    _expiry: Option<Interval>,
}

#[wasm_bindgen]
impl J1939Client {
    /// `config` may be omitted; missing fields take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<J1939Client, JsValue> {
        let config: ClientConfig = if config.is_undefined() || config.is_null() {
            ClientConfig::from_env()
        } else {
            serde_wasm_bindgen::from_value(config)?
        };
        let timeout = config.spn_reply_timeout_ms;

        let inner = Rc::new_cyclic(|weak: &Weak<ClientInner>| {
            let weak = weak.clone();
            let sink: EventSink = Rc::new(move |generation: u64, event: SocketEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.deliver(generation, event);
                }
            });
            ClientInner {
                session: RefCell::new(Session::new(config, Rc::new(BrowserOpener::new(sink)))),
                on_change: RefCell::new(None),
            }
        });

        let expiry = timeout.map(|timeout| {
            let weak = Rc::downgrade(&inner);
            let tick = timeout.clamp(1, EXPIRY_TICK_MAX_MS) as u32;
            Interval::new(tick, move || {
                if let Some(inner) = weak.upgrade() {
                    inner.expire();
                }
            })
        });

        tracing::info!(session = %inner.session.borrow().id(), "J1939 client created");
        Ok(J1939Client {
            inner,
            _expiry: expiry,
        })
    }

    #[wasm_bindgen(js_name = sessionId)]
    pub fn session_id(&self) -> String {
        self.inner.session.borrow().id().to_string()
    }

    #[wasm_bindgen(js_name = onChange)]
    pub fn on_change(&self, callback: Option<js_sys::Function>) {
        *self.inner.on_change.borrow_mut() = callback;
    }

    /// Empty address and zero baud fall back to the configured defaults.
    pub fn connect(&self, address: &str, baud: u32) -> Result<(), JsValue> {
        self.run(|session| session.connect(address, baud).map(|_| ()))
    }

    pub fn disconnect(&self) -> Result<(), JsValue> {
        self.run(|session| session.disconnect())
    }

    #[wasm_bindgen(js_name = listFrames)]
    pub fn list_frames(&self) -> Result<(), JsValue> {
        self.run(|session| session.list_frames())
    }

    #[wasm_bindgen(js_name = chooseFrame)]
    pub fn choose_frame(&self, name: &str) -> Result<(), JsValue> {
        self.run(|session| session.choose_frame(name))
    }

    #[wasm_bindgen(js_name = chooseFrameAt)]
    pub fn choose_frame_at(&self, position: usize) -> Result<(), JsValue> {
        self.run(|session| session.choose_frame_at(position))
    }

    #[wasm_bindgen(js_name = setHeaderInput)]
    pub fn set_header_input(&self, field: &str, text: &str) -> Result<(), JsValue> {
        let field: HeaderField = field.parse().map_err(|e: String| JsValue::from(js_sys::Error::new(&e)))?;
        self.run(|session| {
            session.set_header_input(field, text);
            Ok(())
        })
    }

    /// Returns the index of the new row.
    #[wasm_bindgen(js_name = addSpnRow)]
    pub fn add_spn_row(&self) -> Result<usize, JsValue> {
        self.run(|session| Ok(session.add_spn_row()))
    }

    #[wasm_bindgen(js_name = removeLastSpnRow)]
    pub fn remove_last_spn_row(&self) -> Result<bool, JsValue> {
        self.run(|session| Ok(session.remove_last_spn_row().is_some()))
    }

    /// `field` is `"spn"` or `"value"`.
    #[wasm_bindgen(js_name = editSpn)]
    pub fn edit_spn(&self, row: usize, field: &str, text: &str) -> Result<(), JsValue> {
        let field = match field {
            "spn" => SpnField::Spn,
            "value" => SpnField::Value,
            other => return Err(js_sys::Error::new(&format!("unknown SPN field: {}", other)).into()),
        };
        self.run(|session| session.edit_spn(row, field, text))
    }

    #[wasm_bindgen(js_name = submitSpn)]
    pub fn submit_spn(&self, row: usize) -> Result<(), JsValue> {
        self.run(|session| session.submit_spn(row))
    }

    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        let snapshot = self.inner.session.borrow().snapshot();
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        Ok(snapshot.serialize(&serializer)?)
    }
}

impl J1939Client {
    fn run<T>(&self, action: impl FnOnce(&mut Session) -> ClientResult<T>) -> Result<T, JsValue> {
        let result = {
            let mut session = self
                .inner
                .session
                .try_borrow_mut()
                .map_err(|_| JsValue::from(js_sys::Error::new("client is busy")))?;
            action(&mut session)
        };
        self.inner.notify();
        result.map_err(|e| {
            toast::error(&e.to_string());
            e.into()
        })
    }
}
