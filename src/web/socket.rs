use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

use crate::error::{ClientError, ClientResult};
use crate::network::ws_client::{IWsClient, ReadyState, SocketEvent, SocketOpener};

/// Where socket events go, tagged with the socket generation.
pub(crate) type EventSink = Rc<dyn Fn(u64, SocketEvent)>;

pub(crate) fn js_error_text(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| value.dyn_ref::<js_sys::Error>().map(|e| String::from(e.message())))
        .unwrap_or_else(|| format!("{:?}", value))
}

/// `web_sys::WebSocket` behind the connection manager's socket trait.
pub struct BrowserSocket {
    ws: WebSocket,
}

impl IWsClient for BrowserSocket {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_code(self.ws.ready_state())
    }

    fn send_text(&self, text: &str) -> ClientResult<()> {
        self.ws
            .send_with_str(text)
            .map_err(|e| ClientError::Transport(js_error_text(&e)))
    }

    fn close(&self, code: u16) -> ClientResult<()> {
        self.ws
            .close_with_code(code)
            .map_err(|e| ClientError::Transport(js_error_text(&e)))
    }
}

impl Drop for BrowserSocket {
    // Once the manager lets go of a socket nothing it says matters any more.
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onerror(None);
        self.ws.set_onclose(None);
    }
}

pub struct BrowserOpener {
    sink: EventSink,
}

impl BrowserOpener {
    pub fn new(sink: EventSink) -> Self {
        Self { sink }
    }
}

impl SocketOpener for BrowserOpener {
    fn open(&self, url: &str, protocol: &str, generation: u64) -> ClientResult<Box<dyn IWsClient>> {
        let ws = WebSocket::new_with_str(url, protocol)
            .map_err(|e| ClientError::ConnectionFailed(js_error_text(&e)))?;

        // Set up open handler
        let sink = self.sink.clone();
        let onopen_closure = Closure::wrap(Box::new(move |_: Event| {
            sink(generation, SocketEvent::Open);
        }) as Box<dyn FnMut(Event)>);
        ws.set_onopen(Some(onopen_closure.as_ref().unchecked_ref()));
        onopen_closure.forget();

        // Set up message handler: only text frames are part of the protocol
        let sink = self.sink.clone();
        let onmessage_closure = Closure::wrap(Box::new(move |event: MessageEvent| {
            match event.data().as_string() {
                Some(text) => sink(generation, SocketEvent::Text(text)),
                None => tracing::warn!("received non-text websocket message"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        ws.set_onmessage(Some(onmessage_closure.as_ref().unchecked_ref()));
        onmessage_closure.forget();

        // The browser does not say what went wrong, only that something did.
        let sink = self.sink.clone();
        let error_url = url.to_string();
        let onerror_closure = Closure::wrap(Box::new(move |_: Event| {
            sink(generation, SocketEvent::Error(format!("websocket error on {}", error_url)));
        }) as Box<dyn FnMut(Event)>);
        ws.set_onerror(Some(onerror_closure.as_ref().unchecked_ref()));
        onerror_closure.forget();

        let sink = self.sink.clone();
        let onclose_closure = Closure::wrap(Box::new(move |evt: Event| {
            let (code, reason) = match evt.dyn_into::<CloseEvent>() {
                Ok(close_evt) => (close_evt.code(), close_evt.reason()),
                Err(_) => (0, String::new()),
            };
            sink(generation, SocketEvent::Close { code, reason });
        }) as Box<dyn FnMut(Event)>);
        ws.set_onclose(Some(onclose_closure.as_ref().unchecked_ref()));
        onclose_closure.forget();

        Ok(Box::new(BrowserSocket { ws }))
    }
}
