//! Browser client for a J1939 CAN gateway.
//!
//! The gateway speaks JSON envelopes over one WebSocket.  This crate keeps
//! the client side of that conversation: which frames the gateway offers,
//! the frame being edited, and the SPN writes waiting for an answer.  The
//! core is plain Rust and runs anywhere; the `web` module (wasm32 only) binds
//! it to `web_sys::WebSocket` and exports it to JavaScript.

pub mod constants;
pub mod error;
pub mod frame;
pub mod messages;
pub mod network;
pub mod schema_validation;
pub mod session;
pub mod state;
pub mod utils;

#[cfg(target_arch = "wasm32")]
mod logging;
#[cfg(target_arch = "wasm32")]
mod web;

pub use error::{ClientError, ClientResult, DecodeError, SpnField};
pub use messages::Message;
pub use network::ClientConfig;
pub use session::Session;

#[cfg(target_arch = "wasm32")]
pub use web::J1939Client;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

// Main entry point for the WASM module
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    // Initialize better panic messages
    console_error_panic_hook::set_once();
    logging::init();
    Ok(())
}
