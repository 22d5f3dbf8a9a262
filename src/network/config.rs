use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ADDRESS, DEFAULT_BAUD_KBPS, DEFAULT_INTERFACE, DEFAULT_PORT,
    DEFAULT_SPN_REPLY_TIMEOUT_MS, WS_SUBPROTOCOL,
};
use crate::frame::CatalogPolicy;

/// Configuration for one client session.
///
/// Every field has a default so a partial JS object (or none at all) is
/// enough to build one.  The gateway address and port can also be baked in
/// at build time through the `J1939_GATEWAY_ADDR` / `J1939_GATEWAY_PORT`
/// environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Address used when `connect` is called with an empty one
    pub default_address: String,
    pub port: u16,
    pub subprotocol: String,
    /// Baud rate in kbps used when `connect` is called with 0
    pub default_baud: u32,
    /// Interface name used when the server omits it from a frame
    pub default_interface: String,
    /// Whether `list frames` is requested right after `set baud rate`
    pub list_frames_on_open: bool,
    pub catalog_policy: CatalogPolicy,
    /// `None` keeps unanswered SPN writes in `Sending` forever
    pub spn_reply_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            subprotocol: WS_SUBPROTOCOL.to_string(),
            default_baud: DEFAULT_BAUD_KBPS,
            default_interface: DEFAULT_INTERFACE.to_string(),
            list_frames_on_open: true,
            catalog_policy: CatalogPolicy::Append,
            spn_reply_timeout_ms: Some(DEFAULT_SPN_REPLY_TIMEOUT_MS),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with whatever was provided at build time.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(addr) = option_env!("J1939_GATEWAY_ADDR") {
            if !addr.trim().is_empty() {
                config.default_address = addr.trim().to_string();
            }
        }
        if let Some(port) = option_env!("J1939_GATEWAY_PORT").and_then(|p| p.parse().ok()) {
            config.port = port;
        }
        config
    }

    pub fn resolve_address<'a>(&'a self, address: &'a str) -> &'a str {
        let address = address.trim();
        if address.is_empty() {
            &self.default_address
        } else {
            address
        }
    }

    pub fn resolve_baud(&self, baud: u32) -> u32 {
        if baud == 0 {
            self.default_baud
        } else {
            baud
        }
    }

    /// Get the WebSocket URL for a gateway address
    pub fn ws_url(&self, address: &str) -> String {
        format!("ws://{}:{}", self.resolve_address(address), self.port)
    }
}
