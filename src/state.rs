use serde::Serialize;

use crate::frame::{
    ActiveFrameState, CatalogPolicy, FrameCatalog, FrameHeader, FrameSummary, HeaderInput, SpnEntry,
};
use crate::network::ws_client::ConnectionState;

/// Everything inbound messages are allowed to touch.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub catalog: FrameCatalog,
    pub frame: ActiveFrameState,
}

impl SessionState {
    pub fn new(policy: CatalogPolicy, default_interface: &str) -> Self {
        Self {
            catalog: FrameCatalog::new(policy),
            frame: ActiveFrameState::new(default_interface),
        }
    }

    /// Back to an empty catalog and no frame, as on a fresh connection.
    pub fn reset(&mut self) {
        self.catalog.clear();
        let interface = self.frame.default_interface().to_string();
        self.frame = ActiveFrameState::new(&interface);
    }
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: String,
    pub connection: String,
    pub url: Option<String>,
    pub baud: u32,
    pub frames: Vec<FrameSummary>,
    pub header: Option<FrameHeader>,
    pub header_input: HeaderInput,
    pub effective_header: Option<FrameHeader>,
    pub spn_descriptors: Vec<serde_json::Value>,
    pub spns: Vec<SpnEntry>,
}

impl SessionSnapshot {
    pub fn capture(
        session_id: String,
        connection: &ConnectionState,
        url: Option<String>,
        baud: u32,
        state: &SessionState,
    ) -> Self {
        Self {
            session_id,
            connection: connection.to_string(),
            url,
            baud,
            frames: state.catalog.frames().to_vec(),
            header: state.frame.header().cloned(),
            header_input: state.frame.input().clone(),
            effective_header: state.frame.effective_header(),
            spn_descriptors: state.frame.spn_descriptors().to_vec(),
            spns: state.frame.entries().entries().to_vec(),
        }
    }
}
