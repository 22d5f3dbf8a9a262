use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::spn_tracker::{SpnTracker, SpnWrite};
use crate::constants::{CMD_REQ_FRAME, DEFAULT_INTERFACE};
use crate::error::{ClientError, ClientResult};

/// Header of the frame being edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameHeader {
    pub name: String,
    pub pgn: String,
    pub priority: u32,
    pub source: u8,
    pub dest: u8,
    pub interface: String,
    /// Transmit period in ms, 0 for aperiodic
    pub period: u32,
}

impl FrameHeader {
    fn blank(interface: &str) -> Self {
        Self {
            name: String::new(),
            pgn: String::new(),
            priority: 0,
            source: 0,
            dest: 0,
            interface: interface.to_string(),
            period: 0,
        }
    }
}

/// A `req frame` reply, with every field that was not usable left as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameUpdate {
    pub name: Option<String>,
    pub pgn: Option<String>,
    pub priority: Option<u32>,
    pub source: Option<u8>,
    pub dest: Option<u8>,
    pub interface: Option<String>,
    pub period: Option<u32>,
    pub spns: Vec<Value>,
}

impl FrameUpdate {
    pub fn from_value(data: &Value) -> ClientResult<Self> {
        let obj = data
            .as_object()
            .ok_or_else(|| ClientError::invalid_payload(CMD_REQ_FRAME, "expected an object"))?;

        Ok(Self {
            name: text_field(obj.get("name")),
            pgn: text_field(obj.get("pgn")),
            priority: numeric_field(obj.get("priority")),
            source: numeric_field(obj.get("source")),
            dest: numeric_field(obj.get("dest")),
            interface: text_field(obj.get("interface")).filter(|i| !i.is_empty()),
            period: numeric_field(obj.get("period")),
            spns: match obj.get("spns") {
                Some(Value::Array(spns)) => spns.clone(),
                _ => Vec::new(),
            },
        })
    }
}

fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A value counts as numeric when it is a JSON number or a string holding
/// one, is a whole number and fits the target type.
fn numeric_field<T: TryFrom<u64>>(value: Option<&Value>) -> Option<T> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > u64::MAX as f64 {
        return None;
    }
    T::try_from(n as u64).ok()
}

fn numeric_text<T: TryFrom<u64>>(text: &str) -> Option<T> {
    numeric_field(Some(&Value::String(text.to_string())))
}

/// Header fields the user can override before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Priority,
    Source,
    Dest,
    Period,
    Interface,
}

impl FromStr for HeaderField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(HeaderField::Priority),
            "source" => Ok(HeaderField::Source),
            "dest" => Ok(HeaderField::Dest),
            "period" => Ok(HeaderField::Period),
            "interface" => Ok(HeaderField::Interface),
            other => Err(format!("unknown header field `{}`", other)),
        }
    }
}

/// Pending user input; `None` means "use the header value".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HeaderInput {
    pub priority: Option<u32>,
    pub source: Option<u8>,
    pub dest: Option<u8>,
    pub period: Option<u32>,
    pub interface: Option<String>,
}

/// Body of a `create frame` request: the effective header plus one SPN write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateFrameRequest {
    #[serde(flatten)]
    pub header: FrameHeader,
    pub spn: Value,
    pub value: Value,
    pub index: usize,
}

/// The frame currently loaded for editing and its SPN rows.
#[derive(Debug, Clone)]
pub struct ActiveFrameState {
    header: Option<FrameHeader>,
    input: HeaderInput,
    spn_descriptors: Vec<Value>,
    entries: SpnTracker,
    default_interface: String,
}

impl Default for ActiveFrameState {
    fn default() -> Self {
        Self::new(DEFAULT_INTERFACE)
    }
}

impl ActiveFrameState {
    pub fn new(default_interface: &str) -> Self {
        Self {
            header: None,
            input: HeaderInput::default(),
            spn_descriptors: Vec::new(),
            entries: SpnTracker::new(),
            default_interface: default_interface.to_string(),
        }
    }

    /// Load a new frame.  Name and PGN are replaced as received; priority,
    /// source, dest and period keep their last value unless the update
    /// carries a usable number.  Pending input and SPN rows belong to the old
    /// frame and are dropped.
    pub fn apply_frame_update(&mut self, update: FrameUpdate) {
        let previous = self
            .header
            .take()
            .unwrap_or_else(|| FrameHeader::blank(&self.default_interface));

        let header = FrameHeader {
            name: update.name.unwrap_or_default(),
            pgn: update.pgn.unwrap_or_default(),
            priority: update.priority.unwrap_or(previous.priority),
            source: update.source.unwrap_or(previous.source),
            dest: update.dest.unwrap_or(previous.dest),
            interface: update
                .interface
                .unwrap_or_else(|| self.default_interface.clone()),
            period: update.period.unwrap_or(previous.period),
        };
        debug!(name = %header.name, pgn = %header.pgn, "active frame updated");

        self.header = Some(header);
        self.spn_descriptors = update.spns;
        self.input = HeaderInput::default();
        self.clear_spn_entries();
    }

    pub fn clear_spn_entries(&mut self) {
        self.entries.clear();
    }

    /// Record user input for a header field.  Text that is not a usable
    /// number clears the override for numeric fields.
    pub fn set_header_input(&mut self, field: HeaderField, text: &str) {
        match field {
            HeaderField::Priority => self.input.priority = numeric_text(text),
            HeaderField::Source => self.input.source = numeric_text(text),
            HeaderField::Dest => self.input.dest = numeric_text(text),
            HeaderField::Period => self.input.period = numeric_text(text),
            HeaderField::Interface => {
                let text = text.trim();
                self.input.interface = (!text.is_empty()).then(|| text.to_string());
            }
        }
    }

    pub fn header(&self) -> Option<&FrameHeader> {
        self.header.as_ref()
    }

    pub fn input(&self) -> &HeaderInput {
        &self.input
    }

    /// Header as it would be sent right now.
    pub fn effective_header(&self) -> Option<FrameHeader> {
        let mut header = self.header.clone()?;
        let input = &self.input;
        if let Some(priority) = input.priority {
            header.priority = priority;
        }
        if let Some(source) = input.source {
            header.source = source;
        }
        if let Some(dest) = input.dest {
            header.dest = dest;
        }
        if let Some(period) = input.period {
            header.period = period;
        }
        if let Some(interface) = &input.interface {
            header.interface = interface.clone();
        }
        Some(header)
    }

    pub fn write_request(&self, write: SpnWrite) -> ClientResult<CreateFrameRequest> {
        let header = self.effective_header().ok_or(ClientError::NoFrameSelected)?;
        Ok(CreateFrameRequest {
            header,
            spn: write.spn,
            value: write.value,
            index: write.index,
        })
    }

    pub fn default_interface(&self) -> &str {
        &self.default_interface
    }

    pub fn spn_descriptors(&self) -> &[Value] {
        &self.spn_descriptors
    }

    pub fn entries(&self) -> &SpnTracker {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut SpnTracker {
        &mut self.entries
    }
}
