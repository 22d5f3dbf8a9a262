// src/messages.rs
//
// User intents forwarded by the presentation layer.
//
use crate::error::SpnField;
use crate::frame::HeaderField;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    // Connection
    Connect { address: String, baud: u32 },
    Disconnect,

    // Frame selection
    ListFrames,
    ChooseFrame(String),
    ChooseFrameAt(usize),   // position in the catalog
    SetHeaderInput { field: HeaderField, text: String },

    // SPN rows
    AddSpnRow,
    RemoveLastSpnRow,
    EditSpn { row: usize, field: SpnField, text: String },
    SubmitSpn(usize),
}
