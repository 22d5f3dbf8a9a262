//! Handlers for the server → client commands.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::codec::ParsedMessage;
use super::command_bus::CommandBus;
use crate::constants::{CMD_CREATE_FRAME, CMD_LIST_FRAMES, CMD_REQ_FRAME};
use crate::error::{ClientError, ClientResult};
use crate::frame::{FrameSummary, FrameUpdate, ResolveOutcome};
use crate::schema_validation::{validate_create_frame_reply, validate_frame_listing};
use crate::state::SessionState;

/// The gateway sends PGNs as strings, older builds as numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePgn {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct ListedFrame {
    name: String,
    pgn: WirePgn,
}

impl From<ListedFrame> for FrameSummary {
    fn from(frame: ListedFrame) -> Self {
        let pgn = match frame.pgn {
            WirePgn::Text(pgn) => pgn,
            WirePgn::Number(pgn) => pgn.to_string(),
        };
        FrameSummary {
            name: frame.name,
            pgn,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateFrameReply {
    reason: String,
    index: usize,
}

pub fn register_default_handlers(bus: &mut CommandBus<SessionState>) {
    bus.register(CMD_LIST_FRAMES, handle_list_frames);
    bus.register(CMD_REQ_FRAME, handle_req_frame);
    bus.register(CMD_CREATE_FRAME, handle_create_frame);
}

fn handle_list_frames(state: &mut SessionState, msg: &ParsedMessage) -> ClientResult<()> {
    // A reply without data lists nothing.
    let Some(data) = &msg.data else {
        debug!("frame listing without data");
        return Ok(());
    };
    validate_frame_listing(data).map_err(|e| ClientError::invalid_payload(CMD_LIST_FRAMES, e))?;
    let listing: Vec<ListedFrame> = parse(CMD_LIST_FRAMES, data)?;

    state
        .catalog
        .apply_listing(listing.into_iter().map(FrameSummary::from).collect());
    Ok(())
}

fn handle_req_frame(state: &mut SessionState, msg: &ParsedMessage) -> ClientResult<()> {
    let data = msg
        .data
        .as_ref()
        .ok_or_else(|| ClientError::invalid_payload(CMD_REQ_FRAME, "missing data"))?;
    let update = FrameUpdate::from_value(data)?;
    state.frame.apply_frame_update(update);
    Ok(())
}

fn handle_create_frame(state: &mut SessionState, msg: &ParsedMessage) -> ClientResult<()> {
    let data = msg
        .data
        .as_ref()
        .ok_or_else(|| ClientError::invalid_payload(CMD_CREATE_FRAME, "missing data"))?;
    validate_create_frame_reply(data).map_err(|e| ClientError::invalid_payload(CMD_CREATE_FRAME, e))?;
    let reply: CreateFrameReply = parse(CMD_CREATE_FRAME, data)?;

    // Stale or unknown indices are logged by the tracker and not an error.
    if let ResolveOutcome::Resolved(status) = state.frame.entries_mut().resolve(reply.index, &reply.reason) {
        debug!(index = reply.index, ?status, "create frame reply applied");
    }
    Ok(())
}

fn parse<T: for<'de> Deserialize<'de>>(command: &str, data: &Value) -> ClientResult<T> {
    serde_json::from_value(data.clone()).map_err(|e| ClientError::invalid_payload(command, e))
}
