//! Schema checks for inbound payloads whose shape the handlers rely on.

use jsonschema::JSONSchema;
use lazy_static::lazy_static;
use serde_json::Value;

lazy_static! {
    static ref LIST_FRAMES_SCHEMA: JSONSchema = compile(include_str!("schema/list_frames_schema.json"));
    static ref CREATE_FRAME_REPLY_SCHEMA: JSONSchema =
        compile(include_str!("schema/create_frame_reply_schema.json"));
}

fn compile(raw: &str) -> JSONSchema {
    let parsed: Value = serde_json::from_str(raw).expect("embedded schema must be valid JSON");
    JSONSchema::compile(&parsed).expect("embedded schema must compile")
}

fn check(schema: &JSONSchema, value: &Value) -> Result<(), String> {
    schema.validate(value).map_err(|errors| {
        errors
            .map(|e| format!("{} at `{}`", e, e.instance_path))
            .collect::<Vec<_>>()
            .join("; ")
    })
}

/// `[{ "name": string, "pgn": string | integer }, ...]`
pub fn validate_frame_listing(value: &Value) -> Result<(), String> {
    check(&LIST_FRAMES_SCHEMA, value)
}

/// `{ "reason": string, "index": integer >= 0 }`
pub fn validate_create_frame_reply(value: &Value) -> Result<(), String> {
    check(&CREATE_FRAME_REPLY_SCHEMA, value)
}
