// Gateway connection defaults - the single source of truth for defaults
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;
pub const WS_SUBPROTOCOL: &str = "j1939-protocol";
pub const DEFAULT_BAUD_KBPS: u32 = 250;

// Used when the server leaves `interface` out of a frame
pub const DEFAULT_INTERFACE: &str = "can0";

// Write requests still waiting after this long are failed locally
pub const DEFAULT_SPN_REPLY_TIMEOUT_MS: u64 = 10_000;
pub const SPN_TIMEOUT_REASON: &str = "timeout";
pub const SPN_SUCCESS_REASON: &str = "Success";

// Wire command names
pub const CMD_LIST_FRAMES: &str = "list frames";
pub const CMD_REQ_FRAME: &str = "req frame";
pub const CMD_SET_BAUD_RATE: &str = "set baud rate";
pub const CMD_CREATE_FRAME: &str = "create frame";

pub const WS_CLOSE_NORMAL: u16 = 1000;
