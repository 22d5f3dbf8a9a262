// Re-export network modules
pub mod codec;
pub mod command_bus;
pub mod config;
pub mod handlers;
pub mod ws_client;

// Re-export commonly used items
pub use codec::{decode, encode, Envelope, ParsedMessage};
pub use command_bus::{CommandBus, CommandHandler, DispatchOutcome};
pub use config::ClientConfig;
pub use ws_client::{
    ConnectOutcome, ConnectionManager, ConnectionState, IWsClient, ReadyState, SocketEvent, SocketOpener,
};
