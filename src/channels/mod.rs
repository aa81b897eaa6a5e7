//! Inbound surfaces: the HTTP messaging endpoint and a local CLI.

pub mod cli;
pub mod connector;
pub mod http;

pub use cli::CliChannel;
pub use connector::ConnectorClient;
pub use http::{AppState, bot_routes};
