//! Room connection: wire messages, transport, and lifecycle state machine

pub mod connection;
pub mod messages;
pub mod transport;

pub use connection::{join_url, ConnectionManager, ConnectionState};
pub use messages::InboundMessage;
pub use transport::{Transport, TransportEvent, WsTransport};
