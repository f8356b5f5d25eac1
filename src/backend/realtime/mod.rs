//! Real-time Transport Module
//!
//! WebSocket transport for the hub. Each connection gets its own actor that
//! owns the socket, and every client command is routed through the same
//! `Hub` facade the REST handlers use.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs        - Module exports and documentation
//! ├── handler.rs    - GET /ws upgrade
//! ├── connection.rs - Per-connection actor (reader, writer, heartbeat)
//! └── protocol.rs   - Client frames, dispatch, ack/error replies
//! ```
//!
//! # Wire Format
//!
//! Client to server:
//!
//! ```json
//! {"request_id": "r7", "type": "send_request", "user_id": "6f1c..."}
//! ```
//!
//! Server to client, a reply and a pushed event:
//!
//! ```json
//! {"event_type": "ack", "payload": {...}, "timestamp": "...", "request_id": "r7"}
//! {"event_type": "relationship_changed", "payload": {"user_id": "...", "state": "incoming"}, "timestamp": "..."}
//! ```

/// Per-connection actor
pub mod connection;

/// WebSocket upgrade handler
pub mod handler;

/// Client frame decoding and command dispatch
pub mod protocol;

pub use connection::{run_connection, Heartbeat};
pub use handler::ws_upgrade;
pub use protocol::{dispatch, parse_frame, ClientCommand, ClientFrame};
