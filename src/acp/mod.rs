//! Agent Client Protocol (ACP) agent over stdio.
//!
//! The agent speaks JSON-RPC 2.0, one frame per line, and exposes the
//! built-in review tools to a client (typically an editor).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          AcpServer                           │
//! │                                                              │
//! │   ┌─────────────┐    ┌─────────────┐    ┌──────────────┐     │
//! │   │ FrameReader │───▶│  dispatch   │───▶│ SessionStore │     │
//! │   │   (stdin)   │    │ (per task)  │    │ ToolRegistry │     │
//! │   └─────────────┘    └─────────────┘    └──────────────┘     │
//! │                             │                                │
//! │                             ▼                                │
//! │                      ┌─────────────┐                         │
//! │                      │ FrameWriter │  (mutex-guarded stdout) │
//! │                      └─────────────┘                         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Methods
//!
//! - `initialize`: protocol version, tool list and server identity
//! - `session/new`: mint a session
//! - `session/prompt`: one `session/update` notification, then the result

pub mod methods;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use methods::{MethodCall, ServerInfo};
pub use protocol::{
    parse_message, IncomingMessage, JsonRpcError, JsonRpcRequest, JsonRpcResponse, OutgoingFrame,
    RequestId,
};
pub use server::{AcpServer, PROTOCOL_VERSION};
pub use session::SessionStore;
pub use transport::{FrameReader, FrameWriter};
