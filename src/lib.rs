//! koog-reviewer: a code review agent for the Agent Client Protocol.
//!
//! The agent runs as a subprocess of an ACP client and talks JSON-RPC over
//! stdin/stdout. It advertises two tools, `readFile` and `scanCode`, which
//! are also usable directly through the `review` command.
//!
//! # Modules
//!
//! - [`acp`]: Protocol codec, dispatcher, sessions and stdio transport
//! - [`config`]: Configuration loading and validation
//! - [`error`]: Error types
//! - [`tools`]: Built-in tools and their registry

pub mod acp;
pub mod config;
pub mod error;
pub mod tools;
