//! Error types for koog-reviewer.
//!
//! Errors that reach the protocol channel are converted to JSON-RPC error
//! objects by the dispatcher. Only the stable code and a short message are
//! sent to the client; the full chain is logged to stderr.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors produced by the built-in tools.
///
/// The display strings are what the `review` command prints after `Error: `.
#[derive(Error, Debug)]
pub enum ToolError {
    /// The requested file does not exist.
    #[error("File not found at '{path}'")]
    FileNotFound {
        /// Path as given by the caller.
        path: String,
    },

    /// The path exists but is a directory or special file.
    #[error("Path is not a regular file: '{path}'")]
    NotARegularFile {
        /// Path as given by the caller.
        path: String,
    },

    /// The file exists but could not be read as UTF-8 text.
    #[error("Unable to read file '{path}': {source}")]
    ReadFailed {
        /// Path as given by the caller.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Tool arguments did not match the advertised input schema.
    #[error("Invalid arguments for {tool}: {message}")]
    InvalidArguments {
        /// Tool name.
        tool: String,
        /// Description of the mismatch.
        message: String,
    },

    /// No tool with this name is registered.
    #[error("Unknown tool: {name}")]
    UnknownTool {
        /// Requested tool name.
        name: String,
    },

    /// A built-in scanner rule failed to compile.
    #[error("invalid scanner pattern")]
    InvalidPattern(#[from] regex::Error),
}

/// Reasons an input line could not be decoded into a message.
///
/// Decode errors are logged and the line is skipped; no frame is emitted.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The line is not valid JSON.
    #[error("malformed JSON")]
    Syntax(#[source] serde_json::Error),

    /// The line is JSON but not an object.
    #[error("message is not a JSON object")]
    NotAnObject,

    /// The `jsonrpc` marker is present but not `"2.0"`.
    #[error("unsupported jsonrpc version: {0}")]
    UnsupportedVersion(String),

    /// The object is missing required envelope fields or has wrong types.
    #[error("invalid message envelope")]
    InvalidEnvelope(#[source] serde_json::Error),

    /// The `method` field is present but empty.
    #[error("method field cannot be empty")]
    EmptyMethod,
}

/// Errors from the session store.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A thread panicked while holding the store lock.
    #[error("session store lock poisoned")]
    Poisoned,

    /// The identifier does not name a live session.
    #[error("Session not found: {id}")]
    NotFound {
        /// The unknown session identifier.
        id: String,
    },
}

/// Fatal errors of the serve loop.
///
/// Anything else is reported to the client or logged and skipped.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Reading from the input stream failed.
    #[error("failed to read from input stream")]
    Read(#[source] std::io::Error),

    /// Writing a frame to the output stream failed.
    #[error("failed to write to output stream")]
    Write(#[source] std::io::Error),

    /// A frame could not be serialised.
    #[error("failed to encode frame")]
    Encode(#[from] serde_json::Error),
}
