//! Method names and their typed parameters and results.
//!
//! Raw `params` are validated into one [`MethodCall`] variant per method
//! before any handler runs. Shape errors share a single conversion path.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::acp::protocol::{ErrorCode, JsonRpcErrorData, JsonRpcRequest};
use crate::tools::ToolDefinition;

/// `initialize` method name.
pub const INITIALIZE: &str = "initialize";
/// `session/new` method name.
pub const SESSION_NEW: &str = "session/new";
/// `session/prompt` method name.
pub const SESSION_PROMPT: &str = "session/prompt";
/// `session/update` notification name.
pub const SESSION_UPDATE: &str = "session/update";

/// Placeholder for missing client identity fields.
const UNKNOWN: &str = "unknown";

/// Client information received during initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientInfo {
    /// Client name.
    pub name: String,
    /// Client version.
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: UNKNOWN.to_string(),
            version: UNKNOWN.to_string(),
        }
    }
}

/// Tool-related client capabilities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToolCapabilities {
    /// Tool names the client can handle.
    #[serde(default)]
    pub supported: Vec<String>,
}

/// Client capabilities. Advisory only; nothing is gated on them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientCapabilities {
    /// Tool capabilities, if declared.
    #[serde(default)]
    pub tools: Option<ToolCapabilities>,
}

/// Parameters for the initialize request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    /// Client capabilities.
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    /// Client information.
    #[serde(default)]
    pub client_info: ClientInfo,
}

impl InitializeParams {
    /// Decodes initialize params leniently: absent or malformed params
    /// yield the placeholder identity instead of an error.
    #[must_use]
    pub fn lenient(params: Option<&Value>) -> Self {
        params
            .and_then(|p| match Self::deserialize(p) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::debug!(error = %e, "Malformed initialize params, using defaults");
                    None
                }
            })
            .unwrap_or_default()
    }
}

/// One part of a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// Part type: "text", "image", and so on.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text payload for text parts.
    #[serde(default)]
    pub text: Option<String>,
    /// Encoded payload for binary parts.
    #[serde(default)]
    pub data: Option<String>,
    /// MIME type of `data`.
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Parameters for `session/prompt`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPromptParams {
    /// Target session.
    pub session_id: String,
    /// Prompt parts, in order.
    #[serde(default)]
    pub prompt: Vec<MessagePart>,
}

impl SessionPromptParams {
    /// Text of all `text` parts joined with single spaces. Other parts are
    /// ignored.
    #[must_use]
    pub fn user_text(&self) -> String {
        self.prompt
            .iter()
            .filter(|part| part.kind == "text")
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A validated request, one variant per method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodCall {
    /// `initialize`; never fails to decode.
    Initialize(InitializeParams),
    /// `session/new`; client params are ignored.
    SessionNew,
    /// `session/prompt`.
    SessionPrompt(SessionPromptParams),
    /// Anything else.
    Unknown(String),
}

impl MethodCall {
    /// Validates the request's params for its method.
    ///
    /// # Errors
    ///
    /// Returns a `-32603` error object when `session/prompt` params are
    /// missing or do not have the expected shape.
    pub fn from_request(req: &JsonRpcRequest) -> Result<Self, JsonRpcErrorData> {
        match req.method.as_str() {
            INITIALIZE => Ok(Self::Initialize(InitializeParams::lenient(
                req.params.as_ref(),
            ))),
            SESSION_NEW => Ok(Self::SessionNew),
            SESSION_PROMPT => {
                let params = req.params.as_ref().ok_or_else(|| {
                    JsonRpcErrorData::with_message(ErrorCode::InternalError, "Missing params")
                })?;
                SessionPromptParams::deserialize(params)
                    .map(Self::SessionPrompt)
                    .map_err(|e| {
                        JsonRpcErrorData::with_message(
                            ErrorCode::InternalError,
                            format!("Invalid params: {e}"),
                        )
                    })
            }
            other => Ok(Self::Unknown(other.to_string())),
        }
    }
}

/// Server capabilities advertised during initialisation.
#[derive(Debug, Clone, Serialize)]
pub struct ServerCapabilities {
    /// Every registered tool.
    pub tools: Vec<ToolDefinition>,
}

/// Server information for initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: "koog-reviewer".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Result of `initialize`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    /// Fixed protocol version.
    pub protocol_version: u32,
    /// Advertised capabilities.
    pub capabilities: ServerCapabilities,
    /// Server identity.
    pub server_info: ServerInfo,
}

/// Result of `session/new`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNewResult {
    /// Freshly minted session identifier.
    pub session_id: String,
}

/// A content block in updates and prompt results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    /// Text content.
    Text {
        /// The text content.
        text: String,
    },
}

impl ContentBlock {
    /// Creates a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Kind of a session update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionUpdateKind {
    /// A complete message.
    Message,
}

/// A message pushed to the client through `session/update`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageUpdate {
    /// Always `message`.
    pub session_update: SessionUpdateKind,
    /// Author of the message.
    pub role: crate::acp::session::Role,
    /// Message body.
    pub content: Vec<ContentBlock>,
}

impl MessageUpdate {
    /// An assistant message.
    #[must_use]
    pub const fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            session_update: SessionUpdateKind::Message,
            role: crate::acp::session::Role::Assistant,
            content,
        }
    }
}

/// Params of the `session/update` notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpdateParams {
    /// Session the update belongs to.
    pub session_id: String,
    /// The update itself.
    pub update: MessageUpdate,
}

/// Why the agent stopped producing output for a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The turn finished normally.
    EndTurn,
}

/// Result of `session/prompt`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResult {
    /// Why the turn ended.
    pub stop_reason: StopReason,
    /// Same content as the preceding update.
    pub content: Vec<ContentBlock>,
}
