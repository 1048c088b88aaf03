//! Agent server: request dispatch and the serve loop.
//!
//! The loop reads one line at a time, in arrival order. Every request is
//! handed to its own task so a slow handler never blocks reading; tasks
//! share nothing but the [`SessionStore`] and the [`FrameWriter`].
//!
//! There is no lifecycle gating: any method may be called at any time, and
//! `initialize` only reports metadata.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::acp::methods::{
    ContentBlock, InitializeParams, InitializeResult, MessageUpdate, MethodCall, PromptResult,
    ServerCapabilities, ServerInfo, SessionNewResult, SessionPromptParams, SessionUpdateParams,
    StopReason, SESSION_UPDATE,
};
use crate::acp::protocol::{
    parse_message, ErrorCode, IncomingMessage, JsonRpcError, JsonRpcErrorData, JsonRpcRequest,
    JsonRpcResponse, OutgoingFrame, OutgoingNotification,
};
use crate::acp::session::{PromptMessage, SessionStore};
use crate::acp::transport::{self, FrameReader, FrameWriter};
use crate::error::{ServerError, SessionError};
use crate::tools::ToolRegistry;

/// Protocol version reported by `initialize`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Reply sent for every prompt.
pub const CAPABILITIES_REPLY: &str = "\
I'm a code review agent with the following capabilities:

Available Tools:
* readFile - Read source code files from your project
* scanCode - Analyze code for common issues (TODOs, print statements, hardcoded secrets)

How to use me:
Ask me to review a file by providing its path, for example:
\"Review src/main.rs\"

I'll read the file and check for:
- TODO comments that need attention
- Print statements that should use logging
- Potential hardcoded secrets

What would you like me to review?";

/// The agent. Cheap to clone; clones share the same sessions and tools.
#[derive(Clone)]
pub struct AcpServer {
    tools: Arc<ToolRegistry>,
    sessions: Arc<SessionStore>,
    server_info: ServerInfo,
}

impl AcpServer {
    /// Creates a server advertising `tools` under the given identity.
    #[must_use]
    pub fn new(tools: ToolRegistry, server_info: ServerInfo) -> Self {
        Self {
            tools: Arc::new(tools),
            sessions: Arc::new(SessionStore::new()),
            server_info,
        }
    }

    /// The session store.
    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Runs on stdin/stdout until EOF or a termination signal.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let (reader, writer) = transport::stdio();
        self.serve_until(reader, writer, shutdown_signal()).await
    }

    /// Serves one connection until the input stream closes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or a frame cannot be written.
    pub async fn serve<R, W>(
        &self,
        reader: FrameReader<R>,
        writer: FrameWriter<W>,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        self.serve_until(reader, writer, std::future::pending()).await
    }

    /// Serves one connection until the input closes or `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish writing before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or a frame cannot be written.
    pub async fn serve_until<R, W, S>(
        &self,
        mut reader: FrameReader<R>,
        writer: FrameWriter<W>,
        shutdown: S,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        S: Future<Output = ()>,
    {
        let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<ServerError>();
        let mut tasks = JoinSet::new();
        tokio::pin!(shutdown);

        info!("Agent ready, waiting for client messages");

        let outcome = loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break Ok(());
                }

                Some(err) = fatal_rx.recv() => {
                    break Err(err);
                }

                line = reader.read_line() => {
                    match line {
                        Ok(Some(line)) => self.handle_line(&line, &writer, &mut tasks, &fatal_tx),
                        Ok(None) => {
                            info!("Input closed, shutting down");
                            break Ok(());
                        }
                        Err(e) => break Err(ServerError::Read(e)),
                    }
                }
            }
        };

        let in_flight = tasks.len();
        if in_flight > 0 {
            debug!(in_flight, "Waiting for in-flight requests");
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Request task failed");
            }
        }

        match (outcome, fatal_rx.try_recv()) {
            (Ok(()), Ok(err)) => Err(err),
            (outcome, _) => outcome,
        }
    }

    /// Decodes one line and schedules whatever it asks for.
    fn handle_line<W>(
        &self,
        line: &str,
        writer: &FrameWriter<W>,
        tasks: &mut JoinSet<()>,
        fatal: &mpsc::UnboundedSender<ServerError>,
    ) where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if line.trim().is_empty() {
            return;
        }

        while let Some(joined) = tasks.try_join_next() {
            if let Err(e) = joined {
                error!(error = %e, "Request task failed");
            }
        }

        match parse_message(line) {
            Ok(IncomingMessage::Request(request)) => {
                debug!(method = %request.method, id = %request.id, "Received request");
                let server = self.clone();
                let writer = writer.clone();
                let fatal = fatal.clone();
                tasks.spawn(async move {
                    let frames = server.dispatch_guarded(&request);
                    if let Err(e) = writer.send_all(&frames).await {
                        error!(error = %e, id = %request.id, "Failed to write response");
                        if fatal.send(e).is_err() {
                            debug!("Serve loop already stopped, dropping write error");
                        }
                    }
                });
            }
            Ok(IncomingMessage::Notification(notification)) => {
                debug!(method = %notification.method, "Ignoring client notification");
            }
            Err(e) => {
                warn!(
                    error = %e,
                    code = e.code().code(),
                    "Failed to decode frame, skipping"
                );
            }
        }
    }

    /// Like [`Self::dispatch`], but a panicking handler still yields exactly
    /// one error response for the request.
    fn dispatch_guarded(&self, request: &JsonRpcRequest) -> Vec<OutgoingFrame> {
        catch_unwind(AssertUnwindSafe(|| self.dispatch(request))).unwrap_or_else(|_| {
            error!(method = %request.method, id = %request.id, "Handler panicked");
            vec![JsonRpcError::new(request.id.clone(), JsonRpcErrorData::internal()).into()]
        })
    }

    /// Handles one request and returns the frames to write, in order.
    ///
    /// The last frame is always the response carrying the request's id;
    /// any notifications come before it.
    #[must_use]
    pub fn dispatch(&self, request: &JsonRpcRequest) -> Vec<OutgoingFrame> {
        let id = request.id.clone();

        let call = match MethodCall::from_request(request) {
            Ok(call) => call,
            Err(error) => {
                warn!(method = %request.method, id = %id, message = %error.message, "Invalid params");
                return vec![JsonRpcError::new(id, error).into()];
            }
        };

        let outcome = match call {
            MethodCall::Initialize(params) => self.handle_initialize(&params).map(|r| (None, r)),
            MethodCall::SessionNew => self.handle_session_new().map(|r| (None, r)),
            MethodCall::SessionPrompt(params) => self
                .handle_session_prompt(&params)
                .map(|(update, r)| (Some(update), r)),
            MethodCall::Unknown(method) => {
                debug!(method = %method, id = %id, "Method not found");
                Err(JsonRpcErrorData::method_not_found(&method))
            }
        };

        match outcome {
            Ok((update, result)) => {
                let mut frames = Vec::with_capacity(2);
                frames.extend(update.map(OutgoingFrame::from));
                frames.push(JsonRpcResponse::success(id, result).into());
                frames
            }
            Err(error) => vec![JsonRpcError::new(id, error).into()],
        }
    }

    /// Handles `initialize`. Never fails on client input.
    fn handle_initialize(&self, params: &InitializeParams) -> Result<Value, JsonRpcErrorData> {
        info!(
            client = %params.client_info.name,
            client_version = %params.client_info.version,
            "Client initialised"
        );

        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            capabilities: ServerCapabilities {
                tools: self.tools.definitions().cloned().collect(),
            },
            server_info: self.server_info.clone(),
        };

        to_result(&result, ErrorCode::InvalidParams)
    }

    /// Handles `session/new`.
    fn handle_session_new(&self) -> Result<Value, JsonRpcErrorData> {
        let session = self.sessions.create().map_err(internal)?;

        info!(
            session_id = %session.id(),
            created_at = %session.created_at().to_rfc3339(),
            "Session created"
        );

        to_result(
            &SessionNewResult {
                session_id: session.id().to_string(),
            },
            ErrorCode::InternalError,
        )
    }

    /// Handles `session/prompt`, returning the update notification and the
    /// result. Nothing is written if the session does not exist.
    fn handle_session_prompt(
        &self,
        params: &SessionPromptParams,
    ) -> Result<(OutgoingNotification, Value), JsonRpcErrorData> {
        let user_text = params.user_text();
        debug!(
            session_id = %params.session_id,
            parts = params.prompt.len(),
            chars = user_text.len(),
            "Prompt received"
        );

        self.sessions
            .append(&params.session_id, PromptMessage::user(user_text))
            .map_err(|e| match e {
                SessionError::NotFound { .. } => {
                    JsonRpcErrorData::with_message(ErrorCode::InternalError, e.to_string())
                }
                SessionError::Poisoned => internal(e),
            })?;
        self.sessions
            .append(&params.session_id, PromptMessage::assistant(CAPABILITIES_REPLY))
            .map_err(internal)?;

        let content = vec![ContentBlock::text(CAPABILITIES_REPLY)];

        let update = SessionUpdateParams {
            session_id: params.session_id.clone(),
            update: MessageUpdate::assistant(content.clone()),
        };
        let notification = OutgoingNotification::new(
            SESSION_UPDATE,
            serde_json::to_value(&update).map_err(internal)?,
        );

        let result = to_result(
            &PromptResult {
                stop_reason: StopReason::EndTurn,
                content,
            },
            ErrorCode::InternalError,
        )?;

        Ok((notification, result))
    }
}

/// Serialises a handler result, reporting failure under `code`.
fn to_result<T: Serialize>(result: &T, code: ErrorCode) -> Result<Value, JsonRpcErrorData> {
    serde_json::to_value(result).map_err(|e| {
        error!(error = %e, "Failed to serialise result");
        JsonRpcErrorData::from_code(code)
    })
}

/// Logs an unexpected failure and hides its detail from the client.
fn internal<E: std::error::Error>(e: E) -> JsonRpcErrorData {
    error!(error = %e, "Internal error while handling request");
    JsonRpcErrorData::internal()
}

/// Resolves on SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut sigint, mut sigterm) = match (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) {
        (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "Could not install signal handlers");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// Resolves on Ctrl+C.
#[cfg(windows)]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, initiating graceful shutdown");
    } else {
        std::future::pending::<()>().await;
    }
}
