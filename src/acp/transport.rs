//! stdio transport for the agent.
//!
//! - Messages are UTF-8 encoded JSON-RPC
//! - Messages are delimited by newlines
//! - Messages must not contain embedded newlines
//! - stdin: receives messages from client
//! - stdout: sends messages to client
//! - stderr: may be used for logging (never protocol frames)
//!
//! # Thread Safety
//!
//! Reading happens on the serve loop only. Writing goes through
//! [`FrameWriter`], a cloneable handle around one mutex-guarded stream, so
//! request tasks can write concurrently without interleaving bytes.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

use crate::acp::protocol::{encode_frame, OutgoingFrame};
use crate::error::ServerError;

/// Reads newline-delimited frames from an input stream.
pub struct FrameReader<R> {
    reader: BufReader<R>,
}

impl<R> FrameReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wraps an input stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    /// Reads the next message line.
    ///
    /// Returns `None` when the stream is closed (EOF). The line terminator
    /// (`\n` or `\r\n`) is stripped; other whitespace is preserved. Invalid
    /// UTF-8 is replaced with U+FFFD rather than failing the stream, so a bad
    /// line surfaces as a decode error for that line only.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying stream fails.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        let bytes_read = self.reader.read_until(b'\n', &mut raw).await?;

        if bytes_read == 0 {
            return Ok(None);
        }

        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }

        let line = match String::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(len = bytes_read, "frame is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }
        };

        tracing::trace!(len = line.len(), "read frame");
        Ok(Some(line))
    }
}

/// Shared, lock-guarded handle to the output stream.
pub struct FrameWriter<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for FrameWriter<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

impl<W> FrameWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps an output stream.
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Writes one frame, terminator and flush included, under the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub async fn send(&self, frame: &OutgoingFrame) -> Result<(), ServerError> {
        self.send_all(std::slice::from_ref(frame)).await
    }

    /// Writes several frames in order while holding the lock once, so no
    /// other writer can slip a frame between them. Each frame is flushed
    /// before the next is written.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails. Frames are encoded
    /// before anything is written, so an encoding failure writes nothing.
    pub async fn send_all(&self, frames: &[OutgoingFrame]) -> Result<(), ServerError> {
        let lines = frames
            .iter()
            .map(encode_frame)
            .collect::<Result<Vec<_>, _>>()?;

        let mut writer = self.writer.lock().await;
        for line in &lines {
            write_raw(&mut *writer, line)
                .await
                .map_err(ServerError::Write)?;
        }

        Ok(())
    }
}

/// Writes a raw JSON string with newline termination and flushes.
async fn write_raw<W>(writer: &mut W, json: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug_assert!(
        !json.contains('\n'),
        "JSON message must not contain embedded newlines"
    );

    tracing::trace!(len = json.len(), "writing frame");
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

/// The process's stdin/stdout pair.
#[must_use]
pub fn stdio() -> (FrameReader<tokio::io::Stdin>, FrameWriter<tokio::io::Stdout>) {
    (
        FrameReader::new(tokio::io::stdin()),
        FrameWriter::new(tokio::io::stdout()),
    )
}
