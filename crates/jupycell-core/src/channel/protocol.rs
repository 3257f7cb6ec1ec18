//! Wire protocol between jupycell and kernel processes.
//!
//! Uses newline-delimited JSON over stdin/stdout: one request per line to
//! the kernel, one [`Message`](crate::message::Message) per line back.

use std::io::{BufRead, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest line accepted from a kernel (100MB).
const MAX_LINE_LEN: usize = 100 * 1024 * 1024;

/// Request sent to a kernel process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum KernelRequest {
    /// Execute code; replies carry `msg_id` as their parent id.
    ExecuteRequest {
        /// Correlation id for this submission.
        msg_id: String,
        /// Source to execute.
        code: String,
    },

    /// Exit the kernel process.
    ShutdownRequest,
}

/// Write a message as a single JSON line and flush.
pub fn write_message<W: Write>(writer: &mut W, message: &impl Serialize) -> Result<()> {
    let mut line = serde_json::to_vec(message)
        .map_err(|e| Error::Serialization(format!("Failed to encode kernel message: {}", e)))?;
    line.push(b'\n');

    writer
        .write_all(&line)
        .map_err(|e| Error::Channel(format!("Failed to write kernel message: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::Channel(format!("Failed to flush kernel stream: {}", e)))?;

    Ok(())
}

/// Read the next JSON line from a reader.
///
/// Returns `Ok(None)` at end of stream. Blank lines are skipped. A line
/// longer than the limit is discarded without being buffered and reported
/// as a serialization error, leaving the reader at the next line.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> Result<Option<T>> {
    read_message_limited(reader, MAX_LINE_LEN)
}

fn read_message_limited<R: BufRead, T: DeserializeOwned>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<T>> {
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(max_len as u64 + 1)
            .read_until(b'\n', &mut line)
            .map_err(|e| Error::Channel(format!("Failed to read kernel message: {}", e)))?;
        if read == 0 {
            return Ok(None);
        }
        if read > max_len && !line.ends_with(b"\n") {
            let skipped = skip_line(reader)?;
            return Err(Error::Serialization(format!(
                "Kernel message too large: {} bytes (max {})",
                read + skipped,
                max_len
            )));
        }
        if !line.trim_ascii().is_empty() {
            break;
        }
    }

    serde_json::from_slice(line.trim_ascii_end())
        .map(Some)
        .map_err(|e| Error::Serialization(format!("Failed to decode kernel message: {}", e)))
}

/// Consume input up to and including the next newline.
fn skip_line<R: BufRead>(reader: &mut R) -> Result<usize> {
    let mut skipped = 0;
    loop {
        let (used, done) = {
            let available = reader
                .fill_buf()
                .map_err(|e| Error::Channel(format!("Failed to read kernel message: {}", e)))?;
            match available.iter().position(|b| *b == b'\n') {
                Some(end) => (end + 1, true),
                None => (available.len(), available.is_empty()),
            }
        };
        reader.consume(used);
        skipped += used;
        if done {
            return Ok(skipped);
        }
    }
}
