//! Blank-line request framing and read-to-EOF responses for the node protocol.
//!
//! The node protocol has no length prefix. A request is terminated by an
//! empty line, and the node signals the end of its response by closing the
//! connection.
//!
//! # Wire Format
//!
//! ```text
//! {"message_type":"get_block","payload":"<hash>"}\n
//! \n
//! ```
//!
//! Response:
//!
//! ```text
//! {"payload": ...}<EOF>
//! ```

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Marks the end of a request. The node reads until it sees an empty line.
pub const REQUEST_TERMINATOR: &[u8] = b"\n\n";

/// Maximum response size (16MB) to prevent OOM from a misbehaving node.
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

/// Outgoing request envelope.
#[derive(Debug, Serialize)]
pub struct RequestEnvelope<'a, T: Serialize> {
    pub message_type: &'a str,
    pub payload: T,
}

/// Replace every CRLF with a bare LF.
///
/// Hashes and addresses often come from browser form fields, which submit
/// textarea contents with CRLF line endings. The node matches them verbatim.
pub fn normalize_line_endings(value: &str) -> String {
    value.replace("\r\n", "\n")
}

/// Serialize an envelope and append the request terminator.
pub fn encode_request<T: Serialize>(
    message_type: &str,
    payload: T,
) -> Result<Vec<u8>, serde_json::Error> {
    let envelope = RequestEnvelope {
        message_type,
        payload,
    };
    let mut buf = serde_json::to_vec(&envelope)?;
    buf.extend_from_slice(REQUEST_TERMINATOR);
    Ok(buf)
}

/// Write a fully encoded request and flush it.
pub async fn write_request<W>(writer: &mut W, request: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(request).await?;
    writer.flush().await
}

/// Read until the peer closes the connection.
///
/// # Errors
///
/// Returns `InvalidData` once more than `limit` bytes have arrived, and any
/// I/O error from the underlying stream.
pub async fn read_to_eof<R>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    // Take one extra byte so an oversized response is detectable.
    let read = reader
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .await?;

    if read > limit {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Response exceeds maximum {} bytes", limit),
        ));
    }

    Ok(body)
}
