//! Connect-per-call client for the Clarke node.
//!
//! This module provides `NodeClient`, an async client that opens a TCP
//! connection to the node for every request, writes one framed envelope,
//! reads the response until the node closes the connection, and drops the
//! stream on every exit path.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::NodeConfig;
use crate::node::framing::{
    encode_request, normalize_line_endings, read_to_eof, write_request, MAX_RESPONSE_SIZE,
};

/// Node-specific error types.
///
/// `Connection`, `Timeout` and `Io` all mean the node could not be reached
/// or stopped answering; see [`NodeError::is_connection`].
#[derive(Debug, Error)]
pub enum NodeError {
    /// Failed to open the TCP connection.
    #[error("Connection to {address} failed: {source}")]
    Connection {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting or waiting for the response took too long.
    #[error("Node did not {stage} within {}ms", .after.as_millis())]
    Timeout { stage: &'static str, after: Duration },

    /// I/O error on an established connection.
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),

    /// The request payload could not be serialized.
    #[error("Failed to encode request: {0}")]
    Encode(#[source] serde_json::Error),

    /// Response bytes were not a `{"payload": ...}` envelope.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The payload reported a failure on the node side.
    #[error("Node error: {0}")]
    Application(String),

    /// The operation has no known wire contract yet.
    #[error("Operation not supported by this client: {0}")]
    Unsupported(&'static str),
}

impl NodeError {
    /// True for the connection class: unreachable node, timeout, or a
    /// broken stream.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            NodeError::Connection { .. } | NodeError::Timeout { .. } | NodeError::Io(_)
        )
    }
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::InvalidData => NodeError::Decode(err.to_string()),
            _ => NodeError::Io(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseEnvelope {
    payload: Value,
}

/// Parse raw response bytes and return the envelope's payload.
pub fn decode_response(body: &[u8]) -> Result<Value, NodeError> {
    if body.is_empty() {
        return Err(NodeError::Decode(
            "Connection closed without a response".to_string(),
        ));
    }

    serde_json::from_slice::<ResponseEnvelope>(body)
        .map(|envelope| envelope.payload)
        .map_err(|e| NodeError::Decode(e.to_string()))
}

/// Opt-in check for application-level failures inside a payload.
///
/// The envelope carries no status, so a node that fails an operation can
/// only say so in the payload. An object with a string `error` field is
/// treated as such a failure.
pub fn check_application_error(payload: &Value) -> Result<(), NodeError> {
    match payload.get("error").and_then(Value::as_str) {
        Some(message) => Err(NodeError::Application(message.to_string())),
        None => Ok(()),
    }
}

/// Wire payload for `make_payment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentPayload {
    pub private_pem: String,
    pub address: String,
    pub amount: u64,
}

/// Wire payload for `generate_transaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequestPayload {
    pub from_address: String,
    pub to_address: String,
    pub amount: u64,
}

/// Node operations used by the payment flow.
///
/// Implemented by [`NodeClient`]; tests substitute a recording fake.
pub trait NodeApi {
    fn get_balance(&self, address: &str) -> impl Future<Output = Result<Value, NodeError>> + Send;

    fn make_payment(
        &self,
        private_pem: &str,
        receiver_address: &str,
        amount: u64,
    ) -> impl Future<Output = Result<Value, NodeError>> + Send;

    fn generate_transaction(
        &self,
        from_key: &str,
        to_key: &str,
        amount: u64,
    ) -> impl Future<Output = Result<Value, NodeError>> + Send;

    fn submit_transaction(
        &self,
        signed_bytes: &[u8],
    ) -> impl Future<Output = Result<Value, NodeError>> + Send;
}

/// Client for the Clarke node.
///
/// Holds only configuration. Every operation opens its own connection, so
/// a single client can be shared by reference across concurrent tasks.
///
/// # Example
///
/// ```ignore
/// use clarke_client::{config::NodeConfig, node::NodeClient};
///
/// let client = NodeClient::new(NodeConfig::default());
/// let blocks = client.get_blocks().await?;
/// let block = client.get_block("00ab...").await?;
/// ```
#[derive(Debug, Clone)]
pub struct NodeClient {
    config: NodeConfig,
}

impl Default for NodeClient {
    fn default() -> Self {
        Self::new(NodeConfig::default())
    }
}

impl NodeClient {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Ask the node to send `payload` back.
    pub async fn echo<T: Serialize>(&self, payload: T) -> Result<Value, NodeError> {
        self.call("echo", payload).await
    }

    /// Fetch every block the node knows about.
    pub async fn get_blocks(&self) -> Result<Value, NodeError> {
        self.call("get_blocks", json!({})).await
    }

    pub async fn get_block(&self, hash: &str) -> Result<Value, NodeError> {
        self.call("get_block", normalize_line_endings(hash)).await
    }

    pub async fn get_transaction(&self, hash: &str) -> Result<Value, NodeError> {
        self.call("get_transaction", normalize_line_endings(hash))
            .await
    }

    /// Look up the balance of an address (a public key PEM).
    pub async fn get_balance(&self, address: &str) -> Result<Value, NodeError> {
        self.call("get_balance", normalize_line_endings(address))
            .await
    }

    /// Ask the node to build, sign and submit a payment with the given key.
    ///
    /// `amount` must be positive; this is checked by the caller.
    pub async fn make_payment(
        &self,
        private_pem: &str,
        receiver_address: &str,
        amount: u64,
    ) -> Result<Value, NodeError> {
        let payload = PaymentPayload {
            private_pem: private_pem.to_string(),
            address: normalize_line_endings(receiver_address),
            amount,
        };
        self.call("make_payment", payload).await
    }

    /// Ask the node for an unsigned transaction moving `amount` between two
    /// public keys. The caller signs it locally.
    pub async fn generate_transaction(
        &self,
        from_key: &str,
        to_key: &str,
        amount: u64,
    ) -> Result<Value, NodeError> {
        let payload = TransactionRequestPayload {
            from_address: normalize_line_endings(from_key),
            to_address: normalize_line_endings(to_key),
            amount,
        };
        self.call("generate_transaction", payload).await
    }

    /// Submit a signed transaction.
    ///
    /// The node has no known operation for this yet, so the call always
    /// fails with [`NodeError::Unsupported`] without touching the network.
    pub async fn submit_transaction(&self, signed_bytes: &[u8]) -> Result<Value, NodeError> {
        tracing::warn!(
            "submit_transaction is not implemented ({} signed bytes dropped)",
            signed_bytes.len()
        );
        Err(NodeError::Unsupported("submit_transaction"))
    }

    /// Send one request envelope and return the response payload.
    ///
    /// This:
    /// 1. Opens a new TCP connection (bounded by the connect timeout)
    /// 2. Writes `{"message_type", "payload"}` followed by a blank line
    /// 3. Reads until the node closes the connection (bounded by the read timeout)
    /// 4. Parses `{"payload": ...}` and returns the payload
    ///
    /// The connection is dropped on every path out of this function.
    pub async fn call<T: Serialize>(
        &self,
        message_type: &str,
        payload: T,
    ) -> Result<Value, NodeError> {
        let request = encode_request(message_type, payload).map_err(NodeError::Encode)?;

        tracing::debug!(
            "-> {} ({} bytes) to {}",
            message_type,
            request.len(),
            self.config.address()
        );

        let result = self.exchange(&request).await;

        match &result {
            Ok(_) => tracing::debug!("<- {} ok", message_type),
            Err(e) => tracing::warn!("{} failed: {}", message_type, e),
        }

        result
    }

    async fn exchange(&self, request: &[u8]) -> Result<Value, NodeError> {
        let address = self.config.address();

        let mut stream = match timeout(self.config.connect_timeout, TcpStream::connect(&address))
            .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(NodeError::Connection { address, source }),
            Err(_) => {
                return Err(NodeError::Timeout {
                    stage: "accept the connection",
                    after: self.config.connect_timeout,
                })
            }
        };

        match timeout(self.config.read_timeout, write_request(&mut stream, request)).await {
            Ok(written) => written?,
            Err(_) => {
                return Err(NodeError::Timeout {
                    stage: "read the request",
                    after: self.config.read_timeout,
                })
            }
        }

        let body = match timeout(
            self.config.read_timeout,
            read_to_eof(&mut stream, MAX_RESPONSE_SIZE),
        )
        .await
        {
            Ok(read) => read?,
            Err(_) => {
                return Err(NodeError::Timeout {
                    stage: "close the connection",
                    after: self.config.read_timeout,
                })
            }
        };

        drop(stream);
        decode_response(&body)
    }
}

impl NodeApi for NodeClient {
    async fn get_balance(&self, address: &str) -> Result<Value, NodeError> {
        NodeClient::get_balance(self, address).await
    }

    async fn make_payment(
        &self,
        private_pem: &str,
        receiver_address: &str,
        amount: u64,
    ) -> Result<Value, NodeError> {
        NodeClient::make_payment(self, private_pem, receiver_address, amount).await
    }

    async fn generate_transaction(
        &self,
        from_key: &str,
        to_key: &str,
        amount: u64,
    ) -> Result<Value, NodeError> {
        NodeClient::generate_transaction(self, from_key, to_key, amount).await
    }

    async fn submit_transaction(&self, signed_bytes: &[u8]) -> Result<Value, NodeError> {
        NodeClient::submit_transaction(self, signed_bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_response_payload() {
        let payload = decode_response(br#"{"payload": [1, 2]}"#).unwrap();
        assert_eq!(payload, json!([1, 2]));
    }

    #[test]
    fn test_decode_response_ignores_extra_fields() {
        let payload = decode_response(br#"{"payload": "ok", "node": "a"}"#).unwrap();
        assert_eq!(payload, json!("ok"));
    }

    #[test]
    fn test_decode_response_empty_is_decode_error() {
        let err = decode_response(b"").unwrap_err();
        assert!(matches!(err, NodeError::Decode(_)));
        assert!(!err.is_connection());
    }

    #[test]
    fn test_decode_response_malformed() {
        for body in [
            &b"{\"payload\": [1,"[..],
            &b"not json"[..],
            &b"{\"result\": 1}"[..],
        ] {
            let err = decode_response(body).unwrap_err();
            assert!(
                matches!(err, NodeError::Decode(_)),
                "Expected Decode for {:?}, got {:?}",
                String::from_utf8_lossy(body),
                err
            );
        }
    }

    #[test]
    fn test_check_application_error() {
        assert!(check_application_error(&json!({"balance": 10})).is_ok());
        assert!(check_application_error(&json!([{"error": "x"}])).is_ok());
        assert!(check_application_error(&json!({"error": null})).is_ok());

        let err = check_application_error(&json!({"error": "Insufficient funds"})).unwrap_err();
        assert_eq!(err.to_string(), "Node error: Insufficient funds");
    }

    #[test]
    fn test_node_error_display() {
        let timeout_err = NodeError::Timeout {
            stage: "close the connection",
            after: Duration::from_millis(1500),
        };
        assert_eq!(
            timeout_err.to_string(),
            "Node did not close the connection within 1500ms"
        );
        assert!(timeout_err.is_connection());

        let unsupported = NodeError::Unsupported("submit_transaction");
        assert_eq!(
            unsupported.to_string(),
            "Operation not supported by this client: submit_transaction"
        );
        assert!(!unsupported.is_connection());
    }

    #[test]
    fn test_node_error_from_io() {
        let invalid = std::io::Error::new(std::io::ErrorKind::InvalidData, "too big");
        assert!(matches!(NodeError::from(invalid), NodeError::Decode(_)));

        let reset = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = NodeError::from(reset);
        assert!(matches!(err, NodeError::Io(_)));
        assert!(err.is_connection());
    }

    #[test]
    fn test_payment_payload_field_names() {
        let payload = PaymentPayload {
            private_pem: "KEY".to_string(),
            address: "ADDR".to_string(),
            amount: 3,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"private_pem": "KEY", "address": "ADDR", "amount": 3})
        );
    }

    #[tokio::test]
    async fn test_submit_transaction_is_unsupported() {
        // Port 1 is never dialed: the call must fail before any I/O.
        let client = NodeClient::new(NodeConfig::new("127.0.0.1", 1));
        let err = client.submit_transaction(b"signed").await.unwrap_err();
        assert!(matches!(err, NodeError::Unsupported("submit_transaction")));
    }
}
