//! RPC client for the Clarke node.
//!
//! The node speaks JSON over plain TCP, one request per connection:
//!
//! ```text
//! ┌─────────────────┐          TCP :8334           ┌─────────────────────┐
//! │  clarke client  │  ──── envelope + "\n\n" ───► │     Clarke node     │
//! │  (NodeClient)   │  ◄─── {"payload": ...} EOF ─ │                     │
//! └─────────────────┘                              └─────────────────────┘
//! ```
//!
//! # Protocol
//!
//! Requests are `{"message_type": "<op>", "payload": <op-specific>}` followed
//! by an empty line. The response is `{"payload": <op-specific>}` and ends
//! when the node closes the connection. There is no length prefix and no
//! status field; failures show up as connection errors, undecodable bytes,
//! or inside the payload.
//!
//! # Usage
//!
//! ```ignore
//! use clarke_client::node::NodeClient;
//!
//! let client = NodeClient::default();
//! let balance = client.get_balance(&wallet.address()).await?;
//! ```

mod client;
mod framing;

pub use client::{
    check_application_error, decode_response, NodeApi, NodeClient, NodeError, PaymentPayload,
    TransactionRequestPayload,
};
pub use framing::{
    encode_request, normalize_line_endings, read_to_eof, write_request, MAX_RESPONSE_SIZE,
    REQUEST_TERMINATOR,
};
