//! Caller-side payment flow.
//!
//! Amount validation happens here, before any request reaches the node.
//! Two paths exist:
//!
//! - [`Payments::pay_with_key`]: hand the private key to the node via
//!   `make_payment` and let it sign.
//! - [`Payments::submit`]: ask the node for an unsigned transaction with
//!   `generate_transaction`, sign its canonical bytes locally, and submit.
//!   Submission has no node contract yet and always fails with
//!   [`NodeError::Unsupported`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::node::{normalize_line_endings, NodeApi, NodeError};
use crate::wallet::{signature_hex, Wallet, WalletError};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Amount must be a positive integer, got {0}")]
    InvalidAmount(i64),

    #[error("Receiver address is empty")]
    MissingReceiver,

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("Failed to encode transaction: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A node-generated transaction plus the wallet's signature over its
/// canonical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub transaction: Value,
    /// Hex-encoded ed25519 signature.
    pub signature: String,
}

/// Reject non-positive amounts.
pub fn validate_amount(amount: i64) -> Result<u64, PaymentError> {
    if amount <= 0 {
        return Err(PaymentError::InvalidAmount(amount));
    }
    Ok(amount as u64)
}

/// Canonical byte form of an unsigned transaction: compact JSON with
/// object keys in sorted order.
pub fn canonical_bytes(transaction: &Value) -> Result<Vec<u8>, PaymentError> {
    // serde_json's Map is a BTreeMap without `preserve_order`
    serde_json::to_vec(transaction).map_err(PaymentError::Encode)
}

/// Payment operations against an injected node and wallet.
pub struct Payments<'a, N: NodeApi> {
    node: &'a N,
    wallet: &'a Wallet,
}

impl<'a, N: NodeApi> Payments<'a, N> {
    pub fn new(node: &'a N, wallet: &'a Wallet) -> Self {
        Self { node, wallet }
    }

    /// Addresses are opaque: only line endings change, the rest is sent
    /// exactly as given.
    fn check_receiver(receiver: &str) -> Result<String, PaymentError> {
        if receiver.trim().is_empty() {
            return Err(PaymentError::MissingReceiver);
        }
        Ok(normalize_line_endings(receiver))
    }

    /// Balance of this wallet's own address.
    pub async fn own_balance(&self) -> Result<Value, PaymentError> {
        Ok(self.node.get_balance(self.wallet.address()).await?)
    }

    /// Pay `amount` to `receiver` by sending the wallet's key to the node.
    pub async fn pay_with_key(&self, receiver: &str, amount: i64) -> Result<Value, PaymentError> {
        let amount = validate_amount(amount)?;
        let receiver = Self::check_receiver(receiver)?;
        let private_pem = self.wallet.private_pem()?;

        tracing::info!("Requesting payment of {} via make_payment", amount);
        Ok(self
            .node
            .make_payment(&private_pem, &receiver, amount)
            .await?)
    }

    /// Fetch an unsigned transaction from the node and sign it locally.
    pub async fn prepare(
        &self,
        receiver: &str,
        amount: i64,
    ) -> Result<SignedTransaction, PaymentError> {
        let amount = validate_amount(amount)?;
        let receiver = Self::check_receiver(receiver)?;

        let transaction = self
            .node
            .generate_transaction(self.wallet.address(), &receiver, amount)
            .await?;

        let bytes = canonical_bytes(&transaction)?;
        let signature = self.wallet.sign(&bytes);
        tracing::debug!("Signed {} canonical transaction bytes", bytes.len());

        Ok(SignedTransaction {
            transaction,
            signature: signature_hex(&signature),
        })
    }

    /// Prepare, sign and submit a payment.
    pub async fn submit(&self, receiver: &str, amount: i64) -> Result<Value, PaymentError> {
        let signed = self.prepare(receiver, amount).await?;
        let signed_bytes = serde_json::to_vec(&signed).map_err(PaymentError::Encode)?;
        Ok(self.node.submit_transaction(&signed_bytes).await?)
    }
}
