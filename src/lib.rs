//! Clarke node client library
//!
//! This library provides the pieces the Clarke dashboard is built from:
//!
//! - `node` - RPC client for the Clarke node (one TCP connection per call)
//! - `wallet` - Local keypair used as the account address and for signing
//! - `payments` - Amount validation and the generate/sign/submit flow
//! - `models` - Typed views over block and transaction payloads
//! - `config` - Connection settings and key path from the environment
//!
//! # Usage
//!
//! Construct one client and one wallet at startup and pass them to
//! whatever needs them:
//!
//! ```ignore
//! use clarke_client::{config, node::NodeClient, payments::Payments, wallet::Wallet};
//!
//! let client = NodeClient::new(config::NodeConfig::from_env());
//! let wallet = Wallet::load_or_generate(&config::default_wallet_path())?;
//!
//! let balance = client.get_balance(wallet.address()).await?;
//! Payments::new(&client, &wallet).pay_with_key(&receiver, 10).await?;
//! ```

pub mod config;
pub mod models;
pub mod node;
pub mod payments;
pub mod wallet;
