//! # ela-wallet: light wallet engine for the ELA main chain.
//!
//! Custodies one P-256 signing key under a password, tracks single-key and
//! M-of-N addresses, keeps a UTXO set in step with a node, and builds and
//! signs transactions in the consensus wire format.
//!
//! # Modules
//!
//! - [`error`]: `WalletError` enum
//! - [`secret`]: zeroize-on-drop byte buffer
//! - [`encryption`]: AES-256-CBC key wrapping and password derivation
//! - [`keystore`]: encrypted keystore record and signing
//! - [`store`]: `UtxoStore` trait and the in-memory store
//! - [`coin_selection`]: smallest-first UTXO selection
//! - [`builder`]: unsigned transaction assembly
//! - [`signer`]: single and threshold signing
//! - [`rpc`]: `ChainClient` trait and the HTTP JSON-RPC client
//! - [`sync`]: block replay into the store
//! - [`config`]: `WalletConfig` loading
//! - [`logging`]: tracing subscriber setup
//! - [`wallet`]: `WalletEngine` composition

pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod encryption;
pub mod error;
pub mod keystore;
pub mod logging;
pub mod rpc;
pub mod secret;
pub mod signer;
pub mod store;
pub mod sync;
pub mod wallet;

// Re-exports for convenient access
pub use builder::{Recipient, TransactionBuilder, UnsignedTransaction, DEFAULT_FEE};
pub use coin_selection::{CoinSelection, CoinSelector};
pub use config::WalletConfig;
pub use error::WalletError;
pub use keystore::{KeyStore, KeystoreRecord};
pub use logging::init_logging;
pub use rpc::{ChainBlock, ChainClient, ChainOutput, ChainTransaction, HttpRpcClient};
pub use secret::SecretBytes;
pub use signer::{signature_status, SignatureStatus, Signer};
pub use store::{AddressKind, AddressRecord, BlockChanges, MemoryStore, Utxo, UtxoChange, UtxoStore};
pub use sync::{ChainSync, SyncReport};
pub use wallet::{AddressBalance, WalletEngine};
