//! Cross-crate test suite for the ELA wallet.
//!
//! Integration tests drive a full [`ela_wallet::WalletEngine`] against an
//! in-process node, and property tests throw randomized and hostile input
//! at the codec, the keystore crypto and coin selection.

pub mod helpers;
