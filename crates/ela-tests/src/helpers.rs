//! Shared test helpers for E2E and integration tests.

use std::sync::Arc;

use ela_core::{Hash256, KeyPair, OutPoint, PublicKey, Transaction};
use ela_wallet::{
    ChainBlock, ChainClient, ChainOutput, ChainTransaction, KeyStore, MemoryStore, WalletEngine, WalletError,
};
use parking_lot::Mutex;

pub const PASSWORD: &[u8] = b"correct horse";

/// Deterministic key pair from a seed byte.
pub fn key_pair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes(&[seed; 32]).unwrap()
}

pub fn public_key(seed: u8) -> PublicKey {
    key_pair(seed).public_key()
}

/// In-memory keystore holding the seeded key under [`PASSWORD`].
pub fn keystore(seed: u8) -> KeyStore {
    KeyStore::create_with_key(PASSWORD, key_pair(seed)).unwrap()
}

/// Node double: an append-only chain plus a log of broadcast transactions.
#[derive(Default)]
pub struct MockNode {
    blocks: Mutex<Vec<ChainBlock>>,
    broadcasts: Mutex<Vec<String>>,
}

impl MockNode {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a block and return its height.
    pub fn mine(&self, transactions: Vec<ChainTransaction>) -> u32 {
        let mut blocks = self.blocks.lock();
        let height = blocks.len() as u32;
        blocks.push(ChainBlock { height, transactions });
        height
    }

    /// Mine empty blocks until the tip is at `height`.
    pub fn mine_to(&self, height: u32) {
        while self.tip().map_or(true, |tip| tip < height) {
            self.mine(vec![]);
        }
    }

    pub fn tip(&self) -> Option<u32> {
        (self.blocks.lock().len() as u32).checked_sub(1)
    }

    /// Raw hex of every broadcast transaction, oldest first.
    pub fn broadcasts(&self) -> Vec<String> {
        self.broadcasts.lock().clone()
    }

    /// Confirm a broadcast transaction in the next block, the way the node
    /// would report it.
    pub fn confirm(&self, tx: &Transaction) -> u32 {
        let outputs = tx
            .outputs()
            .iter()
            .map(|o| ChainOutput {
                address: o.program_hash.to_address(),
                value: o.value,
                lock: o.output_lock,
            })
            .collect();
        self.mine(vec![ChainTransaction {
            txid: tx.hash(),
            is_coinbase: tx.is_coinbase(),
            inputs: tx.inputs().iter().map(|i| i.previous).collect(),
            outputs,
        }])
    }
}

impl ChainClient for MockNode {
    fn chain_height(&self) -> Result<u32, WalletError> {
        self.tip()
            .ok_or_else(|| WalletError::Rpc { code: -1, message: "empty chain".into() })
    }

    fn block_by_height(&self, height: u32) -> Result<ChainBlock, WalletError> {
        self.blocks
            .lock()
            .get(height as usize)
            .cloned()
            .ok_or_else(|| WalletError::Rpc { code: -1, message: format!("no block at {height}") })
    }

    fn broadcast_raw_transaction(&self, raw_hex: &str) -> Result<String, WalletError> {
        let tx = Transaction::from_hex(raw_hex)?;
        self.broadcasts.lock().push(raw_hex.to_string());
        Ok(tx.hash().to_reversed_hex())
    }
}

/// A plain payment of `value` to `address` with a unique txid.
pub fn payment(txid_seed: u8, address: &str, value: u64) -> ChainTransaction {
    ChainTransaction {
        txid: Hash256([txid_seed; 32]),
        is_coinbase: false,
        inputs: vec![],
        outputs: vec![ChainOutput { address: address.to_string(), value, lock: 0 }],
    }
}

/// A coinbase paying `value` to `address`.
pub fn coinbase(txid_seed: u8, address: &str, value: u64) -> ChainTransaction {
    ChainTransaction {
        is_coinbase: true,
        ..payment(txid_seed, address, value)
    }
}

pub fn outpoint(txid_seed: u8, index: u16) -> OutPoint {
    OutPoint::new(Hash256([txid_seed; 32]), index)
}

/// Engine over a fresh memory store and the given node.
pub fn engine(seed: u8, node: &Arc<MockNode>) -> (WalletEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = WalletEngine::new(keystore(seed), store.clone(), node.clone()).unwrap();
    (engine, store)
}
