//! Wallet engine: one keystore, one UTXO store, one node.
//!
//! The engine owns its collaborators explicitly; there is no global state.
//! The keystore's own address is always tracked as the master address.
//! Adding a watched account resets the store so the next
//! [`WalletEngine::sync`] rescans from genesis.

use std::path::Path;
use std::sync::Arc;

use ela_core::constants::COINBASE_MATURITY;
use ela_core::script::{multisig_redeem_script, program_hash, standard_program_hash, standard_redeem_script};
use ela_core::{ProgramHash, PublicKey, SignType, Transaction};
use tracing::{info, warn};

use crate::builder::{TransactionBuilder, UnsignedTransaction};
use crate::coin_selection::CoinSelector;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::keystore::KeyStore;
use crate::rpc::{ChainClient, HttpRpcClient};
use crate::signer::{signature_status, SignatureStatus, Signer};
use crate::store::{AddressKind, AddressRecord, UtxoStore};
use crate::sync::{ChainSync, SyncReport};

/// Balance of one tracked address at the store's watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressBalance {
    pub record: AddressRecord,
    /// Spendable now, in sela.
    pub available: u64,
    /// Held by lock heights above the watermark, in sela.
    pub locked: u64,
}

impl AddressBalance {
    pub fn total(&self) -> u64 {
        self.available.saturating_add(self.locked)
    }
}

pub struct WalletEngine {
    keystore: KeyStore,
    store: Arc<dyn UtxoStore>,
    client: Arc<dyn ChainClient>,
    coinbase_maturity: u32,
}

impl WalletEngine {
    /// Wrap an unlocked keystore, registering its address in `store`.
    pub fn new(
        keystore: KeyStore,
        store: Arc<dyn UtxoStore>,
        client: Arc<dyn ChainClient>,
    ) -> Result<Self, WalletError> {
        let master = keystore.program_hash();
        if store.address(&master)?.is_none() {
            store.add_address(AddressRecord {
                program_hash: master,
                redeem_script: keystore.redeem_script().to_vec(),
                kind: AddressKind::Master,
            })?;
        }
        Ok(Self {
            keystore,
            store,
            client,
            coinbase_maturity: COINBASE_MATURITY,
        })
    }

    /// Create a fresh keystore at `path`.
    pub fn create(
        path: &Path,
        password: &[u8],
        store: Arc<dyn UtxoStore>,
        client: Arc<dyn ChainClient>,
    ) -> Result<Self, WalletError> {
        Self::new(KeyStore::create_at(path, password)?, store, client)
    }

    /// Open the keystore at `path`.
    pub fn open(
        path: &Path,
        password: &[u8],
        store: Arc<dyn UtxoStore>,
        client: Arc<dyn ChainClient>,
    ) -> Result<Self, WalletError> {
        Self::new(KeyStore::open(path, password)?, store, client)
    }

    /// Open the configured keystore against the configured node.
    pub fn open_with_config(
        config: &WalletConfig,
        password: &[u8],
        store: Arc<dyn UtxoStore>,
    ) -> Result<Self, WalletError> {
        let client = HttpRpcClient::new(&config.rpc_url(), config.rpc_timeout())?;
        Ok(Self::open(&config.keystore_path(), password, store, Arc::new(client))?
            .with_coinbase_maturity(config.coinbase_maturity))
    }

    pub fn with_coinbase_maturity(mut self, maturity: u32) -> Self {
        self.coinbase_maturity = maturity;
        self
    }

    pub fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    pub fn store(&self) -> &dyn UtxoStore {
        &*self.store
    }

    /// The master address.
    pub fn address(&self) -> String {
        self.keystore.address()
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    /// Watch a single-key address.
    pub fn add_standard_account(&self, public_key: &PublicKey) -> Result<AddressRecord, WalletError> {
        self.add_account(AddressRecord {
            program_hash: standard_program_hash(public_key),
            redeem_script: standard_redeem_script(public_key),
            kind: AddressKind::Standard,
        })
    }

    /// Watch an M-of-N address. `m` defaults to `N/2 + 1`.
    pub fn add_multisig_account(
        &self,
        public_keys: &[PublicKey],
        m: Option<usize>,
    ) -> Result<AddressRecord, WalletError> {
        let redeem_script = multisig_redeem_script(public_keys, m).map_err(WalletError::from_script)?;
        self.add_account(AddressRecord {
            program_hash: program_hash(&redeem_script, SignType::MultiSig),
            redeem_script,
            kind: AddressKind::MultiSig,
        })
    }

    fn add_account(&self, record: AddressRecord) -> Result<AddressRecord, WalletError> {
        self.store.add_address(record.clone())?;
        self.store.reset()?;
        info!(address = %record.address(), kind = ?record.kind, "added account, rescan required");
        Ok(record)
    }

    /// Stop watching `address`. The master address cannot be removed.
    pub fn delete_account(&self, address: &str) -> Result<(), WalletError> {
        let program_hash = ProgramHash::from_address(address)?;
        if program_hash == self.keystore.program_hash() {
            return Err(WalletError::InvalidParameter("cannot delete the master address".into()));
        }
        self.store.delete_address(&program_hash)?;
        info!(address, "deleted account");
        Ok(())
    }

    pub fn accounts(&self) -> Result<Vec<AddressRecord>, WalletError> {
        self.store.addresses()
    }

    pub fn balances(&self) -> Result<Vec<AddressBalance>, WalletError> {
        let watermark = self.store.watermark()?;
        self.store
            .addresses()?
            .into_iter()
            .map(|record| {
                let utxos = self.store.utxos(&record.program_hash)?;
                let available = CoinSelector::spendable(&utxos, watermark)
                    .iter()
                    .fold(0u64, |acc, u| acc.saturating_add(u.amount));
                let locked = utxos
                    .iter()
                    .filter(|u| u.is_locked(watermark))
                    .fold(0u64, |acc, u| acc.saturating_add(u.amount));
                Ok(AddressBalance { record, available, locked })
            })
            .collect()
    }

    // ── Chain ────────────────────────────────────────────────────────────────

    pub fn sync(&self) -> Result<SyncReport, WalletError> {
        ChainSync::new(&*self.client, &*self.store)
            .with_coinbase_maturity(self.coinbase_maturity)
            .sync()
    }

    /// Drop all UTXOs and rewind to genesis.
    pub fn reset(&self) -> Result<(), WalletError> {
        warn!("resetting utxo store");
        self.store.reset()
    }

    // ── Transactions ─────────────────────────────────────────────────────────

    /// A builder spending from `from`, or from the master address.
    pub fn builder(&self, from: Option<&str>) -> Result<TransactionBuilder, WalletError> {
        let spender = match from {
            None => self.keystore.program_hash(),
            Some(address) => {
                let program_hash = ProgramHash::from_address(address)?;
                if self.store.address(&program_hash)?.is_none() {
                    return Err(WalletError::UnknownAddress(address.to_string()));
                }
                program_hash
            }
        };
        Ok(TransactionBuilder::new(spender))
    }

    /// Build against the store as it stands; does not sync first.
    pub fn create_transaction(&self, builder: &TransactionBuilder) -> Result<UnsignedTransaction, WalletError> {
        builder.build(&*self.store)
    }

    pub fn sign_transaction(&self, password: &[u8], tx: &mut Transaction) -> Result<SignatureStatus, WalletError> {
        Signer::new(&self.keystore).sign(password, tx)
    }

    /// Submit a fully signed transaction; returns the node's txid string.
    pub fn broadcast(&self, tx: &Transaction) -> Result<String, WalletError> {
        let status = signature_status(tx)?;
        if !status.is_complete() {
            return Err(WalletError::InvalidParameter(format!(
                "transaction needs {} more signature(s)",
                status.need
            )));
        }
        let txid = self.client.broadcast_raw_transaction(&tx.to_hex())?;
        info!(txid = %tx.hash(), node_txid = %txid, "broadcast transaction");
        Ok(txid)
    }

    /// Sync, build, sign and broadcast in one step.
    ///
    /// Only single-signer spends complete here; a multisig spend that still
    /// needs cosigners is rejected before anything is sent.
    pub fn send(&self, password: &[u8], builder: &TransactionBuilder) -> Result<String, WalletError> {
        self.keystore.verify_password(password)?;
        self.sync()?;
        let mut unsigned = self.create_transaction(builder)?;
        self.sign_transaction(password, &mut unsigned.tx)?;
        self.broadcast(&unsigned.tx)
    }

    pub fn change_password(&self, old_password: &[u8], new_password: &[u8]) -> Result<(), WalletError> {
        self.keystore.change_password(old_password, new_password)
    }
}
