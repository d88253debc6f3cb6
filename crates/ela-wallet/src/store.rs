//! Address and UTXO persistence.
//!
//! [`UtxoStore`] is the seam to the durable storage engine. The engine is
//! expected to apply each block's [`BlockChanges`] atomically, so the
//! watermark and the UTXO set never disagree. [`MemoryStore`] is the
//! in-process implementation used by tests and short-lived wallets.

use std::collections::HashMap;

use ela_core::{OutPoint, ProgramHash};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::WalletError;

/// Role of a tracked address. Codes match the persisted `type` column.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// The keystore's own address.
    Master = 0,
    /// Watched single-key address.
    Standard = 2,
    /// Watched M-of-N address.
    MultiSig = 4,
}

/// A tracked address. Never mutated; only added and deleted.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AddressRecord {
    pub program_hash: ProgramHash,
    pub redeem_script: Vec<u8>,
    pub kind: AddressKind,
}

impl AddressRecord {
    pub fn address(&self) -> String {
        self.program_hash.to_address()
    }
}

/// An unspent output owned by a tracked address.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    /// Value in sela.
    pub amount: u64,
    /// Height before which the UTXO may not be spent; 0 for none.
    pub lock_height: u32,
}

impl Utxo {
    /// Whether the UTXO is still locked when the store has seen `watermark`.
    pub fn is_locked(&self, watermark: u32) -> bool {
        self.lock_height > watermark
    }
}

/// One UTXO mutation, applied in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UtxoChange {
    Insert { program_hash: ProgramHash, utxo: Utxo },
    Spend(OutPoint),
}

/// Everything one block does to the tracked UTXO set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockChanges {
    pub height: u32,
    pub changes: Vec<UtxoChange>,
}

impl BlockChanges {
    pub fn new(height: u32) -> Self {
        Self { height, changes: Vec::new() }
    }

    pub fn inserted(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, UtxoChange::Insert { .. }))
            .count()
    }

    pub fn spent(&self) -> usize {
        self.changes.len() - self.inserted()
    }
}

/// Durable address/UTXO/watermark storage.
///
/// Inserting an existing outpoint and deleting a missing one are no-ops, so
/// replaying a block is harmless.
pub trait UtxoStore: Send + Sync {
    /// Track a new address. Fails with `AddressExists` on a duplicate.
    fn add_address(&self, record: AddressRecord) -> Result<(), WalletError>;

    /// Stop tracking an address and drop its UTXOs.
    fn delete_address(&self, program_hash: &ProgramHash) -> Result<(), WalletError>;

    fn address(&self, program_hash: &ProgramHash) -> Result<Option<AddressRecord>, WalletError>;

    fn addresses(&self) -> Result<Vec<AddressRecord>, WalletError>;

    fn add_utxo(&self, program_hash: &ProgramHash, utxo: Utxo) -> Result<(), WalletError>;

    fn delete_utxo(&self, outpoint: &OutPoint) -> Result<(), WalletError>;

    fn utxos(&self, program_hash: &ProgramHash) -> Result<Vec<Utxo>, WalletError>;

    /// Next block height to process.
    fn watermark(&self) -> Result<u32, WalletError>;

    /// Apply a block's changes and set the watermark to `height + 1` as one unit.
    fn apply_block(&self, changes: &BlockChanges) -> Result<(), WalletError>;

    /// Zero the watermark and drop every UTXO; addresses are kept.
    fn reset(&self) -> Result<(), WalletError>;
}

#[derive(Default)]
struct Inner {
    addresses: HashMap<ProgramHash, AddressRecord>,
    utxos: HashMap<OutPoint, (ProgramHash, Utxo)>,
    watermark: u32,
}

impl Inner {
    fn insert(&mut self, program_hash: ProgramHash, utxo: Utxo) {
        if self.addresses.contains_key(&program_hash) {
            self.utxos.entry(utxo.outpoint).or_insert((program_hash, utxo));
        }
    }
}

/// In-memory [`UtxoStore`]. Every block is applied under one write lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of UTXOs across all addresses.
    pub fn utxo_count(&self) -> usize {
        self.inner.read().utxos.len()
    }
}

impl UtxoStore for MemoryStore {
    fn add_address(&self, record: AddressRecord) -> Result<(), WalletError> {
        let mut inner = self.inner.write();
        if inner.addresses.contains_key(&record.program_hash) {
            return Err(WalletError::AddressExists(record.address()));
        }
        inner.addresses.insert(record.program_hash, record);
        Ok(())
    }

    fn delete_address(&self, program_hash: &ProgramHash) -> Result<(), WalletError> {
        let mut inner = self.inner.write();
        if inner.addresses.remove(program_hash).is_none() {
            return Err(WalletError::UnknownAddress(program_hash.to_address()));
        }
        inner.utxos.retain(|_, (owner, _)| owner != program_hash);
        Ok(())
    }

    fn address(&self, program_hash: &ProgramHash) -> Result<Option<AddressRecord>, WalletError> {
        Ok(self.inner.read().addresses.get(program_hash).cloned())
    }

    fn addresses(&self) -> Result<Vec<AddressRecord>, WalletError> {
        let mut all: Vec<_> = self.inner.read().addresses.values().cloned().collect();
        all.sort_by_key(|r| (r.kind as u8, r.program_hash));
        Ok(all)
    }

    fn add_utxo(&self, program_hash: &ProgramHash, utxo: Utxo) -> Result<(), WalletError> {
        self.inner.write().insert(*program_hash, utxo);
        Ok(())
    }

    fn delete_utxo(&self, outpoint: &OutPoint) -> Result<(), WalletError> {
        self.inner.write().utxos.remove(outpoint);
        Ok(())
    }

    fn utxos(&self, program_hash: &ProgramHash) -> Result<Vec<Utxo>, WalletError> {
        let inner = self.inner.read();
        let mut found: Vec<Utxo> = inner
            .utxos
            .values()
            .filter(|(owner, _)| owner == program_hash)
            .map(|(_, utxo)| *utxo)
            .collect();
        found.sort_by_key(|u| u.outpoint);
        Ok(found)
    }

    fn watermark(&self) -> Result<u32, WalletError> {
        Ok(self.inner.read().watermark)
    }

    fn apply_block(&self, changes: &BlockChanges) -> Result<(), WalletError> {
        let next = changes
            .height
            .checked_add(1)
            .ok_or_else(|| WalletError::Store("block height overflow".into()))?;
        let mut inner = self.inner.write();
        for change in &changes.changes {
            match change {
                UtxoChange::Insert { program_hash, utxo } => inner.insert(*program_hash, *utxo),
                UtxoChange::Spend(outpoint) => {
                    inner.utxos.remove(outpoint);
                }
            }
        }
        inner.watermark = inner.watermark.max(next);
        debug!(height = changes.height, changes = changes.changes.len(), "applied block");
        Ok(())
    }

    fn reset(&self) -> Result<(), WalletError> {
        let mut inner = self.inner.write();
        inner.utxos.clear();
        inner.watermark = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ela_core::{Hash256, SignType};

    fn record(seed: u8) -> AddressRecord {
        AddressRecord {
            program_hash: ProgramHash::new(SignType::Standard, [seed; 20]),
            redeem_script: vec![seed; 35],
            kind: AddressKind::Standard,
        }
    }

    fn utxo(seed: u8, amount: u64) -> Utxo {
        Utxo {
            outpoint: OutPoint::new(Hash256([seed; 32]), 0),
            amount,
            lock_height: 0,
        }
    }

    #[test]
    fn duplicate_address_rejected() {
        let store = MemoryStore::new();
        store.add_address(record(1)).unwrap();
        assert!(matches!(store.add_address(record(1)), Err(WalletError::AddressExists(_))));
        assert_eq!(store.addresses().unwrap().len(), 1);
    }

    #[test]
    fn utxo_insert_and_delete_are_idempotent() {
        let store = MemoryStore::new();
        let a = record(1);
        store.add_address(a.clone()).unwrap();
        store.add_utxo(&a.program_hash, utxo(9, 100)).unwrap();
        store.add_utxo(&a.program_hash, utxo(9, 100)).unwrap();
        assert_eq!(store.utxos(&a.program_hash).unwrap().len(), 1);

        let op = utxo(9, 100).outpoint;
        store.delete_utxo(&op).unwrap();
        store.delete_utxo(&op).unwrap();
        assert!(store.utxos(&a.program_hash).unwrap().is_empty());
    }

    #[test]
    fn untracked_owner_ignored() {
        let store = MemoryStore::new();
        store.add_utxo(&record(5).program_hash, utxo(1, 10)).unwrap();
        assert_eq!(store.utxo_count(), 0);
    }

    #[test]
    fn apply_block_advances_watermark_with_changes() {
        let store = MemoryStore::new();
        let a = record(1);
        store.add_address(a.clone()).unwrap();

        let mut block = BlockChanges::new(7);
        block.changes.push(UtxoChange::Insert { program_hash: a.program_hash, utxo: utxo(1, 10) });
        block.changes.push(UtxoChange::Insert { program_hash: a.program_hash, utxo: utxo(2, 20) });
        block.changes.push(UtxoChange::Spend(utxo(1, 10).outpoint));
        assert_eq!(block.inserted(), 2);
        assert_eq!(block.spent(), 1);

        store.apply_block(&block).unwrap();
        assert_eq!(store.watermark().unwrap(), 8);
        assert_eq!(store.utxos(&a.program_hash).unwrap(), vec![utxo(2, 20)]);
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let store = MemoryStore::new();
        store.apply_block(&BlockChanges::new(10)).unwrap();
        store.apply_block(&BlockChanges::new(3)).unwrap();
        assert_eq!(store.watermark().unwrap(), 11);
    }

    #[test]
    fn reset_keeps_addresses() {
        let store = MemoryStore::new();
        let a = record(1);
        store.add_address(a.clone()).unwrap();
        store.add_utxo(&a.program_hash, utxo(1, 10)).unwrap();
        store.apply_block(&BlockChanges::new(50)).unwrap();

        store.reset().unwrap();
        assert_eq!(store.watermark().unwrap(), 0);
        assert_eq!(store.utxo_count(), 0);
        assert_eq!(store.addresses().unwrap(), vec![a]);
    }

    #[test]
    fn delete_address_drops_its_utxos() {
        let store = MemoryStore::new();
        let (a, b) = (record(1), record(2));
        store.add_address(a.clone()).unwrap();
        store.add_address(b.clone()).unwrap();
        store.add_utxo(&a.program_hash, utxo(1, 10)).unwrap();
        store.add_utxo(&b.program_hash, utxo(2, 20)).unwrap();

        store.delete_address(&a.program_hash).unwrap();
        assert_eq!(store.utxo_count(), 1);
        assert!(matches!(
            store.delete_address(&a.program_hash),
            Err(WalletError::UnknownAddress(_))
        ));
    }

    #[test]
    fn lock_check_is_strict() {
        let u = Utxo { lock_height: 200, ..utxo(1, 1) };
        assert!(u.is_locked(199));
        assert!(!u.is_locked(200));
    }
}
