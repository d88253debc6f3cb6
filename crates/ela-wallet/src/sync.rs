//! Replays node blocks into the [`UtxoStore`].
//!
//! Each block is turned into one [`BlockChanges`] (per transaction: outputs
//! to tracked addresses inserted, then every input spent) and handed to
//! [`UtxoStore::apply_block`], which commits it together with the watermark
//! advance. A failed fetch leaves the watermark where it was, so sync can
//! simply be retried.

use std::collections::HashMap;

use ela_core::constants::COINBASE_MATURITY;
use ela_core::error::SerializationError;
use ela_core::{OutPoint, ProgramHash};
use tracing::{debug, info};

use crate::error::WalletError;
use crate::rpc::{ChainBlock, ChainClient};
use crate::store::{BlockChanges, Utxo, UtxoChange, UtxoStore};

/// Outcome of one [`ChainSync::sync`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Watermark before the run.
    pub from_height: u32,
    /// Watermark after the run.
    pub to_height: u32,
    pub blocks: u32,
    pub utxos_added: usize,
    pub utxos_spent: usize,
}

/// Brings a [`UtxoStore`] up to the node's best height.
pub struct ChainSync<'a> {
    client: &'a dyn ChainClient,
    store: &'a dyn UtxoStore,
    coinbase_maturity: u32,
}

impl<'a> ChainSync<'a> {
    pub fn new(client: &'a dyn ChainClient, store: &'a dyn UtxoStore) -> Self {
        Self {
            client,
            store,
            coinbase_maturity: COINBASE_MATURITY,
        }
    }

    /// Blocks a coinbase output stays locked after its block.
    pub fn with_coinbase_maturity(mut self, maturity: u32) -> Self {
        self.coinbase_maturity = maturity;
        self
    }

    /// Fetch and apply blocks until the watermark passes the remote height.
    ///
    /// The remote height is queried again after each catch-up pass so blocks
    /// mined during the pass are picked up too.
    pub fn sync(&self) -> Result<SyncReport, WalletError> {
        let tracked: HashMap<String, ProgramHash> = self
            .store
            .addresses()?
            .into_iter()
            .map(|r| (r.address(), r.program_hash))
            .collect();

        let start = self.store.watermark()?;
        let mut report = SyncReport {
            from_height: start,
            to_height: start,
            ..SyncReport::default()
        };

        loop {
            let remote = self.client.chain_height()?;
            let mut watermark = self.store.watermark()?;
            if watermark > remote {
                break;
            }
            info!(from = watermark, to = remote, "syncing blocks");

            while watermark <= remote {
                let block = self.client.block_by_height(watermark)?;
                if block.height != watermark {
                    return Err(SerializationError::InvalidFormat(format!(
                        "requested block {watermark}, node returned {}",
                        block.height
                    ))
                    .into());
                }

                let changes = self.block_changes(&block, &tracked)?;
                self.store.apply_block(&changes)?;

                report.blocks += 1;
                report.utxos_added += changes.inserted();
                report.utxos_spent += changes.spent();
                watermark = self.store.watermark()?;
            }
        }

        report.to_height = self.store.watermark()?;
        info!(
            from = report.from_height,
            to = report.to_height,
            blocks = report.blocks,
            added = report.utxos_added,
            spent = report.utxos_spent,
            "sync complete"
        );
        Ok(report)
    }

    /// Translate one block into store mutations for the `tracked` addresses.
    ///
    /// Spends are emitted for every input; the store ignores outpoints it
    /// does not hold.
    pub fn block_changes(
        &self,
        block: &ChainBlock,
        tracked: &HashMap<String, ProgramHash>,
    ) -> Result<BlockChanges, WalletError> {
        let mut changes = BlockChanges::new(block.height);

        for tx in &block.transactions {
            for (index, output) in tx.outputs.iter().enumerate() {
                let Some(program_hash) = tracked.get(&output.address) else {
                    continue;
                };
                let index = u16::try_from(index).map_err(|_| {
                    SerializationError::InvalidFormat(format!("output index {index} out of range"))
                })?;
                let lock_height = if tx.is_coinbase {
                    block.height.saturating_add(self.coinbase_maturity)
                } else {
                    output.lock
                };
                debug!(txid = %tx.txid, index, amount = output.value, lock_height, "found output");
                changes.changes.push(UtxoChange::Insert {
                    program_hash: *program_hash,
                    utxo: Utxo {
                        outpoint: OutPoint::new(tx.txid, index),
                        amount: output.value,
                        lock_height,
                    },
                });
            }

            changes
                .changes
                .extend(tx.inputs.iter().copied().map(UtxoChange::Spend));
        }

        Ok(changes)
    }
}
