//! Smallest-first coin selection.
//!
//! A single spendable UTXO equal to the whole requirement (outputs plus fee)
//! is spent alone. Otherwise spendable UTXOs are walked in ascending amount
//! order: one below the outstanding amount is consumed and the walk
//! continues, one equal to it ends selection with no change, and one above
//! it ends selection with the excess as change.

use crate::error::WalletError;
use crate::store::Utxo;

/// Result of coin selection: which UTXOs to spend and the change owed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Selected UTXOs, in spend order.
    pub selected: Vec<Utxo>,
    /// Sum of the selected amounts in sela.
    pub total: u64,
    /// Amount returned to the spender; 0 when the target was hit exactly.
    pub change: u64,
}

/// Ascending-amount coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// UTXOs spendable at `watermark`, sorted by amount then outpoint.
    pub fn spendable(utxos: &[Utxo], watermark: u32) -> Vec<Utxo> {
        let mut spendable: Vec<Utxo> = utxos.iter().filter(|u| !u.is_locked(watermark)).copied().collect();
        spendable.sort_by(|a, b| a.amount.cmp(&b.amount).then(a.outpoint.cmp(&b.outpoint)));
        spendable
    }

    /// Select UTXOs covering `target` sela.
    ///
    /// Locked UTXOs (lock height above `watermark`) are never chosen.
    pub fn select(utxos: &[Utxo], target: u64, watermark: u32) -> Result<CoinSelection, WalletError> {
        if target == 0 {
            return Err(WalletError::InvalidParameter("target must be non-zero".into()));
        }

        let pool = Self::spendable(utxos, watermark);
        let have = pool.iter().fold(0u64, |acc, u| acc.saturating_add(u.amount));
        if let Some(exact) = pool.iter().find(|u| u.amount == target) {
            return Ok(CoinSelection {
                selected: vec![*exact],
                total: target,
                change: 0,
            });
        }

        let mut remaining = target;
        let mut selected = Vec::new();
        let mut change = 0;

        for utxo in &pool {
            selected.push(*utxo);
            if utxo.amount < remaining {
                remaining -= utxo.amount;
            } else {
                change = utxo.amount - remaining;
                remaining = 0;
                break;
            }
        }

        if remaining > 0 {
            return Err(WalletError::InsufficientFunds { have, need: target });
        }

        let total = selected.iter().map(|u| u.amount).sum();
        Ok(CoinSelection { selected, total, change })
    }
}
