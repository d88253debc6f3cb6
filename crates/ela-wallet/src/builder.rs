//! Unsigned transaction assembly.
//!
//! 1. Add recipients (program hash + amount, optionally cross-chain)
//! 2. Build: select coins from the spender's UTXOs, add change, attach the
//!    spender's redeem script as an empty program
//! 3. Hand the result to [`Signer`](crate::signer::Signer)

use ela_core::constants::LOCKED_INPUT_SEQUENCE;
use ela_core::transaction::CrossChainEntry;
use ela_core::{system_asset_id, Attribute, Input, Output, Payload, Program, ProgramHash, Transaction};
use tracing::info;

use crate::coin_selection::{CoinSelection, CoinSelector};
use crate::error::WalletError;
use crate::store::UtxoStore;

/// Default fee in sela.
pub const DEFAULT_FEE: u64 = 10_000;

/// A transaction recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    /// Destination program hash.
    pub program_hash: ProgramHash,
    /// Amount in sela.
    pub amount: u64,
    /// Side-chain address credited by a cross-chain transfer.
    pub cross_chain_address: Option<String>,
}

/// An unsigned transaction ready for signing.
#[derive(Debug)]
pub struct UnsignedTransaction {
    /// The transaction with an empty program parameter.
    pub tx: Transaction,
    /// The coin selection used to fund it.
    pub selection: CoinSelection,
}

/// Builder for spending from one tracked address.
///
/// # Example
/// ```ignore
/// let unsigned = TransactionBuilder::new(spender)
///     .add_recipient(dest, 5 * COIN)
///     .set_fee(10_000)
///     .build(&store)?;
/// ```
pub struct TransactionBuilder {
    spender: ProgramHash,
    recipients: Vec<Recipient>,
    fee: u64,
    output_lock: u32,
    lock_time: u32,
    nonce: Option<u64>,
}

impl TransactionBuilder {
    pub fn new(spender: ProgramHash) -> Self {
        Self {
            spender,
            recipients: Vec::new(),
            fee: DEFAULT_FEE,
            output_lock: 0,
            lock_time: 0,
            nonce: None,
        }
    }

    pub fn add_recipient(&mut self, program_hash: ProgramHash, amount: u64) -> &mut Self {
        self.recipients.push(Recipient { program_hash, amount, cross_chain_address: None });
        self
    }

    /// Add a recipient by address string.
    pub fn add_address(&mut self, address: &str, amount: u64) -> Result<&mut Self, WalletError> {
        let program_hash = ProgramHash::from_address(address)?;
        Ok(self.add_recipient(program_hash, amount))
    }

    /// Pay `amount` to the cross-chain program hash, crediting
    /// `cross_chain_address` on the side chain.
    pub fn add_cross_chain_recipient(
        &mut self,
        program_hash: ProgramHash,
        cross_chain_address: impl Into<String>,
        amount: u64,
    ) -> &mut Self {
        self.recipients.push(Recipient {
            program_hash,
            amount,
            cross_chain_address: Some(cross_chain_address.into()),
        });
        self
    }

    /// Override the fee (default: [`DEFAULT_FEE`]).
    pub fn set_fee(&mut self, fee: u64) -> &mut Self {
        self.fee = fee;
        self
    }

    /// Lock every recipient output until `height`. Change stays unlocked.
    pub fn set_output_lock(&mut self, height: u32) -> &mut Self {
        self.output_lock = height;
        self
    }

    pub fn set_lock_time(&mut self, lock_time: u32) -> &mut Self {
        self.lock_time = lock_time;
        self
    }

    /// Fix the nonce attribute instead of drawing a random one.
    pub fn set_nonce(&mut self, nonce: u64) -> &mut Self {
        self.nonce = Some(nonce);
        self
    }

    /// Select coins from `store` and assemble the unsigned transaction.
    ///
    /// Nothing in the store is modified.
    pub fn build(&self, store: &dyn UtxoStore) -> Result<UnsignedTransaction, WalletError> {
        if self.recipients.is_empty() {
            return Err(WalletError::InvalidParameter("no recipients".into()));
        }
        let cross_chain = self.recipients.iter().filter(|r| r.cross_chain_address.is_some()).count();
        if cross_chain != 0 && cross_chain != self.recipients.len() {
            return Err(WalletError::InvalidParameter(
                "cannot mix cross-chain and plain recipients".into(),
            ));
        }

        let mut required: u64 = self.fee;
        for r in &self.recipients {
            if r.amount == 0 {
                return Err(WalletError::InvalidParameter("recipient amount is zero".into()));
            }
            required = required
                .checked_add(r.amount)
                .ok_or_else(|| WalletError::InvalidParameter("total amount overflow".into()))?;
        }

        let payload = if cross_chain == 0 {
            Payload::TransferAsset
        } else {
            self.cross_chain_payload()?
        };

        let spender = store
            .address(&self.spender)?
            .ok_or_else(|| WalletError::UnknownAddress(self.spender.to_address()))?;
        let utxos = store.utxos(&self.spender)?;
        let watermark = store.watermark()?;
        let selection = CoinSelector::select(&utxos, required, watermark)?;

        let inputs = selection
            .selected
            .iter()
            .map(|u| Input {
                previous: u.outpoint,
                sequence: if u.lock_height > 0 { LOCKED_INPUT_SEQUENCE } else { 0 },
            })
            .collect();

        let asset_id = system_asset_id();
        let mut outputs: Vec<Output> = self
            .recipients
            .iter()
            .map(|r| Output {
                asset_id,
                value: r.amount,
                output_lock: self.output_lock,
                program_hash: r.program_hash,
            })
            .collect();
        if selection.change > 0 {
            outputs.push(Output {
                asset_id,
                value: selection.change,
                output_lock: 0,
                program_hash: self.spender,
            });
        }

        let nonce = self.nonce.unwrap_or_else(random_nonce);
        let mut tx = Transaction::new(payload, vec![Attribute::nonce(nonce)], inputs, outputs, self.lock_time);
        tx.programs.push(Program {
            code: spender.redeem_script,
            parameter: Vec::new(),
        });

        info!(
            txid = %tx.hash(),
            inputs = tx.inputs().len(),
            outputs = tx.outputs().len(),
            fee = self.fee,
            change = selection.change,
            "built transaction"
        );
        Ok(UnsignedTransaction { tx, selection })
    }

    /// Each cross-chain entry carries its output amount minus an equal share
    /// of the fee.
    fn cross_chain_payload(&self) -> Result<Payload, WalletError> {
        let per_output_fee = self.fee / self.recipients.len() as u64;
        let entries = self
            .recipients
            .iter()
            .enumerate()
            .map(|(index, r)| {
                let amount = r.amount.checked_sub(per_output_fee).ok_or_else(|| {
                    WalletError::InvalidParameter(format!(
                        "cross-chain amount {} below fee share {per_output_fee}",
                        r.amount
                    ))
                })?;
                Ok(CrossChainEntry {
                    address: r.cross_chain_address.clone().unwrap_or_default(),
                    output_index: index as u64,
                    amount,
                })
            })
            .collect::<Result<Vec<_>, WalletError>>()?;
        Ok(Payload::TransferCrossChainAsset { entries })
    }
}

/// Random 63-bit nonce so otherwise identical transactions hash differently.
fn random_nonce() -> u64 {
    use rand::RngCore;
    rand::rngs::OsRng.next_u64() >> 1
}
