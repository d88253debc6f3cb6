//! Attaching signatures to built transactions.
//!
//! A program parameter is a run of 65-byte pushes (`0x40 ‖ r ‖ s`). For a
//! multisig program the pushes are kept in the order of the keys in the
//! redeem script, whichever order the cosigners sign in.

use ela_core::constants::{PUSH_SIGNATURE, SIGNATURE_SCRIPT_LEN};
use ela_core::script::{parse_multisig_script, program_hash_of, script_type, standard_program_hash};
use ela_core::{SignType, Transaction};
use tracing::info;

use crate::error::WalletError;
use crate::keystore::KeyStore;

/// Signatures present versus required on a transaction's program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureStatus {
    pub have: usize,
    pub need: usize,
}

impl SignatureStatus {
    pub fn is_complete(&self) -> bool {
        self.need == 0
    }
}

fn first_program_code(tx: &Transaction) -> Result<&[u8], WalletError> {
    tx.programs
        .first()
        .map(|p| p.code.as_slice())
        .ok_or_else(|| WalletError::InvalidParameter("transaction has no program".into()))
}

/// Count signatures on the first program against its threshold.
pub fn signature_status(tx: &Transaction) -> Result<SignatureStatus, WalletError> {
    let code = first_program_code(tx)?;
    let required = match script_type(code)? {
        SignType::MultiSig => parse_multisig_script(code)?.m,
        _ => 1,
    };
    let have = tx.programs[0].parameter.len() / SIGNATURE_SCRIPT_LEN;
    Ok(SignatureStatus {
        have,
        need: required.saturating_sub(have),
    })
}

/// Signs transactions with the key held by a [`KeyStore`].
pub struct Signer<'a> {
    keystore: &'a KeyStore,
}

impl<'a> Signer<'a> {
    pub fn new(keystore: &'a KeyStore) -> Self {
        Self { keystore }
    }

    /// Add this keystore's signature to the first program of `tx`.
    ///
    /// `tx` is only modified once the new parameter is complete.
    pub fn sign(&self, password: &[u8], tx: &mut Transaction) -> Result<SignatureStatus, WalletError> {
        let code = first_program_code(tx)?;
        let parameter = &tx.programs[0].parameter;
        let data = tx.serialize_unsigned();

        let updated = match script_type(code)? {
            SignType::MultiSig => self.sign_multisig(password, code, parameter, &data)?,
            _ => self.sign_standard(password, code, parameter, &data)?,
        };

        tx.programs[0].parameter = updated;
        let status = signature_status(tx)?;
        info!(
            txid = %tx.hash(),
            have = status.have,
            need = status.need,
            "signed transaction"
        );
        Ok(status)
    }

    fn sign_standard(
        &self,
        password: &[u8],
        code: &[u8],
        parameter: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        if program_hash_of(code)? != self.keystore.program_hash() {
            return Err(WalletError::InvalidSigner(format!(
                "program is not spendable by {}",
                self.keystore.address()
            )));
        }
        if !parameter.is_empty() {
            return Err(WalletError::FullySigned);
        }
        let signature = self.keystore.sign(password, data)?;
        Ok(signature_push(&signature))
    }

    fn sign_multisig(
        &self,
        password: &[u8],
        code: &[u8],
        parameter: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, WalletError> {
        let script = parse_multisig_script(code)?;
        let own = self.keystore.program_hash();
        let signer_index = script
            .public_keys
            .iter()
            .position(|k| standard_program_hash(k) == own)
            .ok_or_else(|| {
                WalletError::InvalidSigner(format!("{} is not a key of this multisig", self.keystore.address()))
            })?;

        if parameter.len() % SIGNATURE_SCRIPT_LEN != 0 {
            return Err(WalletError::CorruptState(format!(
                "parameter length {} is not a multiple of {SIGNATURE_SCRIPT_LEN}",
                parameter.len()
            )));
        }

        // Attribute each existing signature to the key that produced it.
        let mut signed: Vec<(usize, &[u8])> = Vec::new();
        for push in parameter.chunks_exact(SIGNATURE_SCRIPT_LEN) {
            if push[0] != PUSH_SIGNATURE {
                return Err(WalletError::CorruptState("bad signature push".into()));
            }
            let index = script
                .public_keys
                .iter()
                .position(|k| k.verify(data, &push[1..]).is_ok())
                .ok_or_else(|| WalletError::CorruptState("signature matches no key".into()))?;
            if signed.iter().any(|(i, _)| *i == index) {
                return Err(WalletError::CorruptState("duplicate signature".into()));
            }
            signed.push((index, &push[1..]));
        }

        if signed.iter().any(|(i, _)| *i == signer_index) {
            return Err(WalletError::AlreadySigned);
        }
        if signed.len() >= script.m {
            return Err(WalletError::FullySigned);
        }

        let signature = self.keystore.sign(password, data)?;
        signed.push((signer_index, &signature[..]));
        signed.sort_by_key(|(i, _)| *i);

        let mut updated = Vec::with_capacity(signed.len() * SIGNATURE_SCRIPT_LEN);
        for (_, sig) in signed {
            updated.extend_from_slice(&signature_push(sig));
        }
        Ok(updated)
    }
}

fn signature_push(signature: &[u8]) -> Vec<u8> {
    let mut push = Vec::with_capacity(SIGNATURE_SCRIPT_LEN);
    push.push(PUSH_SIGNATURE);
    push.extend_from_slice(signature);
    push
}
