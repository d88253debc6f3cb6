//! Redeem scripts and the program hashes derived from them.
//!
//! ```text
//! standard:  PUSH(33) ‖ pubkey ‖ CHECKSIG
//! multisig:  PUSH(M) ‖ (PUSH(33) ‖ pubkey){N} ‖ PUSH(N) ‖ CHECKMULTISIG
//! ```
//!
//! Multisig keys are sorted by X then Y coordinate, so the same key set
//! and threshold always produce the same script and program hash.

use crate::constants::{
    COMPRESSED_PUBKEY_LEN, MAX_MULTISIG_KEYS, MIN_MULTISIG_KEYS, MIN_MULTISIG_SCRIPT_LEN,
    OP_CHECKMULTISIG, OP_CHECKSIG, OP_PUSH1, PUSH_PUBKEY, STANDARD_SCRIPT_LEN,
};
use crate::crypto::{hash160, PublicKey};
use crate::error::ScriptError;
use crate::types::{ProgramHash, SignType};

/// Opcode pushing the small integer `n` (1..=16).
fn push_small_int(n: usize) -> u8 {
    OP_PUSH1 - 1 + n as u8
}

fn read_small_int(op: u8) -> Option<usize> {
    (OP_PUSH1..OP_PUSH1 + 16)
        .contains(&op)
        .then(|| (op - OP_PUSH1 + 1) as usize)
}

/// Single-key redeem script.
pub fn standard_redeem_script(public_key: &PublicKey) -> Vec<u8> {
    let mut script = Vec::with_capacity(STANDARD_SCRIPT_LEN);
    script.push(PUSH_PUBKEY);
    script.extend_from_slice(&public_key.to_compressed());
    script.push(OP_CHECKSIG);
    script
}

/// Default threshold for `n` keys: a strict majority.
pub fn default_threshold(n: usize) -> usize {
    n / 2 + 1
}

/// M-of-N redeem script. `m` defaults to [`default_threshold`].
pub fn multisig_redeem_script(public_keys: &[PublicKey], m: Option<usize>) -> Result<Vec<u8>, ScriptError> {
    let n = public_keys.len();
    if n < MIN_MULTISIG_KEYS {
        return Err(ScriptError::InvalidParameter(format!(
            "multisig needs at least {MIN_MULTISIG_KEYS} keys, got {n}"
        )));
    }
    if n > MAX_MULTISIG_KEYS {
        return Err(ScriptError::InvalidParameter(format!(
            "multisig supports at most {MAX_MULTISIG_KEYS} keys, got {n}"
        )));
    }
    let m = m.unwrap_or_else(|| default_threshold(n));
    if m < default_threshold(n) || m > n {
        return Err(ScriptError::InvalidParameter(format!(
            "threshold {m} outside [{}, {n}]",
            default_threshold(n)
        )));
    }

    let mut keys = public_keys.to_vec();
    keys.sort();
    if keys.windows(2).any(|w| w[0] == w[1]) {
        return Err(ScriptError::InvalidParameter("duplicate public key".into()));
    }

    let mut script = Vec::with_capacity(3 + n * (COMPRESSED_PUBKEY_LEN + 1));
    script.push(push_small_int(m));
    for key in &keys {
        script.push(PUSH_PUBKEY);
        script.extend_from_slice(&key.to_compressed());
    }
    script.push(push_small_int(n));
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

/// A decoded multisig redeem script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiSigScript {
    pub m: usize,
    /// Keys in script order (canonically sorted for scripts built here).
    pub public_keys: Vec<PublicKey>,
}

impl MultiSigScript {
    pub fn n(&self) -> usize {
        self.public_keys.len()
    }
}

/// Decode `M`, `N` and the key list of a multisig redeem script.
pub fn parse_multisig_script(code: &[u8]) -> Result<MultiSigScript, ScriptError> {
    if code.len() < MIN_MULTISIG_SCRIPT_LEN {
        return Err(ScriptError::Malformed(format!("multisig script too short: {} bytes", code.len())));
    }
    if code[code.len() - 1] != OP_CHECKMULTISIG {
        return Err(ScriptError::Malformed("missing CHECKMULTISIG".into()));
    }
    let m = read_small_int(code[0]).ok_or_else(|| ScriptError::Malformed("bad M opcode".into()))?;
    let n = read_small_int(code[code.len() - 2])
        .ok_or_else(|| ScriptError::Malformed("bad N opcode".into()))?;

    let body = &code[1..code.len() - 2];
    let chunk = COMPRESSED_PUBKEY_LEN + 1;
    if body.len() != n * chunk {
        return Err(ScriptError::Malformed(format!(
            "expected {n} keys, body is {} bytes",
            body.len()
        )));
    }
    let public_keys = body
        .chunks_exact(chunk)
        .map(|c| {
            if c[0] != PUSH_PUBKEY {
                return Err(ScriptError::Malformed("bad key push".into()));
            }
            Ok(PublicKey::from_bytes(&c[1..])?)
        })
        .collect::<Result<Vec<_>, _>>()?;
    if m == 0 || m > n {
        return Err(ScriptError::Malformed(format!("threshold {m} of {n}")));
    }
    Ok(MultiSigScript { m, public_keys })
}

/// Extract the key of a standard redeem script.
pub fn parse_standard_script(code: &[u8]) -> Result<PublicKey, ScriptError> {
    if code.len() != STANDARD_SCRIPT_LEN || code[0] != PUSH_PUBKEY || code[code.len() - 1] != OP_CHECKSIG {
        return Err(ScriptError::Malformed("not a standard script".into()));
    }
    Ok(PublicKey::from_bytes(&code[1..1 + COMPRESSED_PUBKEY_LEN])?)
}

/// Classify a redeem script by its final opcode.
pub fn script_type(code: &[u8]) -> Result<SignType, ScriptError> {
    match code.last() {
        Some(&OP_CHECKSIG) => Ok(SignType::Standard),
        Some(&OP_CHECKMULTISIG) => Ok(SignType::MultiSig),
        _ => Err(ScriptError::UnknownScriptType),
    }
}

/// `RIPEMD160(SHA256(script))` prefixed with the sign-type tag.
pub fn program_hash(script: &[u8], sign_type: SignType) -> ProgramHash {
    ProgramHash::new(sign_type, hash160(script))
}

/// Program hash of a redeem script, with its sign type inferred.
pub fn program_hash_of(code: &[u8]) -> Result<ProgramHash, ScriptError> {
    Ok(program_hash(code, script_type(code)?))
}

/// Program hash of the standard script for `public_key`.
pub fn standard_program_hash(public_key: &PublicKey) -> ProgramHash {
    program_hash(&standard_redeem_script(public_key), SignType::Standard)
}
