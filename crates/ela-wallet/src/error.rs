//! Wallet error types.

use ela_core::error::{AddressError, CryptoError, ScriptError, SerializationError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Wrong password for the keystore.
    #[error("invalid password")]
    Authentication,

    /// Keystore or store contents are inconsistent or undecodable.
    #[error("corrupt state: {0}")]
    CorruptState(String),

    /// A keystore file already exists at the target path.
    #[error("keystore already exists: {0}")]
    KeystoreExists(String),

    /// Bad address string or program hash.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Spendable UTXOs do not cover outputs plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Spendable balance in sela.
        have: u64,
        /// Outputs plus fee in sela.
        need: u64,
    },

    /// The keystore key is not among the keys of the program being signed.
    #[error("invalid signer: {0}")]
    InvalidSigner(String),

    /// This key has already signed the transaction.
    #[error("already signed by this key")]
    AlreadySigned,

    /// The transaction already carries all required signatures.
    #[error("transaction is already fully signed")]
    FullySigned,

    /// Caller-supplied value out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Address is not tracked by the store.
    #[error("unknown address: {0}")]
    UnknownAddress(String),

    /// Address is already tracked by the store.
    #[error("address already exists: {0}")]
    AddressExists(String),

    /// Wire or RPC payload could not be decoded.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Transport failure talking to the node.
    #[error("network: {0}")]
    Network(String),

    /// The node answered with an error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node.
        message: String,
    },

    /// Script construction or decoding failure.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Cryptographic error from ela-core.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Encryption or decryption failure.
    #[error("encryption: {0}")]
    Encryption(String),

    /// UTXO store failure.
    #[error("store: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be loaded.
    #[error("config: {0}")]
    Config(String),
}

impl From<AddressError> for WalletError {
    fn from(e: AddressError) -> Self {
        Self::InvalidAddress(e.to_string())
    }
}

impl From<std::io::Error> for WalletError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl WalletError {
    /// Map a script error, surfacing bad caller input as `InvalidParameter`.
    pub(crate) fn from_script(e: ScriptError) -> Self {
        match e {
            ScriptError::InvalidParameter(msg) => Self::InvalidParameter(msg),
            other => Self::Script(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_insufficient_funds() {
        let e = WalletError::InsufficientFunds { have: 100, need: 200 };
        assert_eq!(e.to_string(), "insufficient funds: have 100, need 200");
    }

    #[test]
    fn display_authentication() {
        assert_eq!(WalletError::Authentication.to_string(), "invalid password");
    }

    #[test]
    fn from_address_error() {
        let e: WalletError = AddressError::InvalidChecksum.into();
        assert_eq!(e, WalletError::InvalidAddress("invalid checksum".into()));
    }

    #[test]
    fn from_serialization_error() {
        let e: WalletError = SerializationError::UnknownTxType(7).into();
        assert_eq!(e, WalletError::Serialization(SerializationError::UnknownTxType(7)));
    }

    #[test]
    fn script_parameter_errors_become_invalid_parameter() {
        let e = WalletError::from_script(ScriptError::InvalidParameter("m".into()));
        assert_eq!(e, WalletError::InvalidParameter("m".into()));
        let e = WalletError::from_script(ScriptError::UnknownScriptType);
        assert_eq!(e, WalletError::Script(ScriptError::UnknownScriptType));
    }
}
