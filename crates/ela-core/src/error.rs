//! Error types for the ELA wire protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("unexpected end of input: need {needed} bytes, {remaining} remaining")] UnexpectedEof { needed: usize, remaining: usize },
    #[error("unknown transaction type: {0:#04x}")] UnknownTxType(u8),
    #[error("unknown attribute usage: {0:#04x}")] UnknownAttributeUsage(u8),
    #[error("non-canonical varint encoding")] NonCanonicalVarInt,
    #[error("length {len} exceeds remaining {remaining} bytes")] LengthOverflow { len: u64, remaining: usize },
    #[error("invalid utf-8 string")] InvalidUtf8,
    #[error("{0} trailing bytes after transaction")] TrailingBytes(usize),
    #[error("invalid hex: {0}")] InvalidHex(String),
    #[error("invalid length: expected {expected}, got {got}")] InvalidLength { expected: usize, got: usize },
    #[error("invalid amount: {0}")] InvalidAmount(String),
    #[error("invalid format: {0}")] InvalidFormat(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("invalid parameter: {0}")] InvalidParameter(String),
    #[error("malformed script: {0}")] Malformed(String),
    #[error("unknown script type")] UnknownScriptType,
    #[error(transparent)] Crypto(#[from] CryptoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid private key bytes")] InvalidPrivateKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding")] InvalidEncoding,
    #[error("invalid length: {0}")] InvalidLength(usize),
    #[error("invalid checksum")] InvalidChecksum,
    #[error("unknown program hash prefix: {0:#04x}")] UnknownPrefix(u8),
    #[error("invalid genesis block hash")] InvalidGenesisHash,
}
