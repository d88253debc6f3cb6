//! Fixed-width hash types and outpoints.
//!
//! All monetary values are in sela (1 ELA = 10^8 sela).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::{Decodable, Encodable, Reader};
use crate::constants::{PREFIX_CROSS_CHAIN, PREFIX_MULTISIG, PREFIX_STANDARD, UINT168_LEN, UINT256_LEN};
use crate::crypto::double_sha256;
use crate::error::SerializationError;

/// A 32-byte hash value (`Uint256` on the wire).
///
/// Transaction ids and asset ids are double SHA-256 digests. Node RPC and
/// explorers show them byte-reversed, which is what [`fmt::Display`] and
/// [`Hash256::from_reversed_hex`] follow.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; UINT256_LEN]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; UINT256_LEN]);

    /// Double SHA-256 of `data`.
    pub fn digest(data: &[u8]) -> Self {
        Self(double_sha256(data))
    }

    pub fn as_bytes(&self) -> &[u8; UINT256_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; UINT256_LEN]
    }

    /// Parse the byte-reversed hex form used by node RPC.
    pub fn from_reversed_hex(s: &str) -> Result<Self, SerializationError> {
        let mut bytes = hex::decode(s).map_err(|e| SerializationError::InvalidHex(e.to_string()))?;
        if bytes.len() != UINT256_LEN {
            return Err(SerializationError::InvalidLength {
                expected: UINT256_LEN,
                got: bytes.len(),
            });
        }
        bytes.reverse();
        let mut out = [0u8; UINT256_LEN];
        out.copy_from_slice(&bytes);
        Ok(Self(out))
    }

    pub fn to_reversed_hex(&self) -> String {
        let mut bytes = self.0;
        bytes.reverse();
        hex::encode(bytes)
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_reversed_hex())
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.to_reversed_hex())
    }
}

impl From<[u8; UINT256_LEN]> for Hash256 {
    fn from(bytes: [u8; UINT256_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Encodable for Hash256 {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decodable for Hash256 {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self(reader.read_array()?))
    }
}

/// Kind of redeem script a program hash commits to; selects the prefix byte.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignType {
    Standard,
    MultiSig,
    CrossChain,
}

impl SignType {
    pub fn prefix(self) -> u8 {
        match self {
            Self::Standard => PREFIX_STANDARD,
            Self::MultiSig => PREFIX_MULTISIG,
            Self::CrossChain => PREFIX_CROSS_CHAIN,
        }
    }

    pub fn from_prefix(prefix: u8) -> Option<Self> {
        match prefix {
            PREFIX_STANDARD => Some(Self::Standard),
            PREFIX_MULTISIG => Some(Self::MultiSig),
            PREFIX_CROSS_CHAIN => Some(Self::CrossChain),
            _ => None,
        }
    }
}

/// A 21-byte program hash (`Uint168` on the wire): one prefix byte
/// followed by `RIPEMD160(SHA256(redeem_script))`.
///
/// This is the key under which outputs are locked and addresses tracked.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ProgramHash(pub [u8; UINT168_LEN]);

impl ProgramHash {
    pub const ZERO: Self = Self([0u8; UINT168_LEN]);

    pub fn new(sign_type: SignType, code_hash: [u8; 20]) -> Self {
        let mut out = [0u8; UINT168_LEN];
        out[0] = sign_type.prefix();
        out[1..].copy_from_slice(&code_hash);
        Self(out)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SerializationError> {
        if bytes.len() != UINT168_LEN {
            return Err(SerializationError::InvalidLength {
                expected: UINT168_LEN,
                got: bytes.len(),
            });
        }
        let mut out = [0u8; UINT168_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    pub fn as_bytes(&self) -> &[u8; UINT168_LEN] {
        &self.0
    }

    pub fn prefix(&self) -> u8 {
        self.0[0]
    }

    pub fn sign_type(&self) -> Option<SignType> {
        SignType::from_prefix(self.prefix())
    }

    /// The 20-byte script hash without the prefix.
    pub fn code_hash(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        out.copy_from_slice(&self.0[1..]);
        out
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; UINT168_LEN]
    }
}

impl fmt::Debug for ProgramHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProgramHash({})", hex::encode(self.0))
    }
}

impl Encodable for ProgramHash {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.0);
    }
}

impl Decodable for ProgramHash {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self(reader.read_array()?))
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: Hash256,
    pub index: u16,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u16) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

impl Encodable for OutPoint {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.txid.encode(buf);
        crate::codec::write_u16(buf, self.index);
    }
}

impl Decodable for OutPoint {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            txid: Hash256::decode(reader)?,
            index: reader.read_u16()?,
        })
    }
}
