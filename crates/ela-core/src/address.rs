//! Base58check addresses.
//!
//! `address = base58(program_hash ‖ SHA256(SHA256(program_hash))[..4])`.
//! The prefix byte of the program hash determines the leading character
//! (`E` for standard, `8` for multisig, `X` for cross-chain). Side chains
//! receive deposits at an address derived from their genesis block hash.

use crate::constants::{CROSS_CHAIN_TAG, DESTROY_ADDRESS, UINT168_LEN, UINT256_LEN};
use crate::crypto::double_sha256;
use crate::error::AddressError;
use crate::script::program_hash;
use crate::types::{ProgramHash, SignType};

const CHECKSUM_LEN: usize = 4;

impl ProgramHash {
    /// Render as a base58check address string.
    pub fn to_address(&self) -> String {
        let mut data = Vec::with_capacity(UINT168_LEN + CHECKSUM_LEN);
        data.extend_from_slice(&self.0);
        data.extend_from_slice(&double_sha256(&self.0)[..CHECKSUM_LEN]);
        bs58::encode(data).into_string()
    }

    /// Parse an address string, verifying length, checksum and prefix.
    pub fn from_address(address: &str) -> Result<Self, AddressError> {
        if address == DESTROY_ADDRESS {
            return Ok(Self::ZERO);
        }
        let data = bs58::decode(address)
            .into_vec()
            .map_err(|_| AddressError::InvalidEncoding)?;
        if data.len() != UINT168_LEN + CHECKSUM_LEN {
            return Err(AddressError::InvalidLength(data.len()));
        }
        let (hash, checksum) = data.split_at(UINT168_LEN);
        if double_sha256(hash)[..CHECKSUM_LEN] != *checksum {
            return Err(AddressError::InvalidChecksum);
        }
        if SignType::from_prefix(hash[0]).is_none() {
            return Err(AddressError::UnknownPrefix(hash[0]));
        }
        let mut out = [0u8; UINT168_LEN];
        out.copy_from_slice(hash);
        Ok(Self(out))
    }

    /// Deposit program hash of a side chain: the cross-chain hash of
    /// `len ‖ genesis_hash ‖ CROSS_CHAIN_TAG`.
    ///
    /// The hash bytes are taken in the order they are written, not reversed.
    pub fn from_genesis_hash(genesis_hash: &[u8; UINT256_LEN]) -> Self {
        let mut code = Vec::with_capacity(UINT256_LEN + 2);
        code.push(UINT256_LEN as u8);
        code.extend_from_slice(genesis_hash);
        code.push(CROSS_CHAIN_TAG);
        program_hash(&code, SignType::CrossChain)
    }
}

/// Side-chain deposit address for a hex genesis block hash.
pub fn genesis_address(genesis_hash_hex: &str) -> Result<String, AddressError> {
    let bytes = hex::decode(genesis_hash_hex).map_err(|_| AddressError::InvalidGenesisHash)?;
    let genesis_hash: [u8; UINT256_LEN] = bytes.try_into().map_err(|_| AddressError::InvalidGenesisHash)?;
    Ok(ProgramHash::from_genesis_hash(&genesis_hash).to_address())
}
