//! Protocol constants. Values are consensus-critical; changing them breaks
//! compatibility with the ELA main chain.

/// Smallest units per coin (fixed-point with 8 decimal places).
pub const COIN: u64 = 100_000_000;

/// Decimal places of the fixed-point amount type.
pub const AMOUNT_DECIMALS: u32 = 8;

/// Blocks a coinbase output stays locked after the block that created it.
pub const COINBASE_MATURITY: u32 = 100;

/// Sequence value for inputs spending a UTXO that carried a lock height.
pub const LOCKED_INPUT_SEQUENCE: u32 = u32::MAX - 1;

// Script opcodes.
pub const OP_PUSH1: u8 = 0x51;
pub const OP_CHECKSIG: u8 = 0xAC;
pub const OP_CHECKMULTISIG: u8 = 0xAE;

/// Trailing tag of a side-chain genesis script.
pub const CROSS_CHAIN_TAG: u8 = 0xAF;

/// Push-data opcode for a 33-byte compressed public key.
pub const PUSH_PUBKEY: u8 = 0x21;
/// Push-data opcode for a 64-byte signature.
pub const PUSH_SIGNATURE: u8 = 0x40;

// Program hash prefixes.
pub const PREFIX_STANDARD: u8 = 0x21;
pub const PREFIX_MULTISIG: u8 = 0x12;
pub const PREFIX_CROSS_CHAIN: u8 = 0x4B;

pub const COMPRESSED_PUBKEY_LEN: usize = 33;
pub const UNCOMPRESSED_PUBKEY_LEN: usize = 65;
pub const PRIVATE_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;

/// One pushed signature inside a program parameter: push opcode + signature.
pub const SIGNATURE_SCRIPT_LEN: usize = SIGNATURE_LEN + 1;
/// `PUSH(33) ++ pubkey ++ CHECKSIG`.
pub const STANDARD_SCRIPT_LEN: usize = COMPRESSED_PUBKEY_LEN + 2;

pub const MIN_MULTISIG_KEYS: usize = 3;
/// Largest key count expressible with a small-integer push opcode.
pub const MAX_MULTISIG_KEYS: usize = 16;
/// Smallest well-formed multisig script: `PUSH(M) ++ 3 * (PUSH(33) ++ key) ++ PUSH(N) ++ CHECKMULTISIG`.
pub const MIN_MULTISIG_SCRIPT_LEN: usize = 3 + MIN_MULTISIG_KEYS * (COMPRESSED_PUBKEY_LEN + 1);

pub const UINT256_LEN: usize = 32;
pub const UINT168_LEN: usize = 21;

/// Native asset registration parameters.
pub const SYSTEM_ASSET_NAME: &str = "ELA";
pub const SYSTEM_ASSET_PRECISION: u8 = 8;

/// The literal address that maps to the all-zero program hash.
pub const DESTROY_ADDRESS: &str = "0000000000000000000000000000000000";

/// Default JSON-RPC endpoint of a local node.
pub const DEFAULT_RPC_HOST: &str = "localhost:20336";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_lengths() {
        assert_eq!(STANDARD_SCRIPT_LEN, 35);
        assert_eq!(SIGNATURE_SCRIPT_LEN, 65);
        assert_eq!(MIN_MULTISIG_SCRIPT_LEN, 105);
    }
}
