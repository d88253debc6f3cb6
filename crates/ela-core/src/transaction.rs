//! ELA transactions and their consensus wire format.
//!
//! # Wire format
//! ```text
//! type (u8) ‖ payload_version (u8) ‖ payload ‖ attributes ‖ inputs ‖ outputs ‖ lock_time (u32 LE)
//!   ‖ programs          <- full serialization only
//! ```
//!
//! Everything before the program list is the *unsigned* serialization. It is
//! the only hashing domain: `txid = SHA256(SHA256(unsigned))`. Signatures
//! live in the programs, so signing never changes the txid.

use std::fmt;
use std::sync::OnceLock;

use crate::codec::{
    write_list, write_u32, write_u64, write_var_bytes, write_var_string, write_var_uint, Decodable,
    Encodable, Reader,
};
use crate::constants::{SYSTEM_ASSET_NAME, SYSTEM_ASSET_PRECISION, UINT168_LEN, UINT256_LEN};
use crate::error::SerializationError;
use crate::types::{Hash256, OutPoint, ProgramHash};

/// Transaction type tag, the first byte on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    CoinBase = 0x00,
    RegisterAsset = 0x01,
    TransferAsset = 0x02,
    Record = 0x03,
    TransferCrossChainAsset = 0x08,
}

impl TryFrom<u8> for TxType {
    type Error = SerializationError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x00 => Ok(Self::CoinBase),
            0x01 => Ok(Self::RegisterAsset),
            0x02 => Ok(Self::TransferAsset),
            0x03 => Ok(Self::Record),
            0x08 => Ok(Self::TransferCrossChainAsset),
            other => Err(SerializationError::UnknownTxType(other)),
        }
    }
}

/// Asset definition carried by a RegisterAsset payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Asset {
    pub name: String,
    pub description: String,
    pub precision: u8,
    pub asset_type: u8,
    pub record_type: u8,
}

/// One entry of a cross-chain transfer: where on the side chain the
/// value of output `output_index` is credited, net of its fee share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossChainEntry {
    pub address: String,
    pub output_index: u64,
    pub amount: u64,
}

/// Type-specific payload. The variant determines the transaction type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    CoinBase { data: Vec<u8> },
    RegisterAsset { asset: Asset, amount: u64, controller: ProgramHash },
    TransferAsset,
    Record { record_type: String, data: Vec<u8> },
    TransferCrossChainAsset { entries: Vec<CrossChainEntry> },
}

impl Payload {
    pub fn tx_type(&self) -> TxType {
        match self {
            Self::CoinBase { .. } => TxType::CoinBase,
            Self::RegisterAsset { .. } => TxType::RegisterAsset,
            Self::TransferAsset => TxType::TransferAsset,
            Self::Record { .. } => TxType::Record,
            Self::TransferCrossChainAsset { .. } => TxType::TransferCrossChainAsset,
        }
    }

    fn decode_for(tx_type: TxType, r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(match tx_type {
            TxType::CoinBase => Self::CoinBase { data: r.read_var_bytes()? },
            TxType::RegisterAsset => {
                let asset = Asset {
                    name: r.read_var_string()?,
                    description: r.read_var_string()?,
                    precision: r.read_u8()?,
                    asset_type: r.read_u8()?,
                    record_type: r.read_u8()?,
                };
                let amount = read_fixed64(r)?;
                let controller = ProgramHash::decode(r)?;
                Self::RegisterAsset { asset, amount, controller }
            }
            TxType::TransferAsset => Self::TransferAsset,
            TxType::Record => Self::Record {
                record_type: r.read_var_string()?,
                data: r.read_var_bytes()?,
            },
            TxType::TransferCrossChainAsset => {
                // address (>=1) + index (>=1) + amount (8)
                let count = r.read_length(10)?;
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    entries.push(CrossChainEntry {
                        address: r.read_var_string()?,
                        output_index: r.read_var_uint()?,
                        amount: read_fixed64(r)?,
                    });
                }
                Self::TransferCrossChainAsset { entries }
            }
        })
    }
}

impl Encodable for Payload {
    fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            Self::CoinBase { data } => write_var_bytes(buf, data),
            Self::RegisterAsset { asset, amount, controller } => {
                write_var_string(buf, &asset.name);
                write_var_string(buf, &asset.description);
                buf.push(asset.precision);
                buf.push(asset.asset_type);
                buf.push(asset.record_type);
                write_u64(buf, *amount);
                controller.encode(buf);
            }
            Self::TransferAsset => {}
            Self::Record { record_type, data } => {
                write_var_string(buf, record_type);
                write_var_bytes(buf, data);
            }
            Self::TransferCrossChainAsset { entries } => {
                write_var_uint(buf, entries.len() as u64);
                for entry in entries {
                    write_var_string(buf, &entry.address);
                    write_var_uint(buf, entry.output_index);
                    write_u64(buf, entry.amount);
                }
            }
        }
    }
}

/// Amounts are signed 64-bit on the wire; negative values never occur in
/// valid transactions.
fn read_fixed64(r: &mut Reader<'_>) -> Result<u64, SerializationError> {
    let v = r.read_u64()?;
    if v > i64::MAX as u64 {
        return Err(SerializationError::InvalidAmount(format!("negative fixed-point value {}", v as i64)));
    }
    Ok(v)
}

/// Attribute usage byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeUsage {
    Nonce = 0x00,
    Script = 0x20,
    DescriptionUrl = 0x81,
    Description = 0x90,
    Memo = 0x91,
}

impl TryFrom<u8> for AttributeUsage {
    type Error = SerializationError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0x00 => Ok(Self::Nonce),
            0x20 => Ok(Self::Script),
            0x81 => Ok(Self::DescriptionUrl),
            0x90 => Ok(Self::Description),
            0x91 => Ok(Self::Memo),
            other => Err(SerializationError::UnknownAttributeUsage(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub usage: AttributeUsage,
    pub data: Vec<u8>,
}

impl Attribute {
    pub fn new(usage: AttributeUsage, data: Vec<u8>) -> Self {
        Self { usage, data }
    }

    /// A nonce attribute holding `nonce` as decimal ASCII.
    pub fn nonce(nonce: u64) -> Self {
        Self::new(AttributeUsage::Nonce, nonce.to_string().into_bytes())
    }
}

impl Encodable for Attribute {
    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.usage as u8);
        write_var_bytes(buf, &self.data);
    }
}

impl Decodable for Attribute {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let usage = AttributeUsage::try_from(r.read_u8()?)?;
        Ok(Self { usage, data: r.read_var_bytes()? })
    }
}

/// A transaction input spending a previous output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Input {
    pub previous: OutPoint,
    pub sequence: u32,
}

impl Encodable for Input {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.previous.encode(buf);
        write_u32(buf, self.sequence);
    }
}

impl Decodable for Input {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            previous: OutPoint::decode(r)?,
            sequence: r.read_u32()?,
        })
    }
}

/// A transaction output, creating a new UTXO.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Output {
    pub asset_id: Hash256,
    /// Value in sela.
    pub value: u64,
    /// Height before which the output cannot be spent; 0 for none.
    pub output_lock: u32,
    pub program_hash: ProgramHash,
}

impl Encodable for Output {
    fn encode(&self, buf: &mut Vec<u8>) {
        self.asset_id.encode(buf);
        write_u64(buf, self.value);
        write_u32(buf, self.output_lock);
        self.program_hash.encode(buf);
    }
}

impl Decodable for Output {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            asset_id: Hash256::decode(r)?,
            value: read_fixed64(r)?,
            output_lock: r.read_u32()?,
            program_hash: ProgramHash::decode(r)?,
        })
    }
}

/// Redeem script plus the signatures that satisfy it.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Program {
    pub code: Vec<u8>,
    pub parameter: Vec<u8>,
}

impl Encodable for Program {
    fn encode(&self, buf: &mut Vec<u8>) {
        write_var_bytes(buf, &self.parameter);
        write_var_bytes(buf, &self.code);
    }
}

impl Decodable for Program {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let parameter = r.read_var_bytes()?;
        let code = r.read_var_bytes()?;
        Ok(Self { code, parameter })
    }
}

const INPUT_LEN: usize = UINT256_LEN + 2 + 4;
const OUTPUT_LEN: usize = UINT256_LEN + 8 + 4 + UINT168_LEN;

/// A transaction.
///
/// Fields that feed the txid are private and reachable through accessors;
/// the `*_mut` accessors drop the memoized hash. Programs are outside the
/// hashing domain and can be edited freely.
#[derive(Clone, Debug)]
pub struct Transaction {
    payload_version: u8,
    payload: Payload,
    attributes: Vec<Attribute>,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    lock_time: u32,
    /// Signing programs, one per distinct redeem script.
    pub programs: Vec<Program>,
    hash: OnceLock<Hash256>,
}

impl Transaction {
    pub fn new(
        payload: Payload,
        attributes: Vec<Attribute>,
        inputs: Vec<Input>,
        outputs: Vec<Output>,
        lock_time: u32,
    ) -> Self {
        Self {
            payload_version: 0,
            payload,
            attributes,
            inputs,
            outputs,
            lock_time,
            programs: Vec::new(),
            hash: OnceLock::new(),
        }
    }

    pub fn tx_type(&self) -> TxType {
        self.payload.tx_type()
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_type() == TxType::CoinBase
    }

    pub fn payload_version(&self) -> u8 {
        self.payload_version
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn set_payload_version(&mut self, version: u8) {
        self.hash.take();
        self.payload_version = version;
    }

    pub fn set_lock_time(&mut self, lock_time: u32) {
        self.hash.take();
        self.lock_time = lock_time;
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        self.hash.take();
        &mut self.payload
    }

    pub fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
        self.hash.take();
        &mut self.attributes
    }

    pub fn inputs_mut(&mut self) -> &mut Vec<Input> {
        self.hash.take();
        &mut self.inputs
    }

    pub fn outputs_mut(&mut self) -> &mut Vec<Output> {
        self.hash.take();
        &mut self.outputs
    }

    /// Encode everything except the programs.
    pub fn serialize_unsigned(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            64 + self.inputs.len() * INPUT_LEN + self.outputs.len() * OUTPUT_LEN,
        );
        self.encode_unsigned(&mut buf);
        buf
    }

    fn encode_unsigned(&self, buf: &mut Vec<u8>) {
        buf.push(self.tx_type() as u8);
        buf.push(self.payload_version);
        self.payload.encode(buf);
        write_list(buf, &self.attributes);
        write_list(buf, &self.inputs);
        write_list(buf, &self.outputs);
        write_u32(buf, self.lock_time);
    }

    /// Full wire encoding, programs included.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = self.serialize_unsigned();
        write_list(&mut buf, &self.programs);
        buf
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Decode a fully serialized transaction. Trailing bytes are an error.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut r = Reader::new(bytes);
        let mut tx = Self::decode_unsigned(&mut r)?;
        tx.programs = r.read_list(2)?;
        r.finish()?;
        Ok(tx)
    }

    /// Decode an unsigned serialization. Trailing bytes are an error.
    pub fn deserialize_unsigned(bytes: &[u8]) -> Result<Self, SerializationError> {
        let mut r = Reader::new(bytes);
        let tx = Self::decode_unsigned(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    pub fn from_hex(s: &str) -> Result<Self, SerializationError> {
        let bytes = hex::decode(s).map_err(|e| SerializationError::InvalidHex(e.to_string()))?;
        Self::deserialize(&bytes)
    }

    fn decode_unsigned(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let tx_type = TxType::try_from(r.read_u8()?)?;
        let payload_version = r.read_u8()?;
        let payload = Payload::decode_for(tx_type, r)?;
        let attributes = r.read_list(2)?;
        let inputs = r.read_list(INPUT_LEN)?;
        let outputs = r.read_list(OUTPUT_LEN)?;
        let lock_time = r.read_u32()?;
        let mut tx = Self::new(payload, attributes, inputs, outputs, lock_time);
        tx.payload_version = payload_version;
        Ok(tx)
    }

    /// Double SHA-256 of the unsigned serialization, computed once.
    pub fn hash(&self) -> Hash256 {
        *self.hash.get_or_init(|| Hash256::digest(&self.serialize_unsigned()))
    }

    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.value))
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.payload_version == other.payload_version
            && self.payload == other.payload
            && self.attributes == other.attributes
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.lock_time == other.lock_time
            && self.programs == other.programs
    }
}

impl Eq for Transaction {}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} ({} in, {} out)",
            self.tx_type(),
            self.hash(),
            self.inputs.len(),
            self.outputs.len()
        )
    }
}

/// The id of the native ELA asset: the hash of its registration transaction.
pub fn system_asset_id() -> Hash256 {
    static ID: OnceLock<Hash256> = OnceLock::new();
    *ID.get_or_init(|| {
        let payload = Payload::RegisterAsset {
            asset: Asset {
                name: SYSTEM_ASSET_NAME.to_string(),
                description: String::new(),
                precision: SYSTEM_ASSET_PRECISION,
                asset_type: 0,
                record_type: 0,
            },
            amount: 0,
            controller: ProgramHash::ZERO,
        };
        Transaction::new(payload, Vec::new(), Vec::new(), Vec::new(), 0).hash()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::double_sha256;

    fn sample_tx() -> Transaction {
        let mut tx = Transaction::new(
            Payload::TransferAsset,
            vec![Attribute::nonce(42)],
            vec![Input {
                previous: OutPoint::new(Hash256([3u8; 32]), 1),
                sequence: 0,
            }],
            vec![Output {
                asset_id: system_asset_id(),
                value: 50_000_000,
                output_lock: 0,
                program_hash: ProgramHash([0x21; 21]),
            }],
            0,
        );
        tx.programs.push(Program {
            code: vec![0x21; 35],
            parameter: vec![],
        });
        tx
    }

    #[test]
    fn unsigned_layout() {
        let tx = sample_tx();
        let bytes = tx.serialize_unsigned();
        assert_eq!(bytes[0], 0x02);
        assert_eq!(bytes[1], 0x00);
        // attributes: count, usage, len, "42"
        assert_eq!(&bytes[2..7], &[0x01, 0x00, 0x02, b'4', b'2']);
        let expected = 2 + 5 + 1 + 38 + 1 + 65 + 4;
        assert_eq!(bytes.len(), expected);
    }

    #[test]
    fn hash_is_double_sha256_of_unsigned() {
        let tx = sample_tx();
        assert_eq!(tx.hash().0, double_sha256(&tx.serialize_unsigned()));
    }

    #[test]
    fn programs_do_not_change_hash() {
        let mut tx = sample_tx();
        let before = tx.hash();
        tx.programs[0].parameter = vec![0x40; 65];
        assert_eq!(tx.hash(), before);
    }

    #[test]
    fn mutation_invalidates_hash() {
        let mut tx = sample_tx();
        let before = tx.hash();
        tx.outputs_mut()[0].value -= 1;
        assert_ne!(tx.hash(), before);
        assert_eq!(tx.hash().0, double_sha256(&tx.serialize_unsigned()));
    }

    #[test]
    fn full_round_trip() {
        let tx = sample_tx();
        let decoded = Transaction::deserialize(&tx.serialize()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.serialize_unsigned(), tx.serialize_unsigned());
        assert_eq!(Transaction::from_hex(&tx.to_hex()).unwrap(), tx);
    }

    #[test]
    fn every_payload_round_trips() {
        let payloads = vec![
            Payload::CoinBase { data: b"height 7".to_vec() },
            Payload::RegisterAsset {
                asset: Asset {
                    name: "TOKEN".into(),
                    description: "test".into(),
                    precision: 4,
                    asset_type: 1,
                    record_type: 0,
                },
                amount: 1_000,
                controller: ProgramHash([9u8; 21]),
            },
            Payload::Record {
                record_type: "note".into(),
                data: vec![1, 2, 3],
            },
            Payload::TransferCrossChainAsset {
                entries: vec![CrossChainEntry {
                    address: "EXYZ".into(),
                    output_index: 0,
                    amount: 99_990_000,
                }],
            },
        ];
        for payload in payloads {
            let tx = Transaction::new(payload.clone(), vec![], vec![], vec![], 5);
            let decoded = Transaction::deserialize_unsigned(&tx.serialize_unsigned()).unwrap();
            assert_eq!(decoded.payload(), &payload);
            assert_eq!(decoded.lock_time(), 5);
        }
    }

    #[test]
    fn unknown_type_rejected() {
        let mut bytes = sample_tx().serialize();
        bytes[0] = 0x04;
        assert_eq!(
            Transaction::deserialize(&bytes),
            Err(SerializationError::UnknownTxType(0x04))
        );
    }

    #[test]
    fn unknown_attribute_rejected() {
        let mut bytes = sample_tx().serialize_unsigned();
        bytes[3] = 0x55;
        assert_eq!(
            Transaction::deserialize_unsigned(&bytes),
            Err(SerializationError::UnknownAttributeUsage(0x55))
        );
    }

    #[test]
    fn truncation_and_trailing_rejected() {
        let bytes = sample_tx().serialize();
        for cut in [1, 10, bytes.len() - 1] {
            assert!(Transaction::deserialize(&bytes[..cut]).is_err());
        }
        let mut extra = bytes.clone();
        extra.push(0);
        assert_eq!(
            Transaction::deserialize(&extra),
            Err(SerializationError::TrailingBytes(1))
        );
    }

    #[test]
    fn system_asset_id_is_stable() {
        assert_eq!(system_asset_id(), system_asset_id());
        assert!(!system_asset_id().is_zero());
    }
}
