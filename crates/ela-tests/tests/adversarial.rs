//! Adversarial property-based test suite for the ELA wallet.
//!
//! These tests throw randomized and hostile input at the decoders, the
//! keystore crypto and coin selection. Each property test uses 256 cases
//! with proptest shrinking to produce minimal failing examples.
//!
//! Attack vectors tested:
//! - Arbitrary and truncated bytes fed to the transaction decoder
//! - Hash stability of the unsigned encoding
//! - Malformed addresses and amount strings
//! - Key wrapping with random keys, IVs and unaligned buffers
//! - Coin selection accounting and lock enforcement
//! - Multisig script derivation under key reordering
//! - Signing racing a password change on the same keystore

use ela_core::amount::{format_amount, parse_amount};
use ela_core::crypto::double_sha256;
use ela_core::script::{multisig_redeem_script, parse_multisig_script};
use ela_core::{
    system_asset_id, Attribute, Hash256, Input, OutPoint, Output, Payload, ProgramHash, SignType, Transaction,
};
use ela_tests::helpers::{public_key, PASSWORD};
use ela_wallet::encryption::{decrypt, encrypt};
use ela_wallet::{CoinSelector, KeyStore, Utxo, WalletError};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_input() -> impl Strategy<Value = Input> {
    (any::<[u8; 32]>(), any::<u16>(), any::<u32>()).prop_map(|(txid, index, sequence)| Input {
        previous: OutPoint::new(Hash256(txid), index),
        sequence,
    })
}

fn arb_output() -> impl Strategy<Value = Output> {
    (0u64..=i64::MAX as u64, any::<u32>(), any::<[u8; 20]>()).prop_map(|(value, output_lock, code_hash)| Output {
        asset_id: system_asset_id(),
        value,
        output_lock,
        program_hash: ProgramHash::new(SignType::Standard, code_hash),
    })
}

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    (
        prop::collection::vec(arb_input(), 0..4),
        prop::collection::vec(arb_output(), 0..4),
        any::<u32>(),
        any::<u64>(),
    )
        .prop_map(|(inputs, outputs, lock_time, nonce)| {
            Transaction::new(Payload::TransferAsset, vec![Attribute::nonce(nonce)], inputs, outputs, lock_time)
        })
}

fn arb_utxos() -> impl Strategy<Value = Vec<Utxo>> {
    prop::collection::vec((1u64..1_000_000, 0u32..300), 0..12).prop_map(|entries| {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, (amount, lock_height))| Utxo {
                outpoint: OutPoint::new(Hash256([i as u8; 32]), i as u16),
                amount,
                lock_height,
            })
            .collect()
    })
}

// ---------------------------------------------------------------------------
// Decoder hardening
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fuzz_transaction_decode(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = Transaction::deserialize(&bytes);
        let _ = Transaction::deserialize_unsigned(&bytes);
    }

    #[test]
    fn fuzz_decode_with_valid_header(
        tx_type in prop::sample::select(vec![0x00u8, 0x01, 0x02, 0x03, 0x08]),
        tail in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut bytes = vec![tx_type, 0];
        bytes.extend_from_slice(&tail);
        let _ = Transaction::deserialize(&bytes);
    }

    #[test]
    fn truncated_transaction_rejected(tx in arb_transaction(), cut in any::<prop::sample::Index>()) {
        let bytes = tx.serialize();
        let len = cut.index(bytes.len());
        prop_assert!(Transaction::deserialize(&bytes[..len]).is_err());
    }

    #[test]
    fn trailing_garbage_rejected(tx in arb_transaction(), extra in prop::collection::vec(any::<u8>(), 1..16)) {
        let mut bytes = tx.serialize();
        bytes.extend_from_slice(&extra);
        prop_assert!(Transaction::deserialize(&bytes).is_err());
    }

    #[test]
    fn unsigned_encoding_is_the_hash_domain(tx in arb_transaction()) {
        let unsigned = tx.serialize_unsigned();
        let decoded = Transaction::deserialize_unsigned(&unsigned).unwrap();
        prop_assert_eq!(decoded.serialize_unsigned(), unsigned.clone());
        prop_assert_eq!(decoded.hash(), tx.hash());
        prop_assert_eq!(tx.hash(), Hash256(double_sha256(&unsigned)));
    }
}

// ---------------------------------------------------------------------------
// Text inputs
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn fuzz_address_decode(s in "\\PC{0,40}") {
        let _ = ProgramHash::from_address(&s);
    }

    #[test]
    fn address_tamper_detected(code_hash in any::<[u8; 20]>(), pos in 0usize..34, c in "[1-9A-HJ-NP-Za-km-z]") {
        let ph = ProgramHash::new(SignType::Standard, code_hash);
        let address = ph.to_address();
        prop_assert_eq!(ProgramHash::from_address(&address).unwrap(), ph);

        let mut chars: Vec<char> = address.chars().collect();
        let pos = pos % chars.len();
        let replacement = c.chars().next().unwrap();
        prop_assume!(chars[pos] != replacement);
        chars[pos] = replacement;
        let tampered: String = chars.into_iter().collect();
        prop_assert!(ProgramHash::from_address(&tampered).map_or(true, |p| p != ph));
    }

    #[test]
    fn fuzz_amount_parse(s in "\\PC{0,24}") {
        let _ = parse_amount(&s);
    }

    #[test]
    fn amount_format_parses_back(value in 0u64..=i64::MAX as u64) {
        prop_assert_eq!(parse_amount(&format_amount(value)).unwrap(), value);
    }
}

// ---------------------------------------------------------------------------
// Key wrapping
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn cbc_round_trip(
        key in any::<[u8; 32]>(),
        iv in any::<[u8; 16]>(),
        blocks in 1usize..8,
        seed in any::<u8>(),
    ) {
        let plaintext: Vec<u8> = (0..blocks * 16).map(|i| (i as u8).wrapping_mul(seed)).collect();
        let ciphertext = encrypt(&plaintext, &key, &iv).unwrap();
        prop_assert_eq!(ciphertext.len(), plaintext.len());
        let recovered = decrypt(&ciphertext, &key, &iv).unwrap();
        prop_assert_eq!(recovered.as_slice(), &plaintext[..]);
    }

    #[test]
    fn unaligned_buffers_rejected(len in 1usize..200, key in any::<[u8; 32]>(), iv in any::<[u8; 16]>()) {
        prop_assume!(len % 16 != 0);
        let data = vec![0x5A; len];
        prop_assert!(matches!(encrypt(&data, &key, &iv), Err(WalletError::Encryption(_))));
        prop_assert!(matches!(decrypt(&data, &key, &iv), Err(WalletError::Encryption(_))));
    }
}

// ---------------------------------------------------------------------------
// Coin selection
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn selection_accounting(utxos in arb_utxos(), target in 1u64..3_000_000, watermark in 0u32..300) {
        let spendable: u64 = utxos.iter().filter(|u| !u.is_locked(watermark)).map(|u| u.amount).sum();
        match CoinSelector::select(&utxos, target, watermark) {
            Ok(sel) => {
                prop_assert!(sel.selected.iter().all(|u| !u.is_locked(watermark)));
                prop_assert_eq!(sel.total, sel.selected.iter().map(|u| u.amount).sum::<u64>());
                prop_assert_eq!(sel.total - sel.change, target);
                let mut seen: Vec<_> = sel.selected.iter().map(|u| u.outpoint).collect();
                seen.sort();
                seen.dedup();
                prop_assert_eq!(seen.len(), sel.selected.len());
            }
            Err(WalletError::InsufficientFunds { have, need }) => {
                prop_assert_eq!(have, spendable);
                prop_assert_eq!(need, target);
                prop_assert!(spendable < target);
            }
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Multisig derivation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn multisig_script_ignores_key_order(
        seeds in Just((1u8..=5).collect::<Vec<_>>()).prop_shuffle(),
        m in 3usize..=5,
    ) {
        let sorted: Vec<_> = (1u8..=5).map(public_key).collect();
        let shuffled: Vec<_> = seeds.iter().copied().map(public_key).collect();

        let script = multisig_redeem_script(&shuffled, Some(m)).unwrap();
        prop_assert_eq!(&script, &multisig_redeem_script(&sorted, Some(m)).unwrap());

        let parsed = parse_multisig_script(&script).unwrap();
        prop_assert_eq!(parsed.m, m);
        prop_assert_eq!(parsed.n(), 5);
    }
}

// ---------------------------------------------------------------------------
// Keystore concurrency
// ---------------------------------------------------------------------------

#[test]
fn sign_races_change_password() {
    const NEW_PASSWORD: &[u8] = b"battery staple";
    const MESSAGE: &[u8] = b"race payload";

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keystore.dat");
    let keystore = KeyStore::create_at(&path, PASSWORD).unwrap();

    let (signed, rejected) = std::thread::scope(|s| {
        let signer = s.spawn(|| {
            let (mut signed, mut rejected) = (0, 0);
            for i in 0..200 {
                let password = if i % 2 == 0 { PASSWORD } else { NEW_PASSWORD };
                match keystore.sign(password, MESSAGE) {
                    Ok(signature) => {
                        keystore.public_key().verify(MESSAGE, &signature).unwrap();
                        signed += 1;
                    }
                    Err(WalletError::Authentication) => rejected += 1,
                    Err(e) => panic!("sign during password change: {e}"),
                }
            }
            (signed, rejected)
        });
        s.spawn(|| keystore.change_password(PASSWORD, NEW_PASSWORD).unwrap());
        signer.join().unwrap()
    });

    assert_eq!(signed + rejected, 200);
    assert!(signed >= 100, "one password is valid at every point");
    assert_eq!(keystore.sign(PASSWORD, MESSAGE), Err(WalletError::Authentication));
    assert!(keystore.sign(NEW_PASSWORD, MESSAGE).is_ok());

    let reopened = KeyStore::open(&path, NEW_PASSWORD).unwrap();
    assert_eq!(reopened.address(), keystore.address());
    assert!(matches!(KeyStore::open(&path, PASSWORD), Err(WalletError::Authentication)));
}
