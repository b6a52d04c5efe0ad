//! Tests for ECDSA keys and signatures

use tally_crypto::ecdsa::{PrivateKey, PublicKey, Signature};
use tally_crypto::CryptoError;

#[test]
fn test_private_key_generation() {
    let key1 = PrivateKey::random();
    let key2 = PrivateKey::random();
    assert_ne!(key1.to_bytes(), key2.to_bytes());
}

#[test]
fn test_private_key_from_hex() {
    let hex = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
    let key = PrivateKey::from_hex(hex).unwrap();
    assert_eq!(key.to_hex(), &hex[2..]);
}

#[test]
fn test_private_key_from_hex_wrong_length() {
    let err = PrivateKey::from_hex("0xdeadbeef").unwrap_err();
    assert!(matches!(
        err,
        CryptoError::InvalidLength {
            expected: 32,
            actual: 4
        }
    ));
}

#[test]
fn test_zero_private_key_rejected() {
    assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
}

#[test]
fn test_public_key_compressed_form() {
    let public = PrivateKey::random().public_key();
    let compressed = public.to_compressed();

    assert_eq!(compressed.len(), 33);
    assert!(compressed[0] == 0x02 || compressed[0] == 0x03);
    assert_eq!(PublicKey::from_sec1_bytes(&compressed).unwrap(), public);
    assert_eq!(PublicKey::from_hex(&public.to_hex()).unwrap(), public);
}

#[test]
fn test_public_key_ordering_follows_compressed_bytes() {
    let mut keys: Vec<PublicKey> = (0..8).map(|_| PrivateKey::random().public_key()).collect();
    keys.sort();
    for pair in keys.windows(2) {
        assert!(pair[0].to_compressed() <= pair[1].to_compressed());
    }
}

#[test]
fn test_invalid_public_key_rejected() {
    assert!(PublicKey::from_sec1_bytes(&[0x02; 10]).is_err());
}

#[test]
fn test_sign_and_verify() {
    let key = PrivateKey::random();
    let public = key.public_key();

    let signature = key.sign(b"block header").unwrap();
    assert!(signature.verify(b"block header", &public).unwrap());
    assert!(!signature.verify(b"other header", &public).unwrap());
}

#[test]
fn test_signature_bytes_round_trip() {
    let key = PrivateKey::random();
    let signature = key.sign(b"payload").unwrap();

    let bytes = signature.to_bytes();
    assert_eq!(bytes.len(), 65);
    assert_eq!(Signature::from_slice(&bytes).unwrap(), signature);
}

#[test]
fn test_signature_wrong_length_rejected() {
    assert!(matches!(
        Signature::from_slice(&[0u8; 64]),
        Err(CryptoError::InvalidLength {
            expected: 65,
            actual: 64
        })
    ));
}

#[test]
fn test_public_key_serde_hex() {
    let public = PrivateKey::random().public_key();
    let json = serde_json::to_string(&public).unwrap();
    assert_eq!(json, format!("\"{}\"", public.to_hex()));

    let decoded: PublicKey = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, public);
}
