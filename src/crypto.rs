//! Cryptographic primitives: SHA-256 hashing and P-256 ECDSA signatures
//!
//! The ledger only ever *verifies* signatures. [`KeyPair`] is the signer-side
//! half, kept here so tests and the demo binary can play the external signer.
//!
//! Wire forms match Go's `crypto/ecdsa` signers: a signature is `r || s` and a
//! public key is `X || Y`, each half written as a minimal big-endian integer.
//! Both are split at `len / 2`, so halves shorter than 32 bytes are accepted.

use crate::error::ChainError;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Byte width of a P-256 field element or scalar.
pub const SCALAR_SIZE: usize = 32;

/// Fixed-width `r || s` as produced by [`KeyPair::sign`].
pub const SIGNATURE_SIZE: usize = 2 * SCALAR_SIZE;

/// Fixed-width `X || Y` as produced by [`KeyPair::public_key_bytes`].
pub const PUBLIC_KEY_SIZE: usize = 2 * SCALAR_SIZE;

// SEC1 tag for an uncompressed point.
const SEC1_UNCOMPRESSED: u8 = 0x04;

/// SHA-256 of `data`, rendered as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Returns true if `s` looks like a hex-encoded SHA-256 digest.
pub fn is_hash_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Address derived from a public key: hex SHA-256 of its `X || Y` bytes.
pub fn address_from_public_key(public_key_bytes: &[u8]) -> String {
    sha256_hex(public_key_bytes)
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        KeyPair {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key_bytes())
    }

    /// Uncompressed public key without the SEC1 tag, `X || Y`.
    pub fn public_key_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes.copy_from_slice(&point.as_bytes()[1..]);
        bytes
    }

    /// Signs SHA-256(`message`) and returns `r || s`, each left-padded to 32 bytes.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; SIGNATURE_SIZE], ChainError> {
        let digest = Sha256::digest(message);
        let signature: Signature = self
            .signing_key
            .sign_prehash(&digest)
            .map_err(|e| ChainError::Auth(format!("Failed to sign message: {}", e)))?;

        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes.copy_from_slice(&signature.to_bytes());
        Ok(bytes)
    }
}

/// Splits `bytes` at `len / 2` and left-pads both halves to 32 bytes.
fn split_scalar_pair(bytes: &[u8], what: &str) -> Result<[u8; 2 * SCALAR_SIZE], ChainError> {
    if bytes.len() < 2 {
        return Err(ChainError::Auth(format!(
            "{} must hold two integers, got {} bytes",
            what,
            bytes.len()
        )));
    }
    let (first, second) = bytes.split_at(bytes.len() / 2);

    let mut padded = [0u8; 2 * SCALAR_SIZE];
    for (half, slot) in [first, second].into_iter().zip(padded.chunks_mut(SCALAR_SIZE)) {
        let start = half.iter().position(|&b| b != 0).unwrap_or(half.len());
        let digits = &half[start..];
        if digits.len() > SCALAR_SIZE {
            return Err(ChainError::Auth(format!(
                "{} half is {} bytes, at most {} allowed",
                what,
                digits.len(),
                SCALAR_SIZE
            )));
        }
        slot[SCALAR_SIZE - digits.len()..].copy_from_slice(digits);
    }
    Ok(padded)
}

/// Verifies an ECDSA P-256 signature `r || s` over SHA-256(`message`) under
/// the public key `X || Y`.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), ChainError> {
    let coordinates = split_scalar_pair(public_key_bytes, "Public key")?;
    let mut sec1 = [0u8; 1 + PUBLIC_KEY_SIZE];
    sec1[0] = SEC1_UNCOMPRESSED;
    sec1[1..].copy_from_slice(&coordinates);
    let verifying_key = VerifyingKey::from_sec1_bytes(&sec1)
        .map_err(|_| ChainError::Auth("Invalid public key: not a P-256 point".to_string()))?;

    let scalars = split_scalar_pair(signature_bytes, "Signature")?;
    let signature = Signature::from_slice(&scalars)
        .map_err(|e| ChainError::Auth(format!("Invalid signature encoding: {}", e)))?;

    verifying_key
        .verify_prehash(&Sha256::digest(message), &signature)
        .map_err(|_| ChainError::Auth("invalid transaction signature".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 6979 A.2.5, P-256 with SHA-256, message "sample".
    const RFC6979_PUBLIC_KEY: &str = concat!(
        "60fed4ba255a9d31c961eb74c6356d68c049b8923b61fa6ce669622e60f29fb6",
        "7903fe1008b8bc99a41ae9e95628bc64f2f1b20c2d7e9f5177a3c294d4462299"
    );
    const RFC6979_SIGNATURE: &str = concat!(
        "efd48b2aacb6a8fd1140dd9cd45e81d69d2c877b56aaf991c34d0ea84eaf3716",
        "f7cb1c942d657c41d436c7a1b6e29f65f3e900dbb9aff4064dc4ab2f843acda8"
    );

    #[test]
    fn test_sha256_hex_empty_input() {
        assert_eq!(
            sha256_hex(&[]),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_is_hash_hex() {
        assert!(is_hash_hex(&sha256_hex(b"abc")));
        assert!(!is_hash_hex("abc"));
        assert!(!is_hash_hex(&sha256_hex(b"abc").to_uppercase()));
    }

    #[test]
    fn test_known_p256_vector_verifies() {
        let public_key = hex::decode(RFC6979_PUBLIC_KEY).unwrap();
        let signature = hex::decode(RFC6979_SIGNATURE).unwrap();

        assert!(verify_signature(&public_key, b"sample", &signature).is_ok());
        assert_eq!(
            verify_signature(&public_key, b"test", &signature)
                .unwrap_err()
                .to_string(),
            "Authentication error: invalid transaction signature"
        );

        let mut flipped = signature.clone();
        flipped[63] ^= 0x01;
        assert!(verify_signature(&public_key, b"sample", &flipped).is_err());
    }

    #[test]
    fn test_known_p256_vector_address() {
        let public_key = hex::decode(RFC6979_PUBLIC_KEY).unwrap();
        assert_eq!(
            address_from_public_key(&public_key),
            "d6c23e2744a840cb3a5a14b6554cce7c070057c4e3298cb93577de687eece659"
        );
    }

    #[test]
    fn test_minimal_length_halves_are_accepted() {
        // r is 31 bytes long, so the signer emits 63 bytes and splits at 31.
        let public_key = hex::decode(RFC6979_PUBLIC_KEY).unwrap();
        let message = hex::decode("8ba17be5342a3701").unwrap();
        let signature = hex::decode(concat!(
            "e3745e4df019db46884d1e553ef806752df378b54610b9393d99ea9fa18091",
            "a2bd1c65ece7cfd37a4a5e1c792a5f0628efa7f1fbb5e76613c91b6a539eebb5"
        ))
        .unwrap();
        assert_eq!(signature.len(), 63);
        assert!(verify_signature(&public_key, &message, &signature).is_ok());

        let mut padded = vec![0u8];
        padded.extend_from_slice(&signature);
        assert!(verify_signature(&public_key, &message, &padded).is_ok());
    }

    #[test]
    fn test_signing_and_verification() {
        let keypair = KeyPair::generate();
        let message = b"canonical bytes";

        let signature = keypair.sign(message).unwrap();
        let pubkey_bytes = keypair.public_key_bytes();

        assert!(verify_signature(&pubkey_bytes, message, &signature).is_ok());
        assert_eq!(signature.len(), SIGNATURE_SIZE);
        assert!(is_hash_hex(&keypair.address()));
    }

    #[test]
    fn test_wrong_key_fails() {
        let keypair1 = KeyPair::generate();
        let keypair2 = KeyPair::generate();

        let message = b"Test message";
        let signature = keypair1.sign(message).unwrap();

        let result = verify_signature(&keypair2.public_key_bytes(), message, &signature);
        assert_eq!(
            result.unwrap_err().to_string(),
            "Authentication error: invalid transaction signature"
        );
    }

    #[test]
    fn test_tampered_message() {
        let keypair = KeyPair::generate();
        let signature = keypair.sign(b"Original message").unwrap();

        let result = verify_signature(
            &keypair.public_key_bytes(),
            b"Tampered message",
            &signature,
        );
        assert!(matches!(result, Err(ChainError::Auth(_))));
    }

    #[test]
    fn test_malformed_key_or_signature() {
        let keypair = KeyPair::generate();
        let message = b"Test";
        let signature = keypair.sign(message).unwrap();
        let pubkey_bytes = keypair.public_key_bytes();

        let result = verify_signature(&[0x04], message, &signature);
        assert!(result.unwrap_err().to_string().contains("must hold two integers"));

        let mut off_curve = pubkey_bytes;
        off_curve[63] ^= 0x01;
        let result = verify_signature(&off_curve, message, &signature);
        assert!(result.unwrap_err().to_string().contains("not a P-256 point"));

        let oversized = [0xffu8; 2 * SCALAR_SIZE + 2];
        let result = verify_signature(&pubkey_bytes, message, &oversized);
        assert!(result.unwrap_err().to_string().contains("at most 32 allowed"));

        let result = verify_signature(&pubkey_bytes, message, &[0u8; SIGNATURE_SIZE]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid signature encoding"));
    }
}
