//! Cryptographic primitives for TokenChain
//!
//! The ledger only depends on the [`CryptoProvider`] contract: a digest
//! function plus sign/verify over arbitrary byte strings. The shipped
//! provider uses SHA-256 and compact secp256k1 ECDSA signatures.

use crate::error::ChainError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Hash, sign and verify primitives the ledger is parameterised over.
///
/// Digest length and signature scheme are provider-defined; the ledger only
/// inspects leading zero bits of whatever digest `hash` returns.
pub trait CryptoProvider: Send + Sync {
    fn hash(&self, data: &[u8]) -> Vec<u8>;

    fn sign(&self, secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>, ChainError>;

    /// Returns `false` for malformed keys or signatures as well as for
    /// signatures that simply do not match.
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool;

    fn derive_public_key(&self, secret_key: &[u8]) -> Result<Vec<u8>, ChainError>;
}

/// A ledger participant, identified by its encoded public key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(#[serde(with = "serde_bytes")] Vec<u8>);

impl Identity {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Identity(bytes.into())
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| ChainError::CryptoError(format!("Invalid hex identity: {}", e)))?;
        Ok(Identity(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.to_hex())
    }
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        let secret_key = parse_secret_key(bytes)?;
        Ok(Self::from_secret_key(secret_key))
    }

    /// The ledger identity owned by this key pair (compressed public key).
    pub fn identity(&self) -> Identity {
        Identity(self.public_key.serialize().to_vec())
    }

    pub fn secret_bytes(&self) -> [u8; SECRET_KEY_SIZE] {
        self.secret_key.secret_bytes()
    }
}

fn parse_secret_key(bytes: &[u8]) -> Result<SecretKey, ChainError> {
    SecretKey::from_slice(bytes).map_err(|e| {
        if bytes.len() != SECRET_KEY_SIZE {
            ChainError::CryptoError(format!(
                "Secret key must be {} bytes, got {}",
                SECRET_KEY_SIZE,
                bytes.len()
            ))
        } else {
            ChainError::CryptoError(format!("Invalid secret key bytes: {}", e))
        }
    })
}

fn message_digest(message: &[u8]) -> Result<Message, ChainError> {
    let digest = Sha256::digest(message);
    Message::from_digest_slice(&digest)
        .map_err(|e| ChainError::CryptoError(format!("Failed to create message: {}", e)))
}

/// SHA-256 digests with compact secp256k1 ECDSA signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Secp256k1Provider;

impl CryptoProvider for Secp256k1Provider {
    fn hash(&self, data: &[u8]) -> Vec<u8> {
        Sha256::digest(data).to_vec()
    }

    fn sign(&self, secret_key: &[u8], message: &[u8]) -> Result<Vec<u8>, ChainError> {
        let secret_key = parse_secret_key(secret_key)?;
        let message = message_digest(message)?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &secret_key);
        Ok(signature.serialize_compact().to_vec())
    }

    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
        verify_signature(public_key, message, signature).is_ok()
    }

    fn derive_public_key(&self, secret_key: &[u8]) -> Result<Vec<u8>, ChainError> {
        Ok(KeyPair::from_secret_bytes(secret_key)?.public_key.serialize().to_vec())
    }
}

/// Verifies an ECDSA signature given the raw public key bytes, message, and signature bytes.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), ChainError> {
    if public_key_bytes.len() != PUBLIC_KEY_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Public key must be exactly {} bytes (compressed), got {}",
            PUBLIC_KEY_SIZE,
            public_key_bytes.len()
        )));
    }
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(ChainError::CryptoError(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid public key: {}", e)))?;
    let message = message_digest(message)?;
    let signature = Signature::from_compact(signature_bytes)
        .map_err(|e| ChainError::CryptoError(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| ChainError::CryptoError("Signature verification failed".to_string()))
}
