/// Entry types for TokenChain
use crate::crypto::Identity;
use crate::error::ChainError;
use crate::token::Token;

/// Transfer of a single token from one identity to another, scoped to a block height.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Entry {
    pub source: Identity,
    pub destination: Identity,
    pub token: Token,
    #[serde(with = "serde_bytes")]
    pub signature: Option<Vec<u8>>,
    pub block_number: u64,
}

impl Entry {
    pub fn new(source: Identity, destination: Identity, token: Token, block_number: u64) -> Self {
        Entry {
            source,
            destination,
            token,
            signature: None,
            block_number,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Encoding with the signature field cleared; this is what gets signed.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, ChainError> {
        let unsigned = Entry {
            signature: None,
            ..self.clone()
        };
        unsigned.to_bytes()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}
