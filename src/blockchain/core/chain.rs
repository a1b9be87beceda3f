use crate::crypto::CryptoProvider;
use crate::entry::Entry;
use crate::error::ChainError;
use crate::token::TokenRegistry;
use once_cell::sync::OnceCell;

/// Digest produced by the configured [`CryptoProvider`].
pub type BlockHash = Vec<u8>;

/// Maximum encoded block size in bytes (1 MiB) accepted from the network.
pub const MAX_BLOCK_SIZE: usize = 1 << 20;

/// A batch of entries linked to its parent by hash, sealed by a proof-of-work suffix.
///
/// `previous_hash`, `entries` and `suffix` are optional on the wire so that a
/// malformed block can be decoded and then rejected by [`Block::check_valid`].
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub block_number: u64,
    #[serde(with = "serde_bytes")]
    pub previous_hash: Option<BlockHash>,
    pub entries: Option<Vec<Entry>>,
    #[serde(with = "serde_bytes")]
    pub suffix: Option<Vec<u8>>,
    #[serde(skip)]
    cached_hash: OnceCell<BlockHash>,
}

impl Block {
    pub fn new(block_number: u64, previous_hash: BlockHash, entries: Vec<Entry>, suffix: Vec<u8>) -> Self {
        Block {
            block_number,
            previous_hash: Some(previous_hash),
            entries: Some(entries),
            suffix: Some(suffix),
            cached_hash: OnceCell::new(),
        }
    }

    /// Replaces the proof-of-work suffix and drops the memoized hash.
    pub fn set_suffix(&mut self, suffix: Vec<u8>) {
        self.suffix = Some(suffix);
        self.cached_hash = OnceCell::new();
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ChainError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChainError> {
        if bytes.len() > MAX_BLOCK_SIZE {
            return Err(ChainError::InvalidBlock(format!(
                "Block too large: {} bytes (max: {})",
                bytes.len(),
                MAX_BLOCK_SIZE
            )));
        }
        Ok(bincode::deserialize(bytes)?)
    }

    /// Memoized digest of the canonical encoding, suffix included.
    pub fn compute_hash(&self, crypto: &dyn CryptoProvider) -> Result<&[u8], ChainError> {
        self.cached_hash
            .get_or_try_init(|| -> Result<BlockHash, ChainError> {
                Ok(crypto.hash(&self.to_bytes()?))
            })
            .map(Vec::as_slice)
    }

    /// The memoized hash, if [`Block::compute_hash`] has already run.
    pub fn cached_hash(&self) -> Option<&[u8]> {
        self.cached_hash.get().map(Vec::as_slice)
    }

    pub fn entries(&self) -> &[Entry] {
        self.entries.as_deref().unwrap_or(&[])
    }

    /// True when `hash` is this block's `previous_hash`.
    pub fn extends(&self, hash: &[u8]) -> bool {
        self.previous_hash.as_deref() == Some(hash)
    }

    /// Replaces every entry's token with the registry's interned instance.
    pub fn intern_tokens(&mut self, registry: &mut TokenRegistry) {
        if let Some(entries) = self.entries.as_mut() {
            for entry in entries.iter_mut() {
                entry.token = registry.canonicalize(&entry.token);
            }
        }
    }

    /// Content equality on the encoded fields; the hash cache is ignored.
    pub fn same_content(&self, other: &Block) -> bool {
        self.block_number == other.block_number
            && self.previous_hash == other.previous_hash
            && self.entries == other.entries
            && self.suffix == other.suffix
    }
}
