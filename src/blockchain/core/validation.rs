use crate::blockchain::core::chain::Block;
use crate::crypto::CryptoProvider;
use crate::error::ChainError;
use tracing::{debug, warn};

/// Checks that the first `zerolength` bits of `hash` are zero.
///
/// Returns `Err(ChainError::Configuration)` when the digest is too short to
/// hold `zerolength` bits; that is a setup problem, not an invalid block.
pub fn check_first_zero_bits(hash: &[u8], zerolength: usize) -> Result<bool, ChainError> {
    if zerolength > hash.len() * 8 {
        warn!(
            "Difficulty of {} zero bits exceeds the {}-byte digest",
            zerolength,
            hash.len()
        );
        return Err(ChainError::Configuration(format!(
            "zero criteria {} exceeds digest size of {} bits",
            zerolength,
            hash.len() * 8
        )));
    }

    let full_zero_bytes = zerolength / 8;
    let remainder_bits = zerolength % 8;

    if hash[..full_zero_bytes].iter().any(|&b| b != 0) {
        return Ok(false);
    }
    if remainder_bits != 0 && u16::from(hash[full_zero_bytes]) >= 1u16 << (8 - remainder_bits) {
        return Ok(false);
    }
    Ok(true)
}

impl Block {
    /// Structural, signature and proof-of-work validation.
    ///
    /// `Ok(false)` is an ordinary invalid block; `Err` is reserved for a
    /// difficulty the digest cannot satisfy and for encoding failures.
    pub fn check_valid(&self, crypto: &dyn CryptoProvider, zerolength: u8) -> Result<bool, ChainError> {
        let entries = match (&self.previous_hash, &self.entries, &self.suffix) {
            (Some(_), Some(entries), Some(_)) => entries,
            _ => {
                debug!("Block {} is missing required fields", self.block_number);
                return Ok(false);
            }
        };

        for (i, entry) in entries.iter().enumerate() {
            if entry.block_number != self.block_number {
                debug!(
                    "Entry {} of block {} claims height {}",
                    i, self.block_number, entry.block_number
                );
                return Ok(false);
            }
            if !entry.verify_signature(crypto) {
                debug!("Entry {} of block {} has a bad signature", i, self.block_number);
                return Ok(false);
            }
        }

        let hash = self.compute_hash(crypto)?;
        check_first_zero_bits(hash, usize::from(zerolength))
    }
}
