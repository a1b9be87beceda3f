/// Signing and signature checks for entries
use crate::crypto::CryptoProvider;
use crate::entry::types::Entry;
use crate::error::ChainError;
use tracing::warn;

impl Entry {
    /// Signs the entry with `secret_key`, replacing any previous signature.
    ///
    /// Fails with [`ChainError::KeyMismatch`] when the key does not belong to
    /// the entry's source identity.
    pub fn sign(&mut self, crypto: &dyn CryptoProvider, secret_key: &[u8]) -> Result<(), ChainError> {
        let public_key = crypto.derive_public_key(secret_key)?;
        if public_key != self.source.as_bytes() {
            warn!("Refusing to sign entry for {}: key mismatch", self.source);
            return Err(ChainError::KeyMismatch);
        }

        self.signature = None;
        let message = self.signing_bytes()?;
        self.signature = Some(crypto.sign(secret_key, &message)?);
        Ok(())
    }

    /// Checks `signature` (or the stored one when `None`) against the source identity.
    ///
    /// A signature that verifies becomes the entry's stored signature.
    pub fn verify(&mut self, crypto: &dyn CryptoProvider, signature: Option<Vec<u8>>) -> bool {
        let signature = match signature.or_else(|| self.signature.clone()) {
            Some(sig) => sig,
            None => {
                warn!("No signature available to verify entry for token {}", self.token);
                return false;
            }
        };

        if !self.signature_matches(crypto, &signature) {
            return false;
        }
        self.signature = Some(signature);
        true
    }

    /// Stateless check of the stored signature.
    pub fn verify_signature(&self, crypto: &dyn CryptoProvider) -> bool {
        match &self.signature {
            Some(signature) => self.signature_matches(crypto, signature),
            None => false,
        }
    }

    fn signature_matches(&self, crypto: &dyn CryptoProvider, signature: &[u8]) -> bool {
        match self.signing_bytes() {
            Ok(message) => crypto.verify(self.source.as_bytes(), &message, signature),
            Err(e) => {
                warn!("Failed to encode entry for verification: {}", e);
                false
            }
        }
    }
}
