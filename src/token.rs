//! Ownable asset identifiers and the ledger-owned interning table

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Canonical identifier of an ownable asset.
///
/// Equality and hashing are by canonical value, so a token decoded from the
/// wire and one taken from a [`TokenRegistry`] are the same logical entity.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(Arc<str>);

impl Token {
    pub fn new(canonical: &str) -> Self {
        Token(Arc::from(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when both tokens share one interned allocation.
    pub fn shares_storage(&self, other: &Token) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?})", &*self.0)
    }
}

impl From<&str> for Token {
    fn from(canonical: &str) -> Self {
        Token::new(canonical)
    }
}

/// Interning table owned by a ledger instance.
#[derive(Debug, Default, Clone)]
pub struct TokenRegistry {
    tokens: HashSet<Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pre-existing instance for `canonical`, creating it on first use.
    pub fn intern(&mut self, canonical: &str) -> Token {
        let candidate = Token::new(canonical);
        if let Some(existing) = self.tokens.get(&candidate) {
            return existing.clone();
        }
        self.tokens.insert(candidate.clone());
        candidate
    }

    /// Swaps `token` for the interned instance with the same canonical value.
    pub fn canonicalize(&mut self, token: &Token) -> Token {
        if let Some(existing) = self.tokens.get(token) {
            return existing.clone();
        }
        self.tokens.insert(token.clone());
        token.clone()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
