//! TokenChain - a proof-of-work ledger of uniquely owned tokens
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, the candidate index, admission and pruning
//! - [`entry`] - Signed token transfers
//! - [`token`] - Interned token names
//!
//! ## Cryptography
//! - [`crypto`] - Hashing and signatures (SHA-256, secp256k1)
//!
//! ## Runtime
//! - [`node`] - Single-writer ledger worker
//! - [`sync`] - Missing-block requests
//! - [`persistence`] - Snapshot storage (SQLite)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod entry;
pub mod token;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Runtime
// ============================================================================
pub mod node;
pub mod persistence;
pub mod sync;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
