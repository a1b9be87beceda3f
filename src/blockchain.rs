// Thin re-export module: implementation is in `blockchain/core.rs`, split by
// responsibility (block model, validation, ownership state, chain index,
// admission, pruning).

pub mod core;
pub use core::*;
