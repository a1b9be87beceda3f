// core.rs splits responsibilities into submodules for easier maintenance.
pub mod chain;
pub mod index;
pub mod manager;
pub mod pruning;
pub mod state;
pub mod validation;

pub use chain::*;
pub use index::*;
pub use manager::*;
pub use pruning::*;
pub use state::*;
pub use validation::*;
