pub mod ledger;

#[cfg(feature = "memory-store")]
pub mod accounts;
#[cfg(feature = "memory-store")]
pub mod memory;

pub use ledger::*;

#[cfg(feature = "memory-store")]
pub use accounts::*;
#[cfg(feature = "memory-store")]
pub use memory::*;
