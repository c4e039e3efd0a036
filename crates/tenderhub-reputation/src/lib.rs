pub mod policy;
pub mod store;

#[cfg(feature = "memory-store")]
pub mod memory;

pub use policy::BlacklistPolicy;
pub use store::ReputationStore;

#[cfg(feature = "memory-store")]
pub use memory::{InMemoryBlacklistRepository, InMemoryRatingRepository, InMemoryWarningRepository};
