pub mod book;

#[cfg(feature = "memory-store")]
pub mod memory;

pub use book::BidBook;

#[cfg(feature = "memory-store")]
pub use memory::InMemoryBidRepository;
