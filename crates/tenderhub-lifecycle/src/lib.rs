pub mod engine;
pub mod policy;
pub mod query;
pub mod view;

#[cfg(feature = "memory-store")]
pub mod memory;

pub use engine::{Assignment, DeadlineOutcome, DemandEngine, NewDemand};
pub use policy::LifecyclePolicy;
pub use query::DemandQuery;
pub use view::DemandView;

#[cfg(feature = "memory-store")]
pub use memory::InMemoryDemandRepository;
