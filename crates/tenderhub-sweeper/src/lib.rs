pub mod schedule;
pub mod sweep;

pub use schedule::*;
pub use sweep::*;
