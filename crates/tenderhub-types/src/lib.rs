pub mod bid;
pub mod blacklist;
pub mod collaborators;
pub mod demand;
pub mod error;
pub mod ids;
pub mod locks;
pub mod money;
pub mod notification;
pub mod rating;
pub mod repository;
pub mod tags;
pub mod transaction;
pub mod warning;

pub use bid::*;
pub use blacklist::*;
pub use collaborators::*;
pub use demand::*;
pub use error::*;
pub use ids::*;
pub use locks::*;
pub use money::*;
pub use notification::*;
pub use rating::*;
pub use repository::*;
pub use tags::*;
pub use transaction::*;
pub use warning::*;
