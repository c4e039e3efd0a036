pub mod config;
pub mod handlers;
pub mod state;

pub use config::{MarketConfig, PolicyConfig};
pub use handlers::router;
pub use state::AppState;
