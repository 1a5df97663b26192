pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod net;
pub mod services;
pub mod state;

// Convenient re-exports (so call sites can do `portico_server::Registry`, etc.)
pub use config::{Config, Storage};
pub use state::registry::Registry;
