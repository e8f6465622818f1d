pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod notifier;
pub mod observability;
pub mod schema;
pub mod secrets;
pub mod testing;

mod state;

pub use config::*;
pub use state::*;
