//! adhoc-server
//!
//! Multi-client async TCP server for the ad-hoc matchmaking hub.

pub mod config;
pub mod types;
pub mod server;
pub mod directory;
pub mod status;

// these are internal modules, not re-exported
mod client;
mod hub_task;

pub use config::Config;
pub use server::Server;
