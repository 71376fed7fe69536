pub mod adapter;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod instructions;
pub mod models;
pub mod request;
pub mod response;
pub mod server;
mod utils;

pub use adapter::CodexAdapter;
pub use error::BridgeError;
