pub mod api;
pub mod config;
pub mod error;
pub mod mcp;
pub mod proxy;
pub mod schema;
pub mod security;
pub mod tools;
pub mod vendor;

pub use error::{BridgeError, Result};
