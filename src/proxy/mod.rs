pub mod forwarder;

pub use forwarder::{ForwardOutcome, ProxyForwarder};
