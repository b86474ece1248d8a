// systemon-api: Async Rust client for the Shure SystemOn gateway REST API

pub mod client;
pub mod error;
pub mod transport;

pub use client::{GatewayClient, API_BASE_PATH, DEVICE_NOT_INITIALIZED};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
