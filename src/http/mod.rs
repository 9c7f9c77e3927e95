pub mod client;
pub mod types;

// Re-export commonly used types for convenient access
pub use client::{DEFAULT_MAX_REDIRECTS, ReqwestTransport};
pub use types::{Transport, TransportFault, WireRequest, WireResponse};
