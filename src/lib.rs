// Waypost - a minimal HTTP toolkit for Rust
//
// Typed URL templates matched in registration order, a per-request
// execution context with lifecycle hooks, and handlers that declare their
// parameters up front.

// Re-export core functionality
pub use waypost_core::*;

#[cfg(feature = "config")]
pub use waypost_config;
