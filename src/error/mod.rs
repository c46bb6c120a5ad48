//! Error types for the management-pack agent.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
