//! Concierge Core Library
//!
//! This crate provides the foundational utilities shared by the airport
//! assistant crates:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - The response markup grammar consumed by the chat widget

pub mod config;
pub mod error;
pub mod logging;
pub mod markup;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
