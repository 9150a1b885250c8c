//! # forge-core
//!
//! Core types shared by the Forge view crates. This crate has no framework
//! dependencies and provides the foundation for the template engine.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and result alias
//! - [`settings`] - View engine configuration
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{ForgeError, ForgeResult};
pub use settings::{DebugMode, ViewSettings};
