//! # forge
//!
//! Forge views: HTML templates with directives such as `{#if}`, `{#each}`,
//! `{{ $value | filter }}`, partial includes, and `<include-*>` components.
//!
//! This is the meta-crate that re-exports the sub-crates for convenient
//! access. Most applications only need [`prelude`].
//!
//! ```
//! use forge::prelude::*;
//!
//! let engine = ViewEngine::new(ViewSettings::default());
//! engine.add_template("greeting", "{#if $name}Hello {{ $name }}{:else}Hello stranger{/if}");
//!
//! let mut data = Context::new();
//! data.insert("name", "Ada");
//! assert_eq!(engine.render("greeting", data).unwrap(), "Hello Ada");
//! ```

/// Error types, settings, settings loading, and logging setup.
pub use forge_core as core;

/// Directive preprocessing, rendering, loaders, and the view engine.
pub use forge_view as view;

pub use serde;
pub use serde_json;
pub use tracing;
pub use tracing_subscriber;

/// The types most applications use.
pub mod prelude {
    pub use forge_core::error::{ForgeError, ForgeResult};
    pub use forge_core::logging::setup_logging;
    pub use forge_core::settings::{DebugMode, ViewSettings};
    pub use forge_view::{CallableRegistry, Context, Value, ViewEngine};
}
