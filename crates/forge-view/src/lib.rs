//! # forge-view
//!
//! The Forge template engine. Templates are lexed once, compiled by an
//! ordered chain of directive handlers into a node tree, and rendered by a
//! tree-walking interpreter against a [`Context`].
//!
//! ## Modules
//!
//! - [`context`] - Render data: [`Value`] and the scoped [`Context`]
//! - [`lexer`] - Splits source into text and directive tokens
//! - [`expr`] - Expression parsing and evaluation
//! - [`parser`] - The compiled node tree and the parser handlers drive
//! - [`directives`] - Built-in directive handlers
//! - [`preprocessor`] - Source to [`CompiledTemplate`] pipeline
//! - [`renderer`] - Executes compiled templates
//! - [`callables`] - The callable allow-list
//! - [`dates`] - Date formatting for `{date()}`
//! - [`loaders`] - Template sources
//! - [`cache`] - Compiled template cache
//! - [`engine`] - The [`ViewEngine`] facade

pub mod cache;
pub mod callables;
pub mod context;
pub mod dates;
pub mod directives;
pub mod engine;
pub mod expr;
pub mod lexer;
pub mod loaders;
pub mod parser;
pub mod preprocessor;
pub mod renderer;

pub use callables::CallableRegistry;
pub use context::{Context, Value};
pub use engine::ViewEngine;
pub use parser::CompiledTemplate;
pub use preprocessor::Preprocessor;
pub use renderer::{IncludeResolver, Rendered};
