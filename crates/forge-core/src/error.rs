//! Core error types for Forge views.
//!
//! [`ForgeError`] covers every failure the template core can report: missing
//! templates, template syntax problems, callable lookups, attribute bindings,
//! include recursion, configuration, and I/O.

use thiserror::Error;

/// The primary error type for the Forge view layer.
///
/// Errors fall into two classes. *Recoverable* errors (an unknown callable or
/// a callable that failed at runtime) are downgraded by the renderer to an
/// inline marker in the output. Every other variant aborts the render and is
/// surfaced to the caller. See [`ForgeError::is_recoverable`].
#[derive(Error, Debug)]
pub enum ForgeError {
    // ── Resolution ───────────────────────────────────────────────────

    /// The requested template does not exist at the resolved location.
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Nested includes went deeper than the configured limit.
    #[error("Maximum include depth of {depth} exceeded while including '{name}'")]
    IncludeDepthExceeded {
        /// The template whose inclusion crossed the limit.
        name: String,
        /// The configured maximum depth.
        depth: usize,
    },

    // ── Templates ────────────────────────────────────────────────────

    /// A template contains invalid block structure.
    #[error("Template syntax error: {0}")]
    TemplateSyntaxError(String),

    /// A dynamic attribute directive referenced an unset or non-map variable.
    #[error("Missing attributes binding: ${0} is not a map")]
    MissingAttributesBinding(String),

    // ── Callables ────────────────────────────────────────────────────

    /// A call directive referenced a callable that is not registered.
    #[error("Unresolved callable: '{0}'")]
    UnresolvedCallable(String),

    /// A registered callable rejected its arguments or failed.
    #[error("Callable '{name}' failed: {message}")]
    CallableError {
        /// The callable name.
        name: String,
        /// A description of the failure.
        message: String,
    },

    // ── Configuration ────────────────────────────────────────────────

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    // ── Serialization ────────────────────────────────────────────────

    /// A value could not be converted to or from its serialized form.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // ── IO ───────────────────────────────────────────────────────────

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ForgeError {
    /// Returns `true` if the renderer may replace the failing directive with
    /// an inline marker and keep going.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::UnresolvedCallable(_) | Self::CallableError { .. })
    }

    /// Shorthand for building a [`ForgeError::CallableError`].
    pub fn callable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallableError {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// A convenience type alias for `Result<T, ForgeError>`.
pub type ForgeResult<T> = Result<T, ForgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_not_found_display() {
        let err = ForgeError::TemplateNotFound("home.index".to_string());
        assert_eq!(err.to_string(), "Template not found: home.index");
    }

    #[test]
    fn test_include_depth_display() {
        let err = ForgeError::IncludeDepthExceeded {
            name: "loop.self".to_string(),
            depth: 8,
        };
        assert_eq!(
            err.to_string(),
            "Maximum include depth of 8 exceeded while including 'loop.self'"
        );
    }

    #[test]
    fn test_missing_attributes_display() {
        let err = ForgeError::MissingAttributesBinding("attrs".to_string());
        assert_eq!(err.to_string(), "Missing attributes binding: $attrs is not a map");
    }

    #[test]
    fn test_recoverable_classes() {
        assert!(ForgeError::UnresolvedCallable("x".into()).is_recoverable());
        assert!(ForgeError::callable("x", "bad args").is_recoverable());
        assert!(!ForgeError::TemplateNotFound("x".into()).is_recoverable());
        assert!(!ForgeError::MissingAttributesBinding("x".into()).is_recoverable());
        assert!(!ForgeError::TemplateSyntaxError("x".into()).is_recoverable());
    }

    #[test]
    fn test_io_error_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ForgeError = io.into();
        assert!(matches!(err, ForgeError::IoError(_)));
    }
}
