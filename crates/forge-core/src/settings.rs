//! Settings for the Forge view engine.
//!
//! [`ViewSettings`] is passed to the engine at construction; there is no
//! global view-path state. Every field has a default so partial
//! configuration files only need to name what they change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// How the `{debug(...)}` / `{dump(...)}` directives behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// Emit the dump and stop rendering, including enclosing templates.
    #[default]
    Halt,
    /// Emit the dump, log it, and keep rendering.
    Inline,
}

impl DebugMode {
    /// Parses a mode name (`halt` or `inline`), case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Some(Self::Halt),
            "inline" => Some(Self::Inline),
            _ => None,
        }
    }
}

/// View engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Root directory for template files.
    pub view_root: PathBuf,
    /// File extension appended to resolved template paths (without the dot).
    pub extension: String,
    /// Per-namespace root overrides, keyed by the first dotted name segment.
    pub custom_paths: HashMap<String, PathBuf>,
    /// Maximum nesting depth for includes and components.
    pub max_include_depth: usize,
    /// Behavior of the debug/dump directives.
    pub debug_mode: DebugMode,
    /// Whether compiled templates are cached by name and content hash.
    pub cache_compiled: bool,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level filter (e.g. "info", "forge_view=debug").
    pub log_level: String,
    /// Whether debug mode is enabled (pretty logs instead of JSON).
    pub debug: bool,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            view_root: PathBuf::from("views"),
            extension: "html".to_string(),
            custom_paths: HashMap::new(),
            max_include_depth: 64,
            debug_mode: DebugMode::Halt,
            cache_compiled: false,
            log_level: "info".to_string(),
            debug: false,
        }
    }
}

impl ViewSettings {
    /// Creates default settings rooted at the given directory.
    pub fn with_root(view_root: impl Into<PathBuf>) -> Self {
        Self {
            view_root: view_root.into(),
            ..Self::default()
        }
    }

    /// Resolves a dotted template name to a file path.
    ///
    /// `home.index` becomes `<view_root>/home/index.<extension>`. When the
    /// first segment names a registered custom path, that directory replaces
    /// the root and the namespace segment is dropped: with `errors` mapped to
    /// `/srv/errors`, `errors.404` becomes `/srv/errors/404.<extension>`.
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        let segments: Vec<&str> = name.split('.').filter(|s| !s.is_empty()).collect();

        let (root, rest): (&Path, &[&str]) = match segments.split_first() {
            Some((namespace, rest)) if !rest.is_empty() => {
                match self.custom_paths.get(*namespace) {
                    Some(custom) => (custom.as_path(), rest),
                    None => (self.view_root.as_path(), segments.as_slice()),
                }
            }
            _ => (self.view_root.as_path(), segments.as_slice()),
        };

        let mut path = root.to_path_buf();
        for segment in rest {
            path.push(segment);
        }
        if !self.extension.is_empty() {
            let file = format!(
                "{}.{}",
                path.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default(),
                self.extension
            );
            path.set_file_name(file);
        }
        path
    }
}
