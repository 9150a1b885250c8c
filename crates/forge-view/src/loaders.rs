//! Template loaders.
//!
//! A [`TemplateLoader`] turns a dotted template name into source text. The
//! engine asks its in-memory [`StringLoader`] first, then any extra loaders,
//! then the [`FileSystemLoader`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use forge_core::error::{ForgeError, ForgeResult};
use forge_core::settings::ViewSettings;

/// Loads template source text by name.
pub trait TemplateLoader: Send + Sync {
    /// Loads the template source with the given name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if this loader has no such template.
    fn load(&self, name: &str) -> ForgeResult<String>;
}

/// Loads templates from the view root, honoring per-namespace custom paths.
///
/// `home.index` is read from `<view_root>/home/index.<extension>`. Once
/// `set_custom_path("errors", dir)` is called, `errors.404` is read from
/// `<dir>/404.<extension>` and never falls back to the view root.
#[derive(Debug)]
pub struct FileSystemLoader {
    layout: RwLock<ViewSettings>,
}

impl FileSystemLoader {
    /// Creates a loader using the root, extension, and custom paths of `settings`.
    pub fn new(settings: &ViewSettings) -> Self {
        Self {
            layout: RwLock::new(settings.clone()),
        }
    }

    /// Registers (or replaces) the directory for a namespace.
    pub fn set_custom_path(&self, namespace: impl Into<String>, path: impl Into<PathBuf>) {
        self.layout
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .custom_paths
            .insert(namespace.into(), path.into());
    }

    /// Returns the file path a template name resolves to.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.layout
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolve_path(name)
    }
}

impl TemplateLoader for FileSystemLoader {
    fn load(&self, name: &str) -> ForgeResult<String> {
        if name.contains(['/', '\\']) || name.split('.').any(str::is_empty) {
            return Err(ForgeError::TemplateNotFound(name.to_string()));
        }

        let path = self.resolve(name);
        if !path.is_file() {
            tracing::debug!(template = name, path = %path.display(), "template file not found");
            return Err(ForgeError::TemplateNotFound(format!(
                "{name} (resolved to {})",
                path.display()
            )));
        }
        Ok(std::fs::read_to_string(&path)?)
    }
}

/// Loads templates from an in-memory map of name to source strings.
///
/// Useful for tests and for templates that do not live on disk.
#[derive(Debug, Default)]
pub struct StringLoader {
    templates: RwLock<HashMap<String, String>>,
}

impl StringLoader {
    /// Creates a new empty `StringLoader`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a `StringLoader` from a map of template names to source strings.
    pub fn from_map(templates: HashMap<String, String>) -> Self {
        Self {
            templates: RwLock::new(templates),
        }
    }

    /// Adds or replaces a template.
    pub fn add(&self, name: impl Into<String>, source: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), source.into());
    }
}

impl TemplateLoader for StringLoader {
    fn load(&self, name: &str) -> ForgeResult<String> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ForgeError::TemplateNotFound(name.to_string()))
    }
}
