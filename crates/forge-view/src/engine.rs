//! The view engine: loading, compiling, and rendering named templates.
//!
//! [`ViewEngine`] is the entry point for callers. It resolves a dotted name
//! to source text through its loaders, compiles the source with the
//! [`Preprocessor`], and executes it with a [`Renderer`]. It also resolves
//! the partials and components a template includes, enforcing the
//! configured include depth.

use std::path::PathBuf;
use std::sync::Arc;

use forge_core::error::{ForgeError, ForgeResult};
use forge_core::logging::{include_span, render_span};
use forge_core::settings::ViewSettings;

use crate::cache::CompiledCache;
use crate::callables::CallableRegistry;
use crate::context::Context;
use crate::loaders::{FileSystemLoader, StringLoader, TemplateLoader};
use crate::parser::CompiledTemplate;
use crate::preprocessor::Preprocessor;
use crate::renderer::{IncludeResolver, Rendered, Renderer};

/// Loads, compiles, and renders templates.
///
/// # Examples
///
/// ```
/// use forge_core::settings::ViewSettings;
/// use forge_view::context::Context;
/// use forge_view::engine::ViewEngine;
///
/// let engine = ViewEngine::new(ViewSettings::default());
/// engine.add_template("hello", "Hello {{ $name }}!");
///
/// let mut data = Context::new();
/// data.insert("name", "World");
///
/// assert_eq!(engine.render("hello", data).unwrap(), "Hello World!");
/// ```
pub struct ViewEngine {
    settings: ViewSettings,
    preprocessor: Preprocessor,
    callables: CallableRegistry,
    /// Programmatically added templates, checked first.
    string_loader: StringLoader,
    /// Extra loaders, checked after the string loader in insertion order.
    loaders: Vec<Box<dyn TemplateLoader>>,
    /// The view root, checked last.
    fs_loader: FileSystemLoader,
    cache: Option<CompiledCache>,
}

impl ViewEngine {
    /// Creates an engine from settings, with the built-in directives and
    /// callables.
    pub fn new(settings: ViewSettings) -> Self {
        let fs_loader = FileSystemLoader::new(&settings);
        let cache = settings.cache_compiled.then(CompiledCache::new);
        Self {
            settings,
            preprocessor: Preprocessor::new(),
            callables: CallableRegistry::with_builtins(),
            string_loader: StringLoader::new(),
            loaders: Vec::new(),
            fs_loader,
            cache,
        }
    }

    /// Replaces the preprocessor, for example one with extra handlers.
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    /// Returns the engine settings.
    ///
    /// Custom paths added with [`set_custom_path`](Self::set_custom_path)
    /// are not reflected here.
    pub const fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    /// Returns the callable registry for registering helpers.
    pub fn callables_mut(&mut self) -> &mut CallableRegistry {
        &mut self.callables
    }

    /// Returns the callable registry.
    pub const fn callables(&self) -> &CallableRegistry {
        &self.callables
    }

    /// Maps a namespace to its own directory. Templates in that namespace
    /// are read only from `path`.
    pub fn set_custom_path(&self, namespace: impl Into<String>, path: impl Into<PathBuf>) {
        let namespace = namespace.into();
        let path = path.into();
        tracing::debug!(namespace = %namespace, path = %path.display(), "custom view path set");
        self.fs_loader.set_custom_path(namespace, path);
    }

    /// Adds or replaces an in-memory template.
    pub fn add_template(&self, name: impl Into<String>, source: impl Into<String>) {
        self.string_loader.add(name, source);
    }

    /// Appends a loader, consulted before the view root.
    pub fn add_loader(&mut self, loader: Box<dyn TemplateLoader>) {
        self.loaders.push(loader);
    }

    /// Renders the template `name` with `data`.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no loader has the template, and any
    /// compile or fatal render error.
    pub fn render(&self, name: &str, data: Context) -> ForgeResult<String> {
        let span = render_span(name);
        let _guard = span.enter();

        let rendered = self.render_named(name, data, 0)?;
        tracing::debug!(bytes = rendered.output.len(), halted = rendered.halted, "render finished");
        Ok(rendered.output)
    }

    /// Renders template source that has no name. Includes are resolved as
    /// usual.
    ///
    /// # Errors
    ///
    /// Returns any compile or fatal render error.
    pub fn render_string(&self, source: &str, data: Context) -> ForgeResult<String> {
        let span = render_span("<string>");
        let _guard = span.enter();

        let compiled = self.preprocessor.process(source)?;
        let rendered = self.execute(&compiled, data, 0)?;
        Ok(rendered.output)
    }

    /// Loads and compiles a template without rendering it.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` or `TemplateSyntaxError`.
    pub fn compile(&self, name: &str) -> ForgeResult<Arc<CompiledTemplate>> {
        let source = self.load_source(name)?;

        if let Some(cache) = &self.cache {
            if let Some(compiled) = cache.get(name, &source) {
                tracing::trace!(template = name, "compiled cache hit");
                return Ok(compiled);
            }
        }

        let compiled = Arc::new(self.preprocessor.process(&source)?);
        tracing::debug!(template = name, nodes = compiled.nodes.len(), "template compiled");

        if let Some(cache) = &self.cache {
            cache.insert(name, &source, Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Number of compiled templates held by the cache, if caching is on.
    pub fn cached_templates(&self) -> Option<usize> {
        self.cache.as_ref().map(CompiledCache::len)
    }

    /// Reads template source, asking each loader in turn.
    ///
    /// Only `TemplateNotFound` moves on to the next loader; any other error
    /// (an unreadable file, say) is returned as is.
    fn load_source(&self, name: &str) -> ForgeResult<String> {
        match self.string_loader.load(name) {
            Err(ForgeError::TemplateNotFound(_)) => {}
            result => return result,
        }
        for loader in &self.loaders {
            match loader.load(name) {
                Err(ForgeError::TemplateNotFound(_)) => {}
                result => return result,
            }
        }
        self.fs_loader.load(name)
    }

    fn render_named(&self, name: &str, data: Context, depth: usize) -> ForgeResult<Rendered> {
        let compiled = self.compile(name)?;
        self.execute(&compiled, data, depth)
    }

    fn execute(&self, compiled: &CompiledTemplate, mut data: Context, depth: usize) -> ForgeResult<Rendered> {
        Renderer::new(&self.callables, self, self.settings.debug_mode)
            .with_depth(depth)
            .render(compiled, &mut data)
    }
}

impl IncludeResolver for ViewEngine {
    fn render_include(&self, name: &str, context: Context, depth: usize) -> ForgeResult<Rendered> {
        if depth > self.settings.max_include_depth {
            tracing::error!(template = name, depth, "include depth exceeded");
            return Err(ForgeError::IncludeDepthExceeded {
                name: name.to_string(),
                depth: self.settings.max_include_depth,
            });
        }
        let span = include_span(name, depth);
        let _guard = span.enter();
        self.render_named(name, context, depth)
    }
}

impl Default for ViewEngine {
    fn default() -> Self {
        Self::new(ViewSettings::default())
    }
}

impl std::fmt::Debug for ViewEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewEngine")
            .field("settings", &self.settings)
            .field("preprocessor", &self.preprocessor)
            .field("callables", &self.callables)
            .field("loaders", &self.loaders.len())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
