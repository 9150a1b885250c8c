//! Compiled template cache.
//!
//! Entries are keyed by template name and checked against a SHA-256 digest
//! of the source, so an edited template is recompiled on its next render.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use sha2::{Digest, Sha256};

use crate::parser::CompiledTemplate;

#[derive(Debug)]
struct Entry {
    digest: String,
    template: Arc<CompiledTemplate>,
}

/// A thread-safe cache of compiled templates.
#[derive(Debug, Default)]
pub struct CompiledCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl CompiledCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached template for `name` if it was compiled from `source`.
    pub fn get(&self, name: &str, source: &str) -> Option<Arc<CompiledTemplate>> {
        let digest = digest(source);
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .filter(|entry| entry.digest == digest)
            .map(|entry| Arc::clone(&entry.template))
    }

    /// Stores the compiled form of `source` under `name`.
    pub fn insert(&self, name: &str, source: &str, template: Arc<CompiledTemplate>) {
        let entry = Entry {
            digest: digest(source),
            template,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), entry);
    }

    /// Number of cached templates.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Hex-encoded SHA-256 of a template source.
fn digest(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}
