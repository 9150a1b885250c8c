//! Template data context.
//!
//! Provides [`Value`] for the dynamic values a template can see and
//! [`Context`], a stack of scopes holding the variables of one render call.

use std::collections::HashMap;
use std::fmt;

use forge_core::error::ForgeError;
use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// A dynamic value in a template context.
///
/// Maps keep insertion order so that iteration and attribute expansion
/// follow the order the caller supplied.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// The absence of a value. Unset variables evaluate to this.
    #[default]
    Null,
    /// A boolean value.
    Bool(bool),
    /// A 64-bit integer.
    Integer(i64),
    /// A 64-bit floating point number.
    Float(f64),
    /// A string value.
    String(String),
    /// An ordered list of values.
    List(Vec<Value>),
    /// An insertion-ordered key-value mapping. Records and objects use this
    /// too; `$obj->prop` and `$obj['prop']` read the same entry.
    Map(IndexMap<String, Value>),
}

impl Value {
    /// Returns `true` if this value is considered truthy in a condition.
    ///
    /// `Null`, `false`, `0`, `0.0`, empty strings, `"0"`, and empty
    /// collections are falsy. Everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty() && s != "0",
            Self::List(l) => !l.is_empty(),
            Self::Map(m) => !m.is_empty(),
        }
    }

    /// Returns `true` for [`Value::Null`].
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts this value to the text emitted into template output.
    ///
    /// Collections render as their JSON encoding.
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::String(s) => s.clone(),
            Self::List(_) | Self::Map(_) => serde_json::to_string(self).unwrap_or_default(),
        }
    }

    /// A short type name used by the dump directive and error messages.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    /// Looks up a key on a map, or a numeric index on a list.
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(list) => key.parse::<usize>().ok().and_then(|idx| list.get(idx)),
            _ => None,
        }
    }

    /// Looks up an entry by an arbitrary index value (`$a[0]`, `$a['k']`, `$a[$i]`).
    pub fn get_index(&self, index: &Value) -> Option<&Value> {
        match (self, index) {
            (Self::List(list), Self::Integer(i)) => usize::try_from(*i).ok().and_then(|i| list.get(i)),
            (_, Self::String(key)) => self.get_key(key),
            (Self::Map(map), other) => map.get(&other.to_display_string()),
            _ => None,
        }
    }

    /// Returns the number of entries in a list or map, or characters in a string.
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::String(s) => Some(s.chars().count()),
            Self::List(l) => Some(l.len()),
            Self::Map(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Returns `true` if this is an empty collection or empty string.
    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|l| l == 0)
    }

    /// Attempts to convert this value to an i64.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => Some(*f as i64),
            Self::String(s) => s.trim().parse::<i64>().ok(),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            Self::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Returns the string contents if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map if this is a map.
    pub const fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Strict equality: same variant and same contents (`===`).
    pub fn strict_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(_), Self::Float(_)) | (Self::Float(_), Self::Integer(_)) => false,
            _ => self == other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            #[allow(clippy::cast_precision_loss)]
            (Self::Integer(a), Self::Float(b)) | (Self::Float(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Null, Self::Null) => true,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::String(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

// -- From implementations --

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Self::Integer(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<IndexMap<String, T>> for Value {
    fn from(m: IndexMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<HashMap<String, T>> for Value {
    fn from(m: HashMap<String, T>) -> Self {
        Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        o.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or(Self::Null),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(arr) => Self::List(arr.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// The variables of a single render call, held in a stack of scopes.
///
/// Loops push a scope per iteration; lookups search from the top scope
/// downward. A context handed to the engine is cloned, so nothing a template
/// does leaks back into the caller's copy.
///
/// # Examples
///
/// ```
/// use forge_view::context::{Context, Value};
///
/// let mut ctx = Context::new();
/// ctx.insert("name", "Ada");
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "Ada");
///
/// ctx.push();
/// ctx.insert("name", "Grace");
/// assert_eq!(ctx.get("name").unwrap().to_display_string(), "Grace");
///
/// ctx.pop();
/// assert_eq!(ctx.get("name"), Some(&Value::from("Ada")));
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    stack: Vec<IndexMap<String, Value>>,
}

impl Context {
    /// Creates a new empty context with a single scope.
    pub fn new() -> Self {
        Self {
            stack: vec![IndexMap::new()],
        }
    }

    /// Builds a context from any serializable map-like value.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError` if the value cannot be serialized or does
    /// not serialize to a map.
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Self, ForgeError> {
        let json = serde_json::to_value(data)
            .map_err(|e| ForgeError::SerializationError(e.to_string()))?;
        match Value::from(json) {
            Value::Map(map) => Ok(Self { stack: vec![map] }),
            other => Err(ForgeError::SerializationError(format!(
                "context data must serialize to a map, got {}",
                other.type_name()
            ))),
        }
    }

    /// Pushes a new scope onto the context stack.
    pub fn push(&mut self) {
        self.stack.push(IndexMap::new());
    }

    /// Pops the top scope. If only one scope remains, this is a no-op.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Sets a variable in the current (top) scope.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        if let Some(top) = self.stack.last_mut() {
            top.insert(key.into(), value.into());
        }
    }

    /// Assigns a variable the way `{#set}` does.
    ///
    /// Overwrites the binding in the nearest scope that already holds it;
    /// otherwise binds it in the base scope, so the value stays visible after
    /// the enclosing loop iteration ends.
    pub fn assign(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(scope) = self.stack.iter_mut().rev().find(|s| s.contains_key(&key)) {
            scope.insert(key, value);
        } else if let Some(base) = self.stack.first_mut() {
            base.insert(key, value);
        }
    }

    /// Looks up a variable by name, searching from the top scope downward.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.stack.iter().rev().find_map(|scope| scope.get(key))
    }

    /// Returns `true` if the variable is bound in any scope.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Flattens all scopes into a single map, with later scopes overriding earlier ones.
    pub fn flatten(&self) -> IndexMap<String, Value> {
        let mut result = IndexMap::new();
        for scope in &self.stack {
            for (k, v) in scope {
                result.insert(k.clone(), v.clone());
            }
        }
        result
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl From<IndexMap<String, Value>> for Context {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self { stack: vec![map] }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect::<IndexMap<String, Value>>(),
        )
    }
}

/// Escapes HTML special characters in a string.
///
/// Replaces `&`, `<`, `>`, `"`, and `'` with their HTML entity equivalents.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
