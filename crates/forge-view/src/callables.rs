//! The callable registry.
//!
//! Templates can only invoke functions that were registered here, by name.
//! `{name(args)}`, `{Ns\Class::method(args)}`, calls inside expressions, and
//! `{{ $x | name(args) }}` filters all resolve through a [`CallableRegistry`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use forge_core::error::{ForgeError, ForgeResult};

use crate::context::{escape_html, Value};

/// A function callable from templates.
pub type CallableFn = dyn Fn(&[Value]) -> ForgeResult<Value> + Send + Sync;

/// A name-to-function allow-list of template callables.
#[derive(Clone)]
pub struct CallableRegistry {
    callables: HashMap<String, Arc<CallableFn>>,
}

impl CallableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            callables: HashMap::new(),
        }
    }

    /// Creates a registry holding the built-in helpers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_all(&mut registry);
        registry
    }

    /// Registers a callable, replacing any previous one with the same name.
    ///
    /// Names are stored without a leading `\`, so `\App\Str::slug` and
    /// `App\Str::slug` refer to the same entry.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> ForgeResult<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        let name = name.trim_start_matches('\\').to_string();
        self.callables.insert(name, Arc::new(f));
    }

    /// Returns `true` if a callable with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.callables.contains_key(name.trim_start_matches('\\'))
    }

    /// Invokes a registered callable.
    ///
    /// # Errors
    ///
    /// Returns `UnresolvedCallable` if no callable has this name, or whatever
    /// error the callable itself returns.
    pub fn call(&self, name: &str, args: &[Value]) -> ForgeResult<Value> {
        let f = self
            .callables
            .get(name.trim_start_matches('\\'))
            .ok_or_else(|| ForgeError::UnresolvedCallable(name.to_string()))?;
        f(args)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.callables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for CallableRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for CallableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallableRegistry")
            .field("callables", &self.names())
            .finish()
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    static NULL: Value = Value::Null;
    args.get(index).unwrap_or(&NULL)
}

fn string_arg(args: &[Value], index: usize) -> String {
    arg(args, index).to_display_string()
}

/// Registers all built-in callables.
fn register_all(r: &mut CallableRegistry) {
    // String helpers
    r.register("escape", |args| Ok(Value::String(escape_html(&string_arg(args, 0)))));
    r.register("upper", |args| Ok(Value::String(string_arg(args, 0).to_uppercase())));
    r.register("lower", |args| Ok(Value::String(string_arg(args, 0).to_lowercase())));
    r.register("trim", |args| Ok(Value::String(string_arg(args, 0).trim().to_string())));
    r.register("ucfirst", |args| {
        let s = string_arg(args, 0);
        let mut chars = s.chars();
        Ok(Value::String(chars.next().map_or_else(String::new, |first| {
            first.to_uppercase().chain(chars).collect()
        })))
    });
    r.register("replace", |args| {
        let subject = string_arg(args, 2);
        Ok(Value::String(
            subject.replace(&string_arg(args, 0), &string_arg(args, 1)),
        ))
    });
    r.register("truncate", |args| {
        let s = string_arg(args, 0);
        let limit = arg(args, 1)
            .as_integer()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ForgeError::callable("truncate", "length must be a non-negative integer"))?;
        if s.chars().count() <= limit {
            return Ok(Value::String(s));
        }
        let suffix = match args.get(2) {
            Some(v) => v.to_display_string(),
            None => "...".to_string(),
        };
        Ok(Value::String(s.chars().take(limit).collect::<String>() + &suffix))
    });

    // Collection helpers
    r.register("count", |args| {
        let value = arg(args, 0);
        match value {
            Value::Null => Ok(Value::Integer(0)),
            Value::List(_) | Value::Map(_) => Ok(Value::from(value.len().unwrap_or(0))),
            other => Err(ForgeError::callable(
                "count",
                format!("expected a list or map, got {}", other.type_name()),
            )),
        }
    });
    r.register("join", |args| {
        let glue = string_arg(args, 1);
        match arg(args, 0) {
            Value::List(items) => Ok(Value::String(
                items
                    .iter()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&glue),
            )),
            Value::Map(map) => Ok(Value::String(
                map.values()
                    .map(Value::to_display_string)
                    .collect::<Vec<_>>()
                    .join(&glue),
            )),
            other => Ok(Value::String(other.to_display_string())),
        }
    });

    // Numeric helpers
    r.register("round", |args| {
        let value = arg(args, 0)
            .as_float()
            .ok_or_else(|| ForgeError::callable("round", "expected a number"))?;
        let precision = arg(args, 1).as_integer().unwrap_or(0);
        if precision <= 0 {
            #[allow(clippy::cast_possible_truncation)]
            return Ok(Value::Integer(value.round() as i64));
        }
        let factor = 10f64.powi(i32::try_from(precision.min(15)).unwrap_or(15));
        Ok(Value::Float((value * factor).round() / factor))
    });
    r.register("abs", |args| match arg(args, 0) {
        Value::Integer(i) => Ok(Value::Integer(i.saturating_abs())),
        other => other
            .as_float()
            .map(|f| Value::Float(f.abs()))
            .ok_or_else(|| ForgeError::callable("abs", "expected a number")),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        CallableRegistry::with_builtins().call(name, args).unwrap()
    }

    #[test]
    fn test_register_and_call() {
        let mut registry = CallableRegistry::new();
        registry.register(r"App\Greeter::hello", |args| {
            Ok(Value::String(format!("hello {}", string_arg(args, 0))))
        });
        assert!(registry.contains(r"\App\Greeter::hello"));
        assert_eq!(
            registry
                .call(r"\App\Greeter::hello", &[Value::from("Ada")])
                .unwrap(),
            Value::from("hello Ada")
        );
    }

    #[test]
    fn test_unknown_callable() {
        let err = CallableRegistry::new().call("missing", &[]).unwrap_err();
        assert!(matches!(err, ForgeError::UnresolvedCallable(name) if name == "missing"));
    }

    #[test]
    fn test_builtin_strings() {
        assert_eq!(call("upper", &["abc".into()]), Value::from("ABC"));
        assert_eq!(call("lower", &["ABC".into()]), Value::from("abc"));
        assert_eq!(call("trim", &["  x ".into()]), Value::from("x"));
        assert_eq!(call("ucfirst", &["élan".into()]), Value::from("Élan"));
        assert_eq!(call("ucfirst", &["".into()]), Value::from(""));
        assert_eq!(
            call("escape", &["<b>\"x\"</b>".into()]),
            Value::from("&lt;b&gt;&quot;x&quot;&lt;/b&gt;")
        );
        assert_eq!(
            call("replace", &["a".into(), "o".into(), "banana".into()]),
            Value::from("bonono")
        );
    }

    #[test]
    fn test_builtin_truncate() {
        assert_eq!(
            call("truncate", &["Hello world".into(), 5.into()]),
            Value::from("Hello...")
        );
        assert_eq!(
            call("truncate", &["Hi".into(), 5.into()]),
            Value::from("Hi")
        );
        assert!(CallableRegistry::with_builtins()
            .call("truncate", &["x".into(), "many".into()])
            .is_err());
    }

    #[test]
    fn test_builtin_collections() {
        let list = Value::from(vec!["a", "b", "c"]);
        assert_eq!(call("count", &[list.clone()]), Value::from(3));
        assert_eq!(call("count", &[Value::Null]), Value::from(0));
        assert_eq!(call("join", &[list, ", ".into()]), Value::from("a, b, c"));
        assert!(CallableRegistry::with_builtins()
            .call("count", &[Value::from(5)])
            .is_err());
    }

    #[test]
    fn test_builtin_numbers() {
        assert_eq!(call("round", &[2.6.into()]), Value::from(3));
        assert_eq!(call("round", &[2.346.into(), 2.into()]), Value::from(2.35));
        assert_eq!(call("abs", &[(-4).into()]), Value::from(4));
        assert_eq!(call("abs", &[(-1.5).into()]), Value::from(1.5));
    }

    #[test]
    fn test_names_sorted() {
        let registry = CallableRegistry::with_builtins();
        let names = registry.names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(names.contains(&"escape"));
    }
}
