//! Tree-walking renderer.
//!
//! Executes a [`CompiledTemplate`] against a [`Context`]. Nested partials and
//! components are rendered through an [`IncludeResolver`], which the view
//! engine implements.
//!
//! Unknown callables and callables that fail are replaced by an inline
//! `<!-- forge: ... -->` marker and logged; every other error aborts the
//! render.

use std::fmt::Write;

use forge_core::error::{ForgeError, ForgeResult};
use forge_core::settings::DebugMode;
use indexmap::IndexMap;

use crate::callables::CallableRegistry;
use crate::context::{escape_html, Context, Value};
use crate::dates::{format_date, resolve_time};
use crate::expr::{loose_eq, Expr};
use crate::parser::{CompiledTemplate, FilterCall, Node};

/// The result of rendering a template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rendered {
    /// The rendered text.
    pub output: String,
    /// `true` if a dump directive stopped rendering. Enclosing templates stop
    /// as well.
    pub halted: bool,
}

/// Renders nested templates for `{#include}` and `<include-...>`.
pub trait IncludeResolver {
    /// Renders template `name` with its own `context`.
    ///
    /// `depth` is the nesting level of the include, starting at 1 for an
    /// include in a top-level template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if the template does not exist,
    /// `IncludeDepthExceeded` past the configured depth, or any render error.
    fn render_include(&self, name: &str, context: Context, depth: usize) -> ForgeResult<Rendered>;
}

/// Whether rendering continues after a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// Renders compiled templates.
pub struct Renderer<'a> {
    callables: &'a CallableRegistry,
    resolver: &'a dyn IncludeResolver,
    debug_mode: DebugMode,
    depth: usize,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer for a top-level template.
    pub fn new(
        callables: &'a CallableRegistry,
        resolver: &'a dyn IncludeResolver,
        debug_mode: DebugMode,
    ) -> Self {
        Self {
            callables,
            resolver,
            debug_mode,
            depth: 0,
        }
    }

    /// Sets the include depth of the template being rendered.
    #[must_use]
    pub const fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Renders a template. `{#set}` and loop bindings are written to
    /// `context`, which belongs to this render call only.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error: a bad attributes binding, a failed
    /// include, or an error raised by a nested render.
    pub fn render(&self, template: &CompiledTemplate, context: &mut Context) -> ForgeResult<Rendered> {
        let mut output = String::new();
        let flow = self.render_nodes(&template.nodes, context, &mut output)?;
        Ok(Rendered {
            output,
            halted: flow == Flow::Halt,
        })
    }

    fn render_nodes(&self, nodes: &[Node], context: &mut Context, out: &mut String) -> ForgeResult<Flow> {
        for node in nodes {
            if self.render_node(node, context, out)? == Flow::Halt {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    #[allow(clippy::too_many_lines)]
    fn render_node(&self, node: &Node, context: &mut Context, out: &mut String) -> ForgeResult<Flow> {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Comment(_) => {}
            Node::Output { expr, filters } => {
                if let Some(value) = self.output_value(expr, filters, context, out)? {
                    out.push_str(&value.to_display_string());
                }
            }
            Node::If { branches, otherwise } => {
                for (condition, body) in branches {
                    let matched = self
                        .evaluate(condition, context, out)?
                        .is_some_and(|v| v.is_truthy());
                    if matched {
                        return self.render_nodes(body, context, out);
                    }
                }
                return self.render_nodes(otherwise, context, out);
            }
            Node::Each {
                iterable,
                item,
                index,
                body,
                empty,
            } => {
                let Some(collection) = self.evaluate(iterable, context, out)? else {
                    return Ok(Flow::Continue);
                };
                return self.render_each(&collection, item, index.as_deref(), body, empty, context, out);
            }
            Node::Switch {
                subject,
                cases,
                default,
            } => {
                let Some(subject) = self.evaluate(subject, context, out)? else {
                    return Ok(Flow::Continue);
                };
                for (values, body) in cases {
                    for value in values {
                        let Some(candidate) = self.evaluate(value, context, out)? else {
                            continue;
                        };
                        if loose_eq(&subject, &candidate) {
                            return self.render_nodes(body, context, out);
                        }
                    }
                }
                return self.render_nodes(default, context, out);
            }
            Node::Set { name, value } => {
                let value = self.evaluate(value, context, out)?.unwrap_or_default();
                context.assign(name.clone(), value);
            }
            Node::Call { callee, args } => {
                let result = self
                    .evaluate_args(args, context)
                    .and_then(|args| self.callables.call(callee, &args));
                if let Some(value) = self.recover(result, out)? {
                    out.push_str(&value.to_display_string());
                }
            }
            Node::Date { format, time } => {
                let result = self.render_date(format, time.as_ref(), context);
                if let Some(text) = self.recover(result, out)? {
                    out.push_str(&text);
                }
            }
            Node::Json(expr) => {
                if let Some(value) = self.evaluate(expr, context, out)? {
                    let json = serde_json::to_string(&value)
                        .map_err(|e| ForgeError::SerializationError(e.to_string()))?;
                    out.push_str(&json.replace("</", "<\\/"));
                }
            }
            Node::Dump(args) => return self.render_dump(args, context, out),
            Node::Attributes(name) => {
                let map = context
                    .get(name)
                    .and_then(Value::as_map)
                    .ok_or_else(|| ForgeError::MissingAttributesBinding(name.clone()))?;
                out.push_str(&render_attributes(map));
            }
            Node::Include { name, params } => {
                let Some(name) = self.evaluate(name, context, out)? else {
                    return Ok(Flow::Continue);
                };
                let mut nested = Context::from(context.flatten());
                if let Some(params) = params {
                    match self.evaluate(params, context, out)? {
                        Some(Value::Map(params)) => {
                            for (key, value) in params {
                                nested.insert(key, value);
                            }
                        }
                        Some(_) => {}
                        None => return Ok(Flow::Continue),
                    }
                }
                return self.include(&name.to_display_string(), nested, out);
            }
            Node::Component {
                name,
                attributes,
                slot,
            } => {
                let mut slot_output = String::new();
                if self.render_nodes(slot, context, &mut slot_output)? == Flow::Halt {
                    out.push_str(&slot_output);
                    return Ok(Flow::Halt);
                }

                let mut nested = Context::from(context.flatten());
                for (key, value) in attributes {
                    match value {
                        Some(value) => nested.insert(key.clone(), value.clone()),
                        None => nested.insert(key.clone(), true),
                    }
                }
                nested.insert("slot", slot_output);
                return self.include(name, nested, out);
            }
        }
        Ok(Flow::Continue)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_each(
        &self,
        collection: &Value,
        item: &str,
        index: Option<&str>,
        body: &[Node],
        empty: &[Node],
        context: &mut Context,
        out: &mut String,
    ) -> ForgeResult<Flow> {
        let entries: Vec<(Value, &Value)> = match collection {
            Value::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Value::from(i), v))
                .collect(),
            Value::Map(map) => map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v))
                .collect(),
            _ => Vec::new(),
        };

        if entries.is_empty() {
            return self.render_nodes(empty, context, out);
        }

        let parent_loop = context.get("loop").cloned();
        let count = entries.len();
        context.push();

        let mut flow = Flow::Continue;
        for (i, (key, value)) in entries.into_iter().enumerate() {
            context.insert(item, value.clone());
            if let Some(index) = index {
                context.insert(index, key);
            }
            context.insert("loop", loop_info(i, count, parent_loop.as_ref()));

            flow = match self.render_nodes(body, context, out) {
                Ok(flow) => flow,
                Err(e) => {
                    context.pop();
                    return Err(e);
                }
            };
            if flow == Flow::Halt {
                break;
            }
        }

        context.pop();
        Ok(flow)
    }

    fn render_date(&self, format: &Expr, time: Option<&Expr>, context: &Context) -> ForgeResult<String> {
        let format = format.evaluate(context, self.callables)?.to_display_string();
        let time = match time {
            Some(expr) => expr.evaluate(context, self.callables)?,
            None => Value::Null,
        };
        Ok(format_date(&resolve_time(&time)?, &format))
    }

    fn render_dump(&self, args: &[Expr], context: &Context, out: &mut String) -> ForgeResult<Flow> {
        let mut text = String::new();
        for arg in args {
            if let Some(value) = self.evaluate(arg, context, out)? {
                dump_value(&value, 0, &mut text);
                text.push('\n');
            }
        }

        out.push_str(DUMP_OPEN);
        out.push_str(&escape_html(&text));
        out.push_str("</pre>");

        match self.debug_mode {
            DebugMode::Halt => {
                tracing::debug!(depth = self.depth, "dump halted rendering");
                Ok(Flow::Halt)
            }
            DebugMode::Inline => {
                tracing::info!(dump = %text.trim_end(), "template dump");
                Ok(Flow::Continue)
            }
        }
    }

    fn include(&self, name: &str, context: Context, out: &mut String) -> ForgeResult<Flow> {
        let rendered = self.resolver.render_include(name, context, self.depth + 1)?;
        out.push_str(&rendered.output);
        Ok(if rendered.halted { Flow::Halt } else { Flow::Continue })
    }

    fn output_value(
        &self,
        expr: &Expr,
        filters: &[FilterCall],
        context: &Context,
        out: &mut String,
    ) -> ForgeResult<Option<Value>> {
        let Some(mut value) = self.evaluate(expr, context, out)? else {
            return Ok(None);
        };

        for filter in filters {
            if filter.name == "default" {
                if value.is_null() {
                    let fallback = filter.args.first().map_or(Ok(Value::Null), |arg| {
                        arg.evaluate(context, self.callables)
                    });
                    match self.recover(fallback, out)? {
                        Some(fallback) => value = fallback,
                        None => return Ok(None),
                    }
                }
                continue;
            }

            let result = self.evaluate_args(&filter.args, context).and_then(|extra| {
                let mut args = Vec::with_capacity(extra.len() + 1);
                args.push(value.clone());
                args.extend(extra);
                self.callables.call(&filter.name, &args)
            });
            match self.recover(result, out)? {
                Some(next) => value = next,
                None => return Ok(None),
            }
        }

        Ok(Some(value))
    }

    /// Evaluates an expression, turning recoverable failures into a marker.
    fn evaluate(&self, expr: &Expr, context: &Context, out: &mut String) -> ForgeResult<Option<Value>> {
        self.recover(expr.evaluate(context, self.callables), out)
    }

    fn evaluate_args(&self, args: &[Expr], context: &Context) -> ForgeResult<Vec<Value>> {
        args.iter()
            .map(|arg| arg.evaluate(context, self.callables))
            .collect()
    }

    fn recover<T>(&self, result: ForgeResult<T>, out: &mut String) -> ForgeResult<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, depth = self.depth, "directive replaced by inline marker");
                out.push_str(&inline_marker(&e));
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

const DUMP_OPEN: &str = "<pre class=\"forge-dump\" style=\"background:#1e1e2e;color:#cdd6f4;\
padding:12px;border-radius:4px;font:13px/1.4 monospace;overflow:auto\">";

/// Formats an error as an HTML comment. `--` cannot appear inside one.
fn inline_marker(error: &ForgeError) -> String {
    let message = error.to_string().replace("--", "- -");
    format!("<!-- forge: {message} -->")
}

/// Builds the `$loop` map for iteration `i` of `count`.
fn loop_info(i: usize, count: usize, parent: Option<&Value>) -> Value {
    let mut info = IndexMap::new();
    info.insert("index".to_string(), Value::from(i));
    info.insert("iteration".to_string(), Value::from(i + 1));
    info.insert("first".to_string(), Value::Bool(i == 0));
    info.insert("last".to_string(), Value::Bool(i + 1 == count));
    info.insert("count".to_string(), Value::from(count));
    info.insert("parent".to_string(), parent.cloned().unwrap_or_default());
    Value::Map(info)
}

/// Renders `k="v"` pairs. `true` renders the bare name; `false` and null
/// omit the attribute.
fn render_attributes(map: &IndexMap<String, Value>) -> String {
    map.iter()
        .filter_map(|(key, value)| match value {
            Value::Null | Value::Bool(false) => None,
            Value::Bool(true) => Some(escape_html(key)),
            other => Some(format!(
                "{}=\"{}\"",
                escape_html(key),
                escape_html(&other.to_display_string())
            )),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes a typed, indented dump of a value.
fn dump_value(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent + 1);
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => {
            let _ = write!(out, "bool({b})");
        }
        Value::Integer(i) => {
            let _ = write!(out, "int({i})");
        }
        Value::Float(f) => {
            let _ = write!(out, "float({f})");
        }
        Value::String(s) => {
            let _ = write!(out, "string({}) \"{s}\"", s.chars().count());
        }
        Value::List(items) => {
            let _ = writeln!(out, "list({}) [", items.len());
            for (i, item) in items.iter().enumerate() {
                let _ = write!(out, "{pad}{i} => ");
                dump_value(item, indent + 1, out);
                out.push('\n');
            }
            out.push_str(&"  ".repeat(indent));
            out.push(']');
        }
        Value::Map(map) => {
            let _ = writeln!(out, "map({}) {{", map.len());
            for (key, item) in map {
                let _ = write!(out, "{pad}\"{key}\" => ");
                dump_value(item, indent + 1, out);
                out.push('\n');
            }
            out.push_str(&"  ".repeat(indent));
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::preprocessor::Preprocessor;

    /// Resolves includes from an in-memory map, without a depth limit.
    struct MapResolver {
        templates: HashMap<&'static str, &'static str>,
        callables: CallableRegistry,
        mode: DebugMode,
    }

    impl MapResolver {
        fn new(templates: &[(&'static str, &'static str)]) -> Self {
            Self {
                templates: templates.iter().copied().collect(),
                callables: CallableRegistry::with_builtins(),
                mode: DebugMode::Halt,
            }
        }

        fn render(&self, source: &str, mut context: Context) -> ForgeResult<Rendered> {
            let compiled = Preprocessor::new().process(source)?;
            Renderer::new(&self.callables, self, self.mode).render(&compiled, &mut context)
        }

        fn output(&self, source: &str, context: Context) -> String {
            self.render(source, context).unwrap().output
        }
    }

    impl IncludeResolver for MapResolver {
        fn render_include(&self, name: &str, mut context: Context, depth: usize) -> ForgeResult<Rendered> {
            let source = self
                .templates
                .get(name)
                .ok_or_else(|| ForgeError::TemplateNotFound(name.to_string()))?;
            let compiled = Preprocessor::new().process(source)?;
            Renderer::new(&self.callables, self, self.mode)
                .with_depth(depth)
                .render(&compiled, &mut context)
        }
    }

    fn render(source: &str, context: Context) -> String {
        MapResolver::new(&[]).output(source, context)
    }

    fn ctx(json: serde_json::Value) -> Context {
        Context::from_serialize(&json).unwrap()
    }

    // ── Values ──────────────────────────────────────────────────────

    #[test]
    fn test_interpolation() {
        let data = ctx(serde_json::json!({"name": "Ada"}));
        assert_eq!(render("Hi {{ $name }}!", data.clone()), "Hi Ada!");
        assert_eq!(render("Hi {{ $missing }}!", data), "Hi !");
    }

    #[test]
    fn test_access_chains() {
        let data = ctx(serde_json::json!({
            "user": {"name": "Grace", "roles": ["admin", "dev"]},
            "config": {"site-name": "Forge"}
        }));
        assert_eq!(
            render("{{ $user->name }} {{ $user['roles'][1] }} {{ $config[\"site-name\"] }}", data),
            "Grace dev Forge"
        );
    }

    #[test]
    fn test_default_filter() {
        let data = ctx(serde_json::json!({"title": "Home", "empty": ""}));
        assert_eq!(
            render("{{ $title | default('Untitled') }}|{{ $nope | default('Untitled') }}|{{ $empty | default('x') }}", data),
            "Home|Untitled|"
        );
    }

    #[test]
    fn test_callable_filters() {
        let data = ctx(serde_json::json!({"name": " ada "}));
        assert_eq!(render("{{ $name | trim | ucfirst }}", data), "Ada");
    }

    #[test]
    fn test_escape() {
        let data = ctx(serde_json::json!({"html": "<script>alert('x')</script>"}));
        let out = render("{{ escape($html) }}", data);
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        assert_eq!(out, "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;");
    }

    // ── Blocks ──────────────────────────────────────────────────────

    #[test]
    fn test_if_else() {
        let source = "{#if $flag}{:else}no{/if}";
        assert_eq!(render(source, ctx(serde_json::json!({"flag": false}))), "no");
        assert_eq!(render(source, ctx(serde_json::json!({"flag": true}))), "");
    }

    #[test]
    fn test_else_if_chain() {
        let source = "{#if $n > 10}big{:else if $n > 5}medium{:else}small{/if}";
        assert_eq!(render(source, ctx(serde_json::json!({"n": 7}))), "medium");
        assert_eq!(render(source, ctx(serde_json::json!({"n": 70}))), "big");
        assert_eq!(render(source, ctx(serde_json::json!({"n": 1}))), "small");
    }

    #[test]
    fn test_each_and_noitems() {
        let source = "{#each $items as $item}{{ $item }}{:noitems}none{/each}";
        assert_eq!(render(source, ctx(serde_json::json!({"items": []}))), "none");
        assert_eq!(render(source, ctx(serde_json::json!({"items": ["a", "b"]}))), "ab");
        assert_eq!(render(source, Context::new()), "none");
    }

    #[test]
    fn test_each_map_with_keys() {
        let source = "{#each $prices as $price, $fruit}{{ $fruit }}={{ $price }};{/each}";
        let data = ctx(serde_json::json!({"prices": {"apple": 1, "pear": 2}}));
        assert_eq!(render(source, data), "apple=1;pear=2;");
    }

    #[test]
    fn test_each_loop_variable() {
        let source = "{#each $xs as $x, $i}{{ $i }}:{{ $loop->iteration }}/{{ $loop->count }}{#if $loop->last}.{:else},{/if}{/each}";
        let data = ctx(serde_json::json!({"xs": ["a", "b", "c"]}));
        assert_eq!(render(source, data), "0:1/3,1:2/3,2:3/3.");
    }

    #[test]
    fn test_nested_loops_see_parent() {
        let source = "{#each $rows as $row}{#each $row as $cell}{{ $loop->parent->index }}{{ $cell }} {/each}{/each}";
        let data = ctx(serde_json::json!({"rows": [["a"], ["b", "c"]]}));
        assert_eq!(render(source, data), "0a 1b 1c ");
    }

    #[test]
    fn test_loop_bindings_do_not_leak() {
        let source = "{#each $xs as $x}{/each}[{{ $x }}][{{ $loop }}]";
        let data = ctx(serde_json::json!({"xs": [1, 2]}));
        assert_eq!(render(source, data), "[][]");
    }

    #[test]
    fn test_switch() {
        let source = "{#switch $role}{#case 'admin', 'owner'}full{#case 'user'}limited{:default}none{/switch}";
        assert_eq!(render(source, ctx(serde_json::json!({"role": "owner"}))), "full");
        assert_eq!(render(source, ctx(serde_json::json!({"role": "user"}))), "limited");
        assert_eq!(render(source, ctx(serde_json::json!({"role": "guest"}))), "none");
    }

    #[test]
    fn test_switch_numeric_loose_match() {
        let source = "{#switch $code}{#case 404}missing{#case 500}broken{/switch}";
        assert_eq!(render(source, ctx(serde_json::json!({"code": "404"}))), "missing");
        assert_eq!(render(source, ctx(serde_json::json!({"code": 200}))), "");
    }

    #[test]
    fn test_set() {
        let source = "{{ $total }}{#set $total = $a + $b}{{ $total }}";
        assert_eq!(render(source, ctx(serde_json::json!({"a": 2, "b": 3}))), "5");
    }

    #[test]
    fn test_set_inside_loop_persists() {
        let source = "{#set $sum = 0}{#each $xs as $x}{#set $sum = $sum + $x}{/each}{{ $sum }}";
        assert_eq!(render(source, ctx(serde_json::json!({"xs": [1, 2, 3]}))), "6");
    }

    #[test]
    fn test_set_does_not_touch_caller_context() {
        let resolver = MapResolver::new(&[]);
        let compiled = Preprocessor::new().process("{#set $x = 'changed'}").unwrap();
        let original = ctx(serde_json::json!({"x": "original"}));
        let mut working = original.clone();
        Renderer::new(&resolver.callables, &resolver, DebugMode::Halt)
            .render(&compiled, &mut working)
            .unwrap();
        assert_eq!(original.get("x"), Some(&Value::from("original")));
    }

    #[test]
    fn test_comments_removed() {
        assert_eq!(
            render("before\n{# line one\n{{ $x }}\nline three #}\nafter", Context::new()),
            "before\n\nafter"
        );
    }

    // ── Calls ───────────────────────────────────────────────────────

    #[test]
    fn test_call_directive() {
        let data = ctx(serde_json::json!({"tags": ["a", "b"]}));
        assert_eq!(render("{join($tags, ', ')}", data), "a, b");
    }

    #[test]
    fn test_registered_static_call() {
        let mut resolver = MapResolver::new(&[]);
        resolver
            .callables
            .register(r"App\Money::format", |args| {
                Ok(Value::String(format!("${:.2}", args[0].as_float().unwrap_or(0.0))))
            });
        assert_eq!(
            resolver.output(r"{App\Money::format(3)} {\App\Money::format(1.5)}", Context::new()),
            "$3.00 $1.50"
        );
    }

    #[test]
    fn test_unknown_callable_marker() {
        let out = render("a {missing($x)} b", Context::new());
        assert_eq!(out, "a <!-- forge: Unresolved callable: 'missing' --> b");
    }

    #[test]
    fn test_unknown_callable_in_condition_renders_marker_and_skips_branch() {
        let out = render("{#if nope()}yes{:else}no{/if}", Context::new());
        assert!(out.starts_with("<!-- forge: Unresolved callable"));
        assert!(out.ends_with("no"));
    }

    #[test]
    fn test_callable_error_marker() {
        let out = render("{count('text')}", Context::new());
        assert!(out.starts_with("<!-- forge: Callable 'count' failed"));
    }

    #[test]
    fn test_marker_sanitizes_comment_terminators() {
        let err = ForgeError::callable("x", "bad --> input");
        assert_eq!(inline_marker(&err), "<!-- forge: Callable 'x' failed: bad - -> input -->");
    }

    #[test]
    fn test_date_directive() {
        let data = ctx(serde_json::json!({"ts": 0}));
        assert_eq!(render("{date('Y-m-d', $ts)}", data), "1970-01-01");
        let year = render("{date('Y', now)}", Context::new());
        assert_eq!(year.len(), 4);
    }

    #[test]
    fn test_date_bad_time_marker() {
        let out = render("{date('Y', 'soon')}", Context::new());
        assert!(out.starts_with("<!-- forge: Callable 'date' failed"));
    }

    #[test]
    fn test_json() {
        let data = ctx(serde_json::json!({"cfg": {"a": 1, "html": "</script>"}}));
        assert_eq!(
            render("<script>var c = {json($cfg)};</script>", data),
            r#"<script>var c = {"a":1,"html":"<\/script>"};</script>"#
        );
    }

    // ── Dump ────────────────────────────────────────────────────────

    #[test]
    fn test_dump_halts() {
        let data = ctx(serde_json::json!({"user": {"id": 7}}));
        let rendered = MapResolver::new(&[])
            .render("before {dump($user)} after", data)
            .unwrap();
        assert!(rendered.halted);
        assert!(rendered.output.starts_with("before <pre class=\"forge-dump\""));
        assert!(rendered.output.contains("map(1) {\n  &quot;id&quot; =&gt; int(7)\n}"));
        assert!(rendered.output.ends_with("</pre>"));
    }

    #[test]
    fn test_dump_inline_continues() {
        let mut resolver = MapResolver::new(&[]);
        resolver.mode = DebugMode::Inline;
        let rendered = resolver.render("a{debug('x')}b", Context::new()).unwrap();
        assert!(!rendered.halted);
        assert!(rendered.output.contains("string(1) &quot;x&quot;"));
        assert!(rendered.output.ends_with("</pre>b"));
    }

    #[test]
    fn test_dump_halts_inside_loop() {
        let source = "{#each $xs as $x}{{ $x }}{#if $x == 'b'}{dump($x)}{/if}{/each}tail";
        let rendered = MapResolver::new(&[])
            .render(source, ctx(serde_json::json!({"xs": ["a", "b", "c"]})))
            .unwrap();
        assert!(rendered.halted);
        assert!(rendered.output.starts_with("ab<pre"));
        assert!(rendered.output.ends_with("</pre>"));
    }

    #[test]
    fn test_dump_value_format() {
        let mut out = String::new();
        dump_value(
            &Value::from(serde_json::json!([null, true, 1.5, "hé"])),
            0,
            &mut out,
        );
        assert_eq!(
            out,
            "list(4) [\n  0 => null\n  1 => bool(true)\n  2 => float(1.5)\n  3 => string(2) \"hé\"\n]"
        );
    }

    // ── Attributes ──────────────────────────────────────────────────

    #[test]
    fn test_dynamic_attributes() {
        let data = ctx(serde_json::json!({
            "attrs": {"id": "main", "title": "a \"quoted\" <b>", "disabled": true, "hidden": false, "x": null}
        }));
        assert_eq!(
            render("<div $attrs>x</div>", data),
            "<div id=\"main\" title=\"a &quot;quoted&quot; &lt;b&gt;\" disabled>x</div>"
        );
    }

    #[test]
    fn test_dynamic_attributes_missing_binding() {
        let err = MapResolver::new(&[])
            .render("<div $attrs>", Context::new())
            .unwrap_err();
        assert!(matches!(err, ForgeError::MissingAttributesBinding(name) if name == "attrs"));
    }

    #[test]
    fn test_dynamic_attributes_non_map_binding() {
        let err = MapResolver::new(&[])
            .render("<div $attrs>", ctx(serde_json::json!({"attrs": "id=x"})))
            .unwrap_err();
        assert!(matches!(err, ForgeError::MissingAttributesBinding(_)));
    }

    // ── Includes ────────────────────────────────────────────────────

    #[test]
    fn test_component_isolation() {
        let resolver = MapResolver::new(&[("card", "[{{ $title }}|{{ $slot }}|{{ $user }}]")]);
        let out = resolver.output(
            r#"{{ $title }}<include-card title="X">Hi {{ $user }}</include-card>{{ $title }}"#,
            ctx(serde_json::json!({"title": "Parent", "user": "ada"})),
        );
        assert_eq!(out, "Parent[X|Hi ada|ada]Parent");
    }

    #[test]
    fn test_self_closing_component_bare_attribute() {
        let resolver = MapResolver::new(&[("alert", "{#if $dismissible}x{/if}[{{ $slot }}]")]);
        assert_eq!(resolver.output("<include-alert dismissible />", Context::new()), "x[]");
    }

    #[test]
    fn test_partial_include_with_params() {
        let resolver = MapResolver::new(&[("partials.row", "{{ $label }}={{ $value }};")]);
        let out = resolver.output(
            r#"{#each $rows as $r}{#include "partials.row" with {"label": $r->k, value: $r->v}}{/each}"#,
            ctx(serde_json::json!({"rows": [{"k": "a", "v": 1}, {"k": "b", "v": 2}]})),
        );
        assert_eq!(out, "a=1;b=2;");
    }

    #[test]
    fn test_include_set_does_not_leak() {
        let resolver = MapResolver::new(&[("inner", "{#set $name = 'inner'}{{ $name }}")]);
        let out = resolver.output(
            "{#include inner}/{{ $name }}",
            ctx(serde_json::json!({"name": "outer"})),
        );
        assert_eq!(out, "inner/outer");
    }

    #[test]
    fn test_missing_include_is_fatal() {
        let err = MapResolver::new(&[])
            .render("{#include 'nowhere'}", Context::new())
            .unwrap_err();
        assert!(matches!(err, ForgeError::TemplateNotFound(name) if name == "nowhere"));
    }

    #[test]
    fn test_unknown_callable_in_include_params_skips_include() {
        let resolver = MapResolver::new(&[("p", "[{{ $a }}]")]);
        let out = resolver.output("a{#include 'p' with {a: nope()}}b", Context::new());
        assert_eq!(out, "a<!-- forge: Unresolved callable: 'nope' -->b");
    }

    #[test]
    fn test_unknown_callable_in_include_name_skips_include() {
        let resolver = MapResolver::new(&[("p", "P")]);
        let out = resolver.output("a{#include nope() + 'x'}b", Context::new());
        assert_eq!(out, "a<!-- forge: Unresolved callable: 'nope' -->b");
    }

    #[test]
    fn test_unknown_callable_in_dump_argument() {
        let mut resolver = MapResolver::new(&[]);
        resolver.mode = DebugMode::Inline;
        let rendered = resolver.render("a{dump(nope(), 1)}b", Context::new()).unwrap();
        assert!(!rendered.halted);
        assert!(rendered
            .output
            .starts_with("a<!-- forge: Unresolved callable: 'nope' --><pre"));
        assert!(rendered.output.contains("int(1)"));
        assert!(rendered.output.ends_with("</pre>b"));
    }

    #[test]
    fn test_halt_propagates_through_include() {
        let resolver = MapResolver::new(&[("debugging", "in{dump(1)}never")]);
        let rendered = resolver
            .render("start {#include debugging} end", Context::new())
            .unwrap();
        assert!(rendered.halted);
        assert!(rendered.output.starts_with("start in<pre"));
        assert!(rendered.output.ends_with("</pre>"));
    }
}
