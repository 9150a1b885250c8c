//! Directive handlers.
//!
//! Each handler recognizes one directive family and compiles its lexeme
//! into a [`Node`]. Handlers are consulted in the order returned by
//! [`default_handlers`]; returning `Ok(None)` declines the lexeme and lets
//! the next handler try. A lexeme nobody claims stays literal text, so a
//! handler should decline, not fail, when its directive is malformed.

mod attributes;
mod call;
mod comment;
mod component;
mod conditional;
mod date;
mod dump;
mod each;
mod interpolation;
mod json;
mod partial;
mod set;
mod switch;

pub use attributes::AttributesHandler;
pub use call::CallHandler;
pub use comment::CommentHandler;
pub use component::ComponentHandler;
pub use conditional::ConditionalHandler;
pub use date::DateHandler;
pub use dump::DumpHandler;
pub use each::EachHandler;
pub use interpolation::InterpolationHandler;
pub use json::JsonHandler;
pub use partial::PartialHandler;
pub use set::SetHandler;
pub use switch::SwitchHandler;

use forge_core::error::ForgeResult;

use crate::lexer::Lexeme;
use crate::parser::{Node, Parser};

/// A rule that compiles one directive family.
pub trait DirectiveHandler: Send + Sync {
    /// A short name for logs and [`Preprocessor::handler_names`](crate::preprocessor::Preprocessor::handler_names).
    fn name(&self) -> &'static str;

    /// Compiles `lexeme` if it belongs to this handler.
    ///
    /// Block handlers may consume further lexemes from `parser` to read
    /// their bodies. If the handler returns `Ok(None)`, anything it consumed
    /// is rewound.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` for claimed blocks whose structure is
    /// broken (for example, a missing closing tag).
    fn compile(&self, lexeme: &Lexeme, parser: &mut Parser<'_>) -> ForgeResult<Option<Node>>;
}

/// Returns the built-in handlers in dispatch order.
///
/// Comments first, then block structure, then leaf values, then the
/// terminal helpers, the generic call, and finally markup.
pub fn default_handlers() -> Vec<Box<dyn DirectiveHandler>> {
    vec![
        Box::new(CommentHandler),
        Box::new(ConditionalHandler),
        Box::new(EachHandler),
        Box::new(SwitchHandler),
        Box::new(SetHandler),
        Box::new(PartialHandler),
        Box::new(InterpolationHandler),
        Box::new(DateHandler),
        Box::new(JsonHandler),
        Box::new(DumpHandler),
        Box::new(CallHandler),
        Box::new(AttributesHandler),
        Box::new(ComponentHandler),
    ]
}

/// Parses `$name`, returning the bare name.
pub(crate) fn variable_name(s: &str) -> Option<&str> {
    let name = s.trim().strip_prefix('$')?;
    let valid = name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then_some(name)
}

/// Finds `needle` at bracket depth zero and outside quotes.
pub(crate) fn find_top_level(s: &str, needle: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => quote = Some(ch),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ if depth == 0 && s[i..].starts_with(needle) => return Some(i),
            _ => {}
        }
    }
    None
}
