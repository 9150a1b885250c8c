//! `{#include "dotted.name" with {params}}` partials.

use forge_core::error::ForgeResult;

use super::{find_top_level, DirectiveHandler};
use crate::context::Value;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles partial includes. The name may be quoted, a bare dotted name,
/// or any expression; the optional parameters must be a map literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialHandler;

impl DirectiveHandler for PartialHandler {
    fn name(&self) -> &'static str {
        "partial"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::BlockOpen { name, args } = &lexeme.token else {
            return Ok(None);
        };
        if name != "include" {
            return Ok(None);
        }
        Ok(parse_include(args).map(|(name, params)| Node::Include { name, params }))
    }
}

fn parse_include(args: &str) -> Option<(Expr, Option<Expr>)> {
    let (name_src, params_src) = match find_top_level(args, " with ") {
        Some(split) => (args[..split].trim(), Some(args[split + 6..].trim())),
        None => (args.trim(), None),
    };

    let name = if is_bare_name(name_src) {
        Expr::Literal(Value::String(name_src.to_string()))
    } else {
        Expr::parse(name_src).ok()?
    };

    let params = match params_src {
        Some(src) => match Expr::parse(src).ok()? {
            map @ Expr::Map(_) => Some(map),
            _ => return None,
        },
        None => None,
    };

    Some((name, params))
}

fn is_bare_name(s: &str) -> bool {
    !s.is_empty()
        && s.contains('.')
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_name_with_params() {
        let (name, params) = parse_include(r#""partials.card" with {"title": $t, size: 2}"#).unwrap();
        assert_eq!(name, Expr::Literal(Value::from("partials.card")));
        let Some(Expr::Map(entries)) = params else {
            panic!("expected map params");
        };
        assert_eq!(entries[0].0, "title");
        assert_eq!(entries[1].0, "size");
    }

    #[test]
    fn test_bare_dotted_name() {
        let (name, params) = parse_include("partials.nav-bar").unwrap();
        assert_eq!(name, Expr::Literal(Value::from("partials.nav-bar")));
        assert!(params.is_none());
    }

    #[test]
    fn test_dynamic_name() {
        let (name, _) = parse_include("'cards.' + $kind").unwrap();
        assert!(matches!(name, Expr::Binary { .. }));
    }

    #[test]
    fn test_non_map_params_rejected() {
        assert!(parse_include(r#""card" with $params"#).is_none());
        assert!(parse_include("").is_none());
    }
}
