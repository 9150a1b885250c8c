//! `{#set $var = expr}` bindings.

use forge_core::error::ForgeResult;

use super::{variable_name, DirectiveHandler};
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles variable assignments. `{#set}` has no closing tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetHandler;

impl DirectiveHandler for SetHandler {
    fn name(&self) -> &'static str {
        "set"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::BlockOpen { name, args } = &lexeme.token else {
            return Ok(None);
        };
        if name != "set" {
            return Ok(None);
        }
        Ok(parse_assignment(args).map(|(name, value)| Node::Set { name, value }))
    }
}

fn parse_assignment(args: &str) -> Option<(String, Expr)> {
    let (target, value) = args.split_once('=')?;
    if value.starts_with('=') {
        return None;
    }
    let name = variable_name(target)?;
    let value = Expr::parse(value).ok()?;
    Some((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Value;

    #[test]
    fn test_parse_assignment() {
        let (name, value) = parse_assignment("$total = 1 + 2").unwrap();
        assert_eq!(name, "total");
        assert!(matches!(value, Expr::Binary { .. }));

        let (name, value) = parse_assignment("$greeting='hi'").unwrap();
        assert_eq!(name, "greeting");
        assert_eq!(value, Expr::Literal(Value::from("hi")));
    }

    #[test]
    fn test_parse_assignment_rejects() {
        assert!(parse_assignment("$a == 1").is_none());
        assert!(parse_assignment("a = 1").is_none());
        assert!(parse_assignment("$a").is_none());
        assert!(parse_assignment("$a = ").is_none());
    }
}
