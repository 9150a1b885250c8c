//! `{json(expr)}`.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles JSON encoding of a single value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonHandler;

impl DirectiveHandler for JsonHandler {
    fn name(&self) -> &'static str {
        "json"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        match &lexeme.token {
            Token::Call { callee, args } if callee == "json" => {
                Ok(Expr::parse(args).ok().map(Node::Json))
            }
            _ => Ok(None),
        }
    }
}
