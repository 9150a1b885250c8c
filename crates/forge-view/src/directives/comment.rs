//! `{# ... #}` comments.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Strips comments. Runs first so commented-out directives never compile.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommentHandler;

impl DirectiveHandler for CommentHandler {
    fn name(&self) -> &'static str {
        "comment"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        match &lexeme.token {
            Token::Comment(text) => Ok(Some(Node::Comment(text.clone()))),
            _ => Ok(None),
        }
    }
}
