//! `{debug(...)}` and `{dump(...)}`.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles debug dumps. Whether a dump halts the render is decided at
/// render time by the configured debug mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpHandler;

impl DirectiveHandler for DumpHandler {
    fn name(&self) -> &'static str {
        "dump"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        match &lexeme.token {
            Token::Call { callee, args } if callee == "debug" || callee == "dump" => {
                Ok(Expr::parse_list(args).ok().map(Node::Dump))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::Preprocessor;

    #[test]
    fn test_dump_and_debug_compile() {
        let compiled = Preprocessor::new().process("{dump($a, 1)}{debug()}").unwrap();
        assert!(matches!(&compiled.nodes[0], Node::Dump(args) if args.len() == 2));
        assert!(matches!(&compiled.nodes[1], Node::Dump(args) if args.is_empty()));
    }
}
