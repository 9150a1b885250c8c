//! `{name(args)}` and `{Ns\Class::method(args)}` calls.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles calls to registered callables. Runs after the specialised
/// helpers (`date`, `json`, `dump`) so they keep their own semantics.
///
/// Whether the callable exists is only checked at render time, where a
/// missing one becomes an inline marker instead of an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallHandler;

impl DirectiveHandler for CallHandler {
    fn name(&self) -> &'static str {
        "call"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::Call { callee, args } = &lexeme.token else {
            return Ok(None);
        };
        Ok(Expr::parse_list(args).ok().map(|args| Node::Call {
            callee: callee.clone(),
            args,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Value;
    use crate::preprocessor::Preprocessor;

    #[test]
    fn test_static_call_compiles() {
        let compiled = Preprocessor::new()
            .process(r"{App\Helpers\Str::limit($body, 20)}")
            .unwrap();
        assert_eq!(
            compiled.nodes,
            vec![Node::Call {
                callee: r"App\Helpers\Str::limit".to_string(),
                args: vec![
                    Expr::Variable("body".to_string()),
                    Expr::Literal(Value::from(20)),
                ],
            }]
        );
    }

    #[test]
    fn test_unparseable_args_stay_literal() {
        let compiled = Preprocessor::new().process("{f(1 ? 2)}").unwrap();
        assert_eq!(compiled.nodes, vec![Node::Text("{f(1 ? 2)}".to_string())]);
    }
}
