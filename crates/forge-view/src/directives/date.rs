//! `{date('format', time)}`.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::context::Value;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles date formatting. The time defaults to now; `now` and `'now'`
/// are never looked up as variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateHandler;

impl DirectiveHandler for DateHandler {
    fn name(&self) -> &'static str {
        "date"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::Call { callee, args } = &lexeme.token else {
            return Ok(None);
        };
        if callee != "date" {
            return Ok(None);
        }
        let Ok(args) = Expr::parse_list(args) else {
            return Ok(None);
        };
        let mut args = args.into_iter();
        let (Some(format), time, None) = (args.next(), args.next(), args.next()) else {
            return Ok(None);
        };
        let time = time.filter(|t| !is_now(t));
        Ok(Some(Node::Date { format, time }))
    }
}

fn is_now(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(Value::String(s)) if s.eq_ignore_ascii_case("now"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessor::Preprocessor;

    fn compile(source: &str) -> Vec<Node> {
        Preprocessor::new().process(source).unwrap().nodes
    }

    #[test]
    fn test_now_forms() {
        for source in ["{date('Y')}", "{date('Y', now)}", "{date('Y', 'now')}", "{date('Y', NOW)}"] {
            assert_eq!(
                compile(source),
                vec![Node::Date {
                    format: Expr::Literal(Value::from("Y")),
                    time: None,
                }],
                "{source}"
            );
        }
    }

    #[test]
    fn test_explicit_time() {
        assert_eq!(
            compile("{date('d/m', $post->created)}"),
            vec![Node::Date {
                format: Expr::Literal(Value::from("d/m")),
                time: Some(Expr::parse("$post->created").unwrap()),
            }]
        );
    }

    #[test]
    fn test_wrong_arity_is_left_to_later_handlers() {
        // Not a date directive; the generic call handler takes it.
        assert!(matches!(&compile("{date()}")[0], Node::Call { callee, .. } if callee == "date"));
        assert!(matches!(&compile("{date('Y', 1, 2)}")[0], Node::Call { .. }));
    }
}
