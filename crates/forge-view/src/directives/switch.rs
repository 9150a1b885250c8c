//! `{#switch $v} {#case a, b} ... {:default} ... {/switch}`.

use forge_core::error::{ForgeError, ForgeResult};

use super::DirectiveHandler;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Boundary, Node, Parser, Until};

/// Compiles switch blocks.
///
/// Only whitespace and comments may appear between `{#switch}` and the first
/// `{#case}`. Arms never fall through; the first matching arm wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchHandler;

impl DirectiveHandler for SwitchHandler {
    fn name(&self) -> &'static str {
        "switch"
    }

    fn compile(&self, lexeme: &Lexeme, parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::BlockOpen { name, args } = &lexeme.token else {
            return Ok(None);
        };
        if name != "switch" {
            return Ok(None);
        }
        let Ok(subject) = Expr::parse(args) else {
            return Ok(None);
        };

        skip_preamble(parser, lexeme.line)?;

        let until = Until::block("switch")
            .branches(&["default"])
            .openers(&["case"]);
        let mut cases = Vec::new();
        let mut default = Vec::new();
        let mut pending: Option<Vec<Expr>> = None;

        loop {
            let (body, boundary) = parser.parse_until(&until)?;
            if let Some(values) = pending.take() {
                cases.push((values, body));
            }

            match boundary {
                Boundary::Opener { args, .. } => {
                    parser.advance();
                    let values = Expr::parse_list(&args).map_err(|e| {
                        ForgeError::TemplateSyntaxError(format!(
                            "invalid {{#case {args}}} in switch opened on line {}: {e}",
                            lexeme.line
                        ))
                    })?;
                    pending = Some(values);
                }
                Boundary::Branch { .. } => {
                    default = parser.parse_until(&Until::block("switch"))?.0;
                    break;
                }
                Boundary::Close => break,
            }
        }

        Ok(Some(Node::Switch {
            subject,
            cases,
            default,
        }))
    }
}

/// Consumes whitespace and comments before the first arm.
fn skip_preamble(parser: &mut Parser<'_>, line: usize) -> ForgeResult<()> {
    while let Some(next) = parser.peek() {
        match &next.token {
            Token::Text(text) if text.trim().is_empty() => {}
            Token::Comment(_) => {}
            Token::BlockOpen { name, .. } if name == "case" => return Ok(()),
            Token::BlockBranch { name, .. } if name == "default" => return Ok(()),
            Token::BlockClose(name) if name == "switch" => return Ok(()),
            _ => {
                return Err(ForgeError::TemplateSyntaxError(format!(
                    "unexpected '{}' before the first {{#case}} of switch on line {line}",
                    next.source.trim()
                )))
            }
        }
        parser.advance();
    }
    Ok(())
}
