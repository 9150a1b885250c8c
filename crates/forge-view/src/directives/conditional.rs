//! `{#if} ... {:else if} ... {:else} ... {/if}` conditionals.

use forge_core::error::{ForgeError, ForgeResult};

use super::DirectiveHandler;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Boundary, Node, Parser, Until};

/// Compiles conditional blocks.
///
/// Both `{:else if cond}` and `{:elseif cond}` open another branch; a bare
/// `{:else}` opens the fallback, after which only `{/if}` may follow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalHandler;

impl DirectiveHandler for ConditionalHandler {
    fn name(&self) -> &'static str {
        "conditional"
    }

    fn compile(&self, lexeme: &Lexeme, parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::BlockOpen { name, args } = &lexeme.token else {
            return Ok(None);
        };
        if name != "if" {
            return Ok(None);
        }
        let Ok(mut condition) = Expr::parse(args) else {
            return Ok(None);
        };

        let until = Until::block("if").branches(&["else", "elseif"]);
        let mut branches = Vec::new();

        loop {
            let (body, boundary) = parser.parse_until(&until)?;
            branches.push((condition, body));

            match boundary {
                Boundary::Branch { name, args } => {
                    let next = match (name.as_str(), args.strip_prefix("if")) {
                        ("elseif", _) => args.as_str(),
                        (_, Some(rest)) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest,
                        _ if args.is_empty() => {
                            let (otherwise, _) = parser.parse_until(&Until::block("if"))?;
                            return Ok(Some(Node::If { branches, otherwise }));
                        }
                        _ => {
                            return Err(ForgeError::TemplateSyntaxError(format!(
                                "unexpected arguments after {{:else}}: '{args}' (line {})",
                                lexeme.line
                            )))
                        }
                    };
                    condition = Expr::parse(next).map_err(|e| {
                        ForgeError::TemplateSyntaxError(format!(
                            "invalid {{:else if}} condition in block opened on line {}: {e}",
                            lexeme.line
                        ))
                    })?;
                }
                Boundary::Close | Boundary::Opener { .. } => {
                    return Ok(Some(Node::If {
                        branches,
                        otherwise: Vec::new(),
                    }));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::expr::Expr;
    use crate::parser::Node;
    use crate::preprocessor::Preprocessor;

    fn text(s: &str) -> Node {
        Node::Text(s.to_string())
    }

    #[test]
    fn test_if_else_if_else() {
        let compiled = Preprocessor::new()
            .process("{#if $a}A{:else if $b}B{:elseif $c}C{:else}D{/if}")
            .unwrap();
        assert_eq!(
            compiled.nodes,
            vec![Node::If {
                branches: vec![
                    (Expr::parse("$a").unwrap(), vec![text("A")]),
                    (Expr::parse("$b").unwrap(), vec![text("B")]),
                    (Expr::parse("$c").unwrap(), vec![text("C")]),
                ],
                otherwise: vec![text("D")],
            }]
        );
    }

    #[test]
    fn test_empty_branches() {
        let compiled = Preprocessor::new().process("{#if $flag}{:else}no{/if}").unwrap();
        assert_eq!(
            compiled.nodes,
            vec![Node::If {
                branches: vec![(Expr::parse("$flag").unwrap(), vec![])],
                otherwise: vec![text("no")],
            }]
        );
    }

    #[test]
    fn test_nested_if() {
        let compiled = Preprocessor::new()
            .process("{#if $a}{#if $b}x{/if}{/if}")
            .unwrap();
        let Node::If { branches, .. } = &compiled.nodes[0] else {
            panic!("expected if node");
        };
        assert!(matches!(branches[0].1[0], Node::If { .. }));
    }

    #[test]
    fn test_malformed_condition_stays_literal() {
        let compiled = Preprocessor::new().process("{#if $a ?? $b}x").unwrap();
        assert_eq!(compiled.nodes, vec![text("{#if $a ?? $b}x")]);
    }

    #[test]
    fn test_bad_else_if_condition_is_error() {
        assert!(Preprocessor::new()
            .process("{#if $a}x{:else if ??}y{/if}")
            .is_err());
    }
}
