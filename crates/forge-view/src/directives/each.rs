//! `{#each $coll as $item[, $index]} ... {:noitems} ... {/each}` loops.

use forge_core::error::ForgeResult;

use super::{find_top_level, variable_name, DirectiveHandler};
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Boundary, Node, Parser, Until};

/// Compiles iteration blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EachHandler;

impl DirectiveHandler for EachHandler {
    fn name(&self) -> &'static str {
        "each"
    }

    fn compile(&self, lexeme: &Lexeme, parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::BlockOpen { name, args } = &lexeme.token else {
            return Ok(None);
        };
        if name != "each" {
            return Ok(None);
        }
        let Some((iterable, item, index)) = parse_header(args) else {
            return Ok(None);
        };

        let (body, boundary) = parser.parse_until(&Until::block("each").branches(&["noitems"]))?;
        let empty = match boundary {
            Boundary::Branch { .. } => parser.parse_until(&Until::block("each"))?.0,
            Boundary::Close | Boundary::Opener { .. } => Vec::new(),
        };

        Ok(Some(Node::Each {
            iterable,
            item,
            index,
            body,
            empty,
        }))
    }
}

/// Splits `$items as $item, $index` into its parts.
fn parse_header(args: &str) -> Option<(Expr, String, Option<String>)> {
    let split = find_top_level(args, " as ")?;
    let iterable = Expr::parse(&args[..split]).ok()?;
    let bindings = &args[split + 4..];

    let (item, index) = match bindings.split_once(',') {
        Some((item, index)) => (variable_name(item)?, Some(variable_name(index)?.to_string())),
        None => (variable_name(bindings)?, None),
    };
    Some((iterable, item.to_string(), index))
}
