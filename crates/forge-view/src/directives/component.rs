//! `<include-name attr="v">slot</include-name>` components.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser, Until};

/// Compiles component tags. The slot is everything up to the matching
/// `</include-name>`; self-closing tags have an empty slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ComponentHandler;

impl DirectiveHandler for ComponentHandler {
    fn name(&self) -> &'static str {
        "component"
    }

    fn compile(&self, lexeme: &Lexeme, parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        let Token::ComponentOpen {
            name,
            attributes,
            self_closing,
        } = &lexeme.token
        else {
            return Ok(None);
        };

        let slot = if *self_closing {
            Vec::new()
        } else {
            parser.parse_until(&Until::component(name))?.0
        };

        Ok(Some(Node::Component {
            name: name.clone(),
            attributes: attributes.clone(),
            slot,
        }))
    }
}
