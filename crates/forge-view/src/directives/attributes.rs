//! `<tag $attrs>` dynamic attributes.

use forge_core::error::ForgeResult;

use super::DirectiveHandler;
use crate::lexer::{Lexeme, Token};
use crate::parser::{Node, Parser};

/// Compiles an attribute spread inside an HTML start tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributesHandler;

impl DirectiveHandler for AttributesHandler {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
        match &lexeme.token {
            Token::AttributeSpread(name) => Ok(Some(Node::Attributes(name.clone()))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::Node;
    use crate::preprocessor::Preprocessor;

    #[test]
    fn test_spread_compiles() {
        let compiled = Preprocessor::new().process("<input $attrs/>").unwrap();
        assert_eq!(
            compiled.nodes,
            vec![
                Node::Text("<input ".to_string()),
                Node::Attributes("attrs".to_string()),
                Node::Text("/>".to_string()),
            ]
        );
    }
}
