//! The preprocessor pipeline.
//!
//! Lexes a template once and compiles it with an ordered chain of
//! [`DirectiveHandler`]s. Compiling never looks at render data, so the same
//! source always yields the same [`CompiledTemplate`].

use forge_core::error::ForgeResult;

use crate::directives::{default_handlers, DirectiveHandler};
use crate::lexer::tokenize;
use crate::parser::{CompiledTemplate, Parser};

/// Compiles template source into a node tree.
///
/// # Examples
///
/// ```
/// use forge_view::parser::Node;
/// use forge_view::preprocessor::Preprocessor;
///
/// let compiled = Preprocessor::new().process("Hello {# hidden #}world").unwrap();
/// assert_eq!(compiled.nodes[0], Node::Text("Hello ".to_string()));
/// ```
pub struct Preprocessor {
    handlers: Vec<Box<dyn DirectiveHandler>>,
}

impl Preprocessor {
    /// Creates a preprocessor with the built-in handlers.
    pub fn new() -> Self {
        Self {
            handlers: default_handlers(),
        }
    }

    /// Inserts a handler before the built-in ones, so it sees every
    /// directive first.
    #[must_use]
    pub fn with_handler(mut self, handler: Box<dyn DirectiveHandler>) -> Self {
        self.handlers.insert(0, handler);
        self
    }

    /// Returns the handler names in dispatch order.
    pub fn handler_names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Compiles template source.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` for broken block structure. Directives
    /// that merely fail to parse are kept as literal text.
    pub fn process(&self, source: &str) -> ForgeResult<CompiledTemplate> {
        let lexemes = tokenize(source);
        tracing::trace!(lexemes = lexemes.len(), "template lexed");

        let nodes = Parser::new(&lexemes, &self.handlers).parse()?;
        Ok(CompiledTemplate { nodes })
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Lexeme, Token};
    use crate::parser::Node;

    struct ShoutHandler;

    impl DirectiveHandler for ShoutHandler {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn compile(&self, lexeme: &Lexeme, _parser: &mut Parser<'_>) -> ForgeResult<Option<Node>> {
            match &lexeme.token {
                Token::Call { callee, args } if callee == "shout" => {
                    Ok(Some(Node::Text(args.trim_matches('\'').to_uppercase())))
                }
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_compiling_is_deterministic() {
        let source = "{#each $xs as $x}{{ $x | upper }}{:noitems}-{/each}{date('Y')}";
        let p = Preprocessor::new();
        assert_eq!(p.process(source).unwrap(), p.process(source).unwrap());
    }

    #[test]
    fn test_directive_free_text_is_one_node() {
        let source = "<p>Price: $5 {not a directive} a || b</p>\n";
        let compiled = Preprocessor::new().process(source).unwrap();
        assert_eq!(compiled.nodes, vec![Node::Text(source.to_string())]);
    }

    #[test]
    fn test_empty_source() {
        assert!(Preprocessor::new().process("").unwrap().nodes.is_empty());
    }

    #[test]
    fn test_custom_handler_runs_first() {
        let p = Preprocessor::new().with_handler(Box::new(ShoutHandler));
        assert_eq!(p.handler_names()[0], "shout");
        let compiled = p.process("{shout('hey')}").unwrap();
        assert_eq!(compiled.nodes, vec![Node::Text("HEY".to_string())]);
    }
}
