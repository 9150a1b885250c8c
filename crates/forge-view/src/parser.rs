//! Template parser.
//!
//! Turns the lexer's [`Lexeme`] stream into a tree of [`Node`]s. The parser
//! itself knows nothing about individual directives: every non-text lexeme
//! is offered to the directive handlers in order, and the first handler that
//! claims it produces the node. Lexemes no handler claims are kept as
//! literal text.

use forge_core::error::{ForgeError, ForgeResult};

use crate::directives::DirectiveHandler;
use crate::expr::Expr;
use crate::lexer::{Lexeme, Token};

/// A filter applied to an interpolated value: `{{ $x | name(args) }}`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    /// The callable name.
    pub name: String,
    /// Extra arguments after the piped value.
    pub args: Vec<Expr>,
}

/// A node in a compiled template.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text, emitted as-is.
    Text(String),
    /// A stripped comment. Emits nothing.
    Comment(String),
    /// `{{ expr | filters }}`.
    Output {
        /// The value expression.
        expr: Expr,
        /// Filters applied left to right.
        filters: Vec<FilterCall>,
    },
    /// `{#if}` with its `{:else if}` branches and optional `{:else}`.
    If {
        /// `(condition, body)` pairs tried in order.
        branches: Vec<(Expr, Vec<Node>)>,
        /// The `{:else}` body.
        otherwise: Vec<Node>,
    },
    /// `{#each $coll as $item[, $index]}`.
    Each {
        /// The collection expression.
        iterable: Expr,
        /// The item variable name.
        item: String,
        /// The optional index (or key) variable name.
        index: Option<String>,
        /// The loop body.
        body: Vec<Node>,
        /// The `{:noitems}` body.
        empty: Vec<Node>,
    },
    /// `{#switch}` with `{#case}` arms and an optional `{:default}`.
    Switch {
        /// The value being matched.
        subject: Expr,
        /// Each arm's candidate values and body.
        cases: Vec<(Vec<Expr>, Vec<Node>)>,
        /// The `{:default}` body.
        default: Vec<Node>,
    },
    /// `{#set $name = expr}`.
    Set {
        /// The variable being bound.
        name: String,
        /// The value expression.
        value: Expr,
    },
    /// `{name(args)}`: invoke a registered callable and emit the result.
    Call {
        /// The callable name as written.
        callee: String,
        /// The arguments.
        args: Vec<Expr>,
    },
    /// `{date(format, time)}`.
    Date {
        /// The format string expression.
        format: Expr,
        /// The time expression; `None` means now.
        time: Option<Expr>,
    },
    /// `{json(expr)}`.
    Json(Expr),
    /// `{debug(...)}` / `{dump(...)}`.
    Dump(Vec<Expr>),
    /// `<tag $name>`: expand a map into HTML attributes.
    Attributes(String),
    /// `{#include "name" with {params}}`.
    Include {
        /// The template name expression.
        name: Expr,
        /// The parameter map expression.
        params: Option<Expr>,
    },
    /// `<include-name attr="v">slot</include-name>`.
    Component {
        /// The dotted template name.
        name: String,
        /// Literal attributes; bare attributes are `None`.
        attributes: Vec<(String, Option<String>)>,
        /// The slot content, rendered in the caller's context.
        slot: Vec<Node>,
    },
}

/// The output of the preprocessor: a template compiled to a node tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledTemplate {
    /// The top-level nodes.
    pub nodes: Vec<Node>,
}

/// Where a nested [`Parser::parse_until`] call should stop.
#[derive(Debug, Clone)]
pub struct Until<'t> {
    close: Token,
    branches: &'t [&'t str],
    openers: &'t [&'t str],
}

impl<'t> Until<'t> {
    /// Stops at `{/name}`.
    pub fn block(name: &str) -> Self {
        Self {
            close: Token::BlockClose(name.to_string()),
            branches: &[],
            openers: &[],
        }
    }

    /// Stops at `</include-name>`.
    pub fn component(name: &str) -> Self {
        Self {
            close: Token::ComponentClose(name.to_string()),
            branches: &[],
            openers: &[],
        }
    }

    /// Also stops at these `{:branch}` tags.
    #[must_use]
    pub fn branches(mut self, names: &'t [&'t str]) -> Self {
        self.branches = names;
        self
    }

    /// Also stops at these `{#opener}` tags, without consuming them.
    #[must_use]
    pub fn openers(mut self, names: &'t [&'t str]) -> Self {
        self.openers = names;
        self
    }

    fn describe(&self) -> String {
        match &self.close {
            Token::BlockClose(name) => format!("{{/{name}}}"),
            Token::ComponentClose(name) => format!("</include-{name}>"),
            other => format!("{other:?}"),
        }
    }
}

/// What ended a [`Parser::parse_until`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Boundary {
    /// The closing tag was consumed.
    Close,
    /// A `{:branch}` tag was consumed.
    Branch { name: String, args: String },
    /// A `{#opener}` tag was reached; it has not been consumed.
    Opener { name: String, args: String },
}

/// A cursor over a lexeme stream that dispatches directives to handlers.
pub struct Parser<'a> {
    lexemes: &'a [Lexeme],
    pos: usize,
    handlers: &'a [Box<dyn DirectiveHandler>],
}

impl<'a> Parser<'a> {
    /// Creates a parser over the given lexemes.
    pub fn new(lexemes: &'a [Lexeme], handlers: &'a [Box<dyn DirectiveHandler>]) -> Self {
        Self {
            lexemes,
            pos: 0,
            handlers,
        }
    }

    /// Parses the whole stream.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` for unclosed blocks, or any error a
    /// handler raises.
    pub fn parse(&mut self) -> ForgeResult<Vec<Node>> {
        let mut nodes = Vec::new();
        while let Some(lexeme) = self.advance() {
            let node = self.compile(lexeme)?;
            push_node(&mut nodes, node);
        }
        Ok(nodes)
    }

    /// Parses nodes until the boundary described by `until`.
    ///
    /// Branch and close tags that do not belong to `until` are kept as
    /// literal text.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` if the stream ends before the boundary.
    pub fn parse_until(&mut self, until: &Until<'_>) -> ForgeResult<(Vec<Node>, Boundary)> {
        let mut nodes = Vec::new();

        loop {
            let Some(lexeme) = self.peek() else {
                let line = self.lexemes.last().map_or(1, |l| l.line);
                return Err(ForgeError::TemplateSyntaxError(format!(
                    "unclosed block: expected {} before end of template (line {line})",
                    until.describe()
                )));
            };

            if lexeme.token == until.close {
                self.pos += 1;
                return Ok((nodes, Boundary::Close));
            }
            match &lexeme.token {
                Token::BlockBranch { name, args } if until.branches.contains(&name.as_str()) => {
                    self.pos += 1;
                    return Ok((
                        nodes,
                        Boundary::Branch {
                            name: name.clone(),
                            args: args.clone(),
                        },
                    ));
                }
                Token::BlockOpen { name, args } if until.openers.contains(&name.as_str()) => {
                    return Ok((
                        nodes,
                        Boundary::Opener {
                            name: name.clone(),
                            args: args.clone(),
                        },
                    ));
                }
                _ => {}
            }

            self.pos += 1;
            let node = self.compile(lexeme)?;
            push_node(&mut nodes, node);
        }
    }

    /// Returns the next lexeme without consuming it.
    pub fn peek(&self) -> Option<&'a Lexeme> {
        self.lexemes.get(self.pos)
    }

    /// Consumes and returns the next lexeme.
    pub fn advance(&mut self) -> Option<&'a Lexeme> {
        let lexeme = self.lexemes.get(self.pos)?;
        self.pos += 1;
        Some(lexeme)
    }

    fn compile(&mut self, lexeme: &'a Lexeme) -> ForgeResult<Node> {
        if let Token::Text(text) = &lexeme.token {
            return Ok(Node::Text(text.clone()));
        }

        let handlers = self.handlers;
        for handler in handlers {
            let checkpoint = self.pos;
            if let Some(node) = handler.compile(lexeme, self)? {
                return Ok(node);
            }
            self.pos = checkpoint;
        }

        tracing::trace!(line = lexeme.line, source = %lexeme.source, "unclaimed directive kept as text");
        Ok(Node::Text(lexeme.source.clone()))
    }
}

/// Appends a node, merging adjacent text.
fn push_node(nodes: &mut Vec<Node>, node: Node) {
    if let Node::Text(text) = &node {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = nodes.last_mut() {
            last.push_str(text);
            return;
        }
    }
    nodes.push(node);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::default_handlers;
    use crate::lexer::tokenize;

    fn parse(source: &str) -> ForgeResult<Vec<Node>> {
        let lexemes = tokenize(source);
        let handlers = default_handlers();
        Parser::new(&lexemes, &handlers).parse()
    }

    #[test]
    fn test_text_only() {
        assert_eq!(
            parse("plain <b>text</b>").unwrap(),
            vec![Node::Text("plain <b>text</b>".to_string())]
        );
    }

    #[test]
    fn test_unclaimed_tokens_merge_into_text() {
        assert_eq!(
            parse("a {:else} b {/nothing} c").unwrap(),
            vec![Node::Text("a {:else} b {/nothing} c".to_string())]
        );
    }

    #[test]
    fn test_unclosed_block_is_error() {
        let err = parse("{#if $a}never closed").unwrap_err();
        assert!(matches!(err, ForgeError::TemplateSyntaxError(msg) if msg.contains("{/if}")));
    }

    #[test]
    fn test_mismatched_close_is_error() {
        assert!(parse("{#if $a}{#each $xs as $x}{/if}").is_err());
    }

    #[test]
    fn test_unclosed_component_is_error() {
        let err = parse("<include-card>slot").unwrap_err();
        assert!(matches!(err, ForgeError::TemplateSyntaxError(msg) if msg.contains("</include-card>")));
    }

    #[test]
    fn test_push_node_skips_empty_text() {
        let mut nodes = Vec::new();
        push_node(&mut nodes, Node::Text(String::new()));
        push_node(&mut nodes, Node::Text("a".to_string()));
        push_node(&mut nodes, Node::Text("b".to_string()));
        assert_eq!(nodes, vec![Node::Text("ab".to_string())]);
    }
}
