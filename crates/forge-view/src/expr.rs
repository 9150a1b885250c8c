//! Directive expressions.
//!
//! Every directive argument (`{#if ...}`, `{{ ... }}`, call arguments, include
//! parameters) is parsed into an [`Expr`] tree and evaluated against a
//! [`Context`] at render time.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or       := and (("||" | "or") and)*
//! and      := compare (("&&" | "and") compare)*
//! compare  := additive (("==" | "!=" | "===" | "!==" | "<" | "<=" | ">" | ">=") additive)?
//! additive := term (("+" | "-") term)*
//! term     := unary (("*" | "/" | "%") unary)*
//! unary    := ("!" | "not" | "-") unary | postfix
//! postfix  := primary ("[" or "]" | "->" ident)*
//! primary  := literal | $var | call | [list] | {map} | "(" or ")" | bare-word
//! ```
//!
//! Bare words that are not `true`, `false`, `null`, or a call evaluate to
//! themselves as strings, so `{#case active}` and `{date('Y', now)}` work.

use std::cmp::Ordering;

use forge_core::error::{ForgeError, ForgeResult};
use indexmap::IndexMap;

use crate::callables::CallableRegistry;
use crate::context::{Context, Value};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal value.
    Literal(Value),
    /// A `$name` variable reference.
    Variable(String),
    /// `target[index]`.
    Index { target: Box<Expr>, index: Box<Expr> },
    /// `target->name`.
    Property { target: Box<Expr>, name: String },
    /// `[a, b, c]`.
    List(Vec<Expr>),
    /// `{"k": v, k2: v2}`.
    Map(Vec<(String, Expr)>),
    /// `name(args)` or `Ns\Class::method(args)`.
    Call { callee: String, args: Vec<Expr> },
    /// A prefix operator.
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// An infix operator.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl Expr {
    /// Parses an expression, requiring the whole input to be consumed.
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` if the input is not a valid expression.
    pub fn parse(source: &str) -> ForgeResult<Self> {
        let tokens = tokenize(source)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.parse_or()?;
        if parser.pos < parser.tokens.len() {
            return Err(syntax_error(source, "unexpected trailing input"));
        }
        Ok(expr)
    }

    /// Parses a comma-separated argument list (the inside of `f(...)`).
    ///
    /// # Errors
    ///
    /// Returns `TemplateSyntaxError` if any argument is not a valid expression.
    pub fn parse_list(source: &str) -> ForgeResult<Vec<Self>> {
        let tokens = tokenize(source)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let mut items = Vec::new();
        while parser.pos < parser.tokens.len() {
            items.push(parser.parse_or()?);
            if !parser.eat(&Tok::Comma) {
                break;
            }
        }
        if parser.pos < parser.tokens.len() {
            return Err(syntax_error(source, "expected ','"));
        }
        Ok(items)
    }

    /// Evaluates this expression.
    ///
    /// Missing variables, keys, and properties evaluate to [`Value::Null`].
    ///
    /// # Errors
    ///
    /// Propagates errors raised by callables, including `UnresolvedCallable`.
    pub fn evaluate(&self, context: &Context, callables: &CallableRegistry) -> ForgeResult<Value> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Variable(name) => Ok(context.get(name).cloned().unwrap_or_default()),
            Self::Index { target, index } => {
                let target = target.evaluate(context, callables)?;
                let index = index.evaluate(context, callables)?;
                Ok(target.get_index(&index).cloned().unwrap_or_default())
            }
            Self::Property { target, name } => {
                let target = target.evaluate(context, callables)?;
                Ok(target.get_key(name).cloned().unwrap_or_default())
            }
            Self::List(items) => items
                .iter()
                .map(|item| item.evaluate(context, callables))
                .collect::<ForgeResult<Vec<_>>>()
                .map(Value::List),
            Self::Map(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    map.insert(key.clone(), value.evaluate(context, callables)?);
                }
                Ok(Value::Map(map))
            }
            Self::Call { callee, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(context, callables))
                    .collect::<ForgeResult<Vec<_>>>()?;
                callables.call(callee, &args)
            }
            Self::Unary { op, operand } => {
                let value = operand.evaluate(context, callables)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => negate(&value),
                })
            }
            Self::Binary { op, left, right } => {
                let left = left.evaluate(context, callables)?;
                match op {
                    BinaryOp::Or if left.is_truthy() => Ok(Value::Bool(true)),
                    BinaryOp::And if !left.is_truthy() => Ok(Value::Bool(false)),
                    BinaryOp::Or | BinaryOp::And => Ok(Value::Bool(
                        right.evaluate(context, callables)?.is_truthy(),
                    )),
                    _ => Ok(binary(*op, &left, &right.evaluate(context, callables)?)),
                }
            }
        }
    }

    /// Returns the variable name if this is a bare `$name` reference.
    pub fn as_variable(&self) -> Option<&str> {
        match self {
            Self::Variable(name) => Some(name),
            _ => None,
        }
    }
}

fn negate(value: &Value) -> Value {
    match value {
        Value::Integer(i) => i.checked_neg().map_or(Value::Null, Value::Integer),
        other => other.as_float().map_or(Value::Null, |f| Value::Float(-f)),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Eq => Value::Bool(loose_eq(left, right)),
        BinaryOp::NotEq => Value::Bool(!loose_eq(left, right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_eq(right)),
        BinaryOp::Lt => Value::Bool(compare(left, right) == Some(Ordering::Less)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Gt => Value::Bool(compare(left, right) == Some(Ordering::Greater)),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_))
                if !(is_numeric(left) && is_numeric(right)) =>
            {
                Value::String(format!(
                    "{}{}",
                    left.to_display_string(),
                    right.to_display_string()
                ))
            }
            _ => arithmetic(op, left, right),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right)
        }
        BinaryOp::Or | BinaryOp::And => Value::Bool(match op {
            BinaryOp::Or => left.is_truthy() || right.is_truthy(),
            _ => left.is_truthy() && right.is_truthy(),
        }),
    }
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Integer(_) | Value::Float(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

/// Equality used by `==` and `{#case}`: numbers compare numerically, numeric
/// strings compare with numbers, null equals empty values.
pub(crate) fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, other) | (other, Value::Null) => !other.is_truthy(),
        (Value::Bool(b), other) | (other, Value::Bool(b)) => *b == other.is_truthy(),
        (Value::String(a), Value::String(b)) => a == b,
        _ if is_numeric(left) && is_numeric(right) => {
            left.as_float() == right.as_float()
        }
        _ => left == right,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) if !(is_numeric(left) && is_numeric(right)) => {
            Some(a.cmp(b))
        }
        _ => left.as_float()?.partial_cmp(&right.as_float()?),
    }
}

fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> Value {
    if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
        let result = match op {
            BinaryOp::Add => a.checked_add(b),
            BinaryOp::Sub => a.checked_sub(b),
            BinaryOp::Mul => a.checked_mul(b),
            BinaryOp::Rem => a.checked_rem(b),
            BinaryOp::Div if a.checked_rem(b) == Some(0) => a.checked_div(b),
            _ => None,
        };
        if let Some(result) = result {
            return Value::Integer(result);
        }
        if matches!(op, BinaryOp::Rem | BinaryOp::Div) && b == 0 {
            return Value::Null;
        }
    }

    let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
        return Value::Null;
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b != 0.0 => a / b,
        BinaryOp::Rem if b != 0.0 => a % b,
        _ => return Value::Null,
    };
    Value::Float(result)
}

fn int_operand(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::String(s) => s.trim().parse().ok(),
        Value::Null => Some(0),
        _ => None,
    }
}

fn syntax_error(source: &str, message: &str) -> ForgeError {
    ForgeError::TemplateSyntaxError(format!("{message} in expression '{source}'"))
}

// ── Tokens ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Str(String),
    Int(i64),
    Float(f64),
    Var(String),
    Word(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Arrow,
    Op(&'static str),
}

const OPERATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%",
];

fn tokenize(source: &str) -> ForgeResult<Vec<Tok>> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < source.len() {
        let rest = &source[i..];
        let Some(ch) = rest.chars().next() else {
            break;
        };

        if ch.is_whitespace() {
            i += ch.len_utf8();
            continue;
        }

        match ch {
            '\'' | '"' => {
                let (value, len) = lex_string(rest, ch)
                    .ok_or_else(|| syntax_error(source, "unterminated string"))?;
                tokens.push(Tok::Str(value));
                i += len;
            }
            '0'..='9' => {
                let len = rest
                    .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '_'))
                    .unwrap_or(rest.len());
                let digits = rest[..len].replace('_', "");
                let token = if digits.contains('.') {
                    digits.parse().map(Tok::Float).ok()
                } else {
                    digits.parse().map(Tok::Int).ok()
                };
                tokens.push(token.ok_or_else(|| syntax_error(source, "invalid number"))?);
                i += len;
            }
            '$' => {
                let len = ident_len(&rest[1..]);
                if len == 0 {
                    return Err(syntax_error(source, "expected variable name after '$'"));
                }
                tokens.push(Tok::Var(rest[1..=len].to_string()));
                i += 1 + len;
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | ':' => {
                tokens.push(match ch {
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '[' => Tok::LBracket,
                    ']' => Tok::RBracket,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    ',' => Tok::Comma,
                    _ => Tok::Colon,
                });
                i += 1;
            }
            '-' if bytes.get(i + 1) == Some(&b'>') => {
                tokens.push(Tok::Arrow);
                i += 2;
            }
            c if c.is_ascii_alphabetic() || c == '_' || c == '\\' => {
                let len = word_len(rest);
                if len == 0 {
                    return Err(syntax_error(source, "unexpected '\\'"));
                }
                tokens.push(Tok::Word(rest[..len].to_string()));
                i += len;
            }
            _ => {
                let op = OPERATORS
                    .iter()
                    .find(|op| rest.starts_with(**op))
                    .ok_or_else(|| syntax_error(source, &format!("unexpected character '{ch}'")))?;
                tokens.push(Tok::Op(op));
                i += op.len();
            }
        }
    }

    Ok(tokens)
}

fn ident_len(s: &str) -> usize {
    if !s.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return 0;
    }
    s.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(s.len())
}

/// Length of a possibly namespaced word: `Ns\Class::method`, `\strlen`.
fn word_len(s: &str) -> usize {
    let mut pos = 0;
    loop {
        let sep = if s[pos..].starts_with('\\') {
            1
        } else if pos > 0 && s[pos..].starts_with("::") {
            2
        } else {
            0
        };
        let len = ident_len(&s[pos + sep..]);
        if len == 0 {
            return pos;
        }
        pos += sep + len;
    }
}

fn lex_string(s: &str, quote: char) -> Option<(String, usize)> {
    let mut value = String::new();
    let mut chars = s.char_indices().skip(1);
    while let Some((i, ch)) = chars.next() {
        match ch {
            '\\' => {
                let (_, next) = chars.next()?;
                match next {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    c if c == quote || c == '\\' => value.push(c),
                    c => {
                        value.push('\\');
                        value.push(c);
                    }
                }
            }
            c if c == quote => return Some((value, i + 1)),
            c => value.push(c),
        }
    }
    None
}

// ── Parser ──────────────────────────────────────────────────────────

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> ForgeResult<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(ForgeError::TemplateSyntaxError(format!(
                "expected {tok:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn eat_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        match self.peek() {
            Some(Tok::Op(op)) if ops.contains(op) => {
                let op = *op;
                self.pos += 1;
                Some(op)
            }
            _ => None,
        }
    }

    fn eat_word(&mut self, words: &[&str]) -> bool {
        match self.peek() {
            Some(Tok::Word(w)) if words.contains(&w.as_str()) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn parse_or(&mut self) -> ForgeResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_op(&["||"]).is_some() || self.eat_word(&["or"]) {
            let right = self.parse_and()?;
            left = binary_expr(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ForgeResult<Expr> {
        let mut left = self.parse_compare()?;
        while self.eat_op(&["&&"]).is_some() || self.eat_word(&["and"]) {
            let right = self.parse_compare()?;
            left = binary_expr(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_compare(&mut self) -> ForgeResult<Expr> {
        let left = self.parse_additive()?;
        let op = match self.eat_op(&["===", "!==", "==", "!=", "<=", ">=", "<", ">"]) {
            Some("===") => BinaryOp::StrictEq,
            Some("!==") => BinaryOp::StrictNotEq,
            Some("==") => BinaryOp::Eq,
            Some("!=") => BinaryOp::NotEq,
            Some("<=") => BinaryOp::LtEq,
            Some(">=") => BinaryOp::GtEq,
            Some("<") => BinaryOp::Lt,
            Some(_) => BinaryOp::Gt,
            None => return Ok(left),
        };
        let right = self.parse_additive()?;
        Ok(binary_expr(op, left, right))
    }

    fn parse_additive(&mut self) -> ForgeResult<Expr> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.eat_op(&["+", "-"]) {
            let op = if op == "+" { BinaryOp::Add } else { BinaryOp::Sub };
            let right = self.parse_term()?;
            left = binary_expr(op, left, right);
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> ForgeResult<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.eat_op(&["*", "/", "%"]) {
            let op = match op {
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                _ => BinaryOp::Rem,
            };
            let right = self.parse_unary()?;
            left = binary_expr(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ForgeResult<Expr> {
        let op = if self.eat_op(&["!"]).is_some() || self.eat_word(&["not"]) {
            UnaryOp::Not
        } else if self.eat_op(&["-"]).is_some() {
            UnaryOp::Neg
        } else {
            return self.parse_postfix();
        };
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> ForgeResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(&Tok::LBracket) {
                let index = self.parse_or()?;
                self.expect(&Tok::RBracket)?;
                expr = Expr::Index {
                    target: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat(&Tok::Arrow) {
                let Some(Tok::Word(name)) = self.next() else {
                    return Err(ForgeError::TemplateSyntaxError(
                        "expected property name after '->'".to_string(),
                    ));
                };
                expr = Expr::Property {
                    target: Box::new(expr),
                    name,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> ForgeResult<Expr> {
        match self.next() {
            Some(Tok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Tok::Int(i)) => Ok(Expr::Literal(Value::Integer(i))),
            Some(Tok::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Tok::Var(name)) => Ok(Expr::Variable(name)),
            Some(Tok::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::LBracket) => {
                let items = self.parse_sequence(&Tok::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(Tok::LBrace) => self.parse_map(),
            Some(Tok::Word(word)) => {
                if self.eat(&Tok::LParen) {
                    let args = self.parse_sequence(&Tok::RParen)?;
                    return Ok(Expr::Call { callee: word, args });
                }
                Ok(Expr::Literal(match word.to_ascii_lowercase().as_str() {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    _ => Value::String(word),
                }))
            }
            other => Err(ForgeError::TemplateSyntaxError(format!(
                "unexpected token {other:?}"
            ))),
        }
    }

    fn parse_sequence(&mut self, close: &Tok) -> ForgeResult<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.parse_or()?);
            if !self.eat(&Tok::Comma) {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn parse_map(&mut self) -> ForgeResult<Expr> {
        let mut entries = Vec::new();
        while !self.eat(&Tok::RBrace) {
            let key = match self.next() {
                Some(Tok::Str(s) | Tok::Word(s)) => s,
                Some(Tok::Int(i)) => i.to_string(),
                other => {
                    return Err(ForgeError::TemplateSyntaxError(format!(
                        "invalid map key {other:?}"
                    )))
                }
            };
            self.expect(&Tok::Colon)?;
            entries.push((key, self.parse_or()?));
            if !self.eat(&Tok::Comma) {
                self.expect(&Tok::RBrace)?;
                break;
            }
        }
        Ok(Expr::Map(entries))
    }
}

fn binary_expr(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}
