use alloc::{
    boxed::Box,
    collections::{BTreeMap, BTreeSet},
    format,
    string::{String, ToString as _},
    vec::Vec,
};

use crate::{errors::ExprErrorKind, value::Value};

/// Name under which resolved references are exposed to expressions,
/// as in `{"-expr": "refs.base * 2"}`.
pub(crate) const REF_HOLDER: &str = "refs";

/// Evaluates `-expr` configuration nodes.
///
/// The evaluator is an injected capability: the engine first asks for the
/// references an expression uses, resolves each of them into the `refs`
/// namespace, and only then evaluates. Implementations must not reach outside
/// the namespace they are given.
pub trait ExpressionEvaluator: Send + Sync {
    /// Names the expression reads through the `refs` holder.
    ///
    /// # Errors
    /// Returns [`ExprErrorKind::Parse`] if the expression is not valid syntax.
    fn dependencies(&self, text: &str) -> Result<BTreeSet<String>, ExprErrorKind>;

    /// # Errors
    /// Returns [`ExprErrorKind`] on parse, type or arithmetic failure.
    fn evaluate(&self, text: &str, refs: &BTreeMap<String, Value>) -> Result<Value, ExprErrorKind>;
}

/// Default evaluator over a deliberately small grammar: literals, `refs.name`
/// bindings, unary minus, `+ - * / %`, parentheses and list displays.
///
/// Anything richer than that is a trust-boundary decision and belongs in a
/// user-supplied [`ExpressionEvaluator`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RestrictedEvaluator;

impl ExpressionEvaluator for RestrictedEvaluator {
    fn dependencies(&self, text: &str) -> Result<BTreeSet<String>, ExprErrorKind> {
        let expr = parse(text)?;
        let mut deps = BTreeSet::new();
        collect_refs(&expr, &mut deps);
        Ok(deps)
    }

    fn evaluate(&self, text: &str, refs: &BTreeMap<String, Value>) -> Result<Value, ExprErrorKind> {
        eval(&parse(text)?, refs)
    }
}

enum Expr {
    Lit(Value),
    Ref(String),
    Neg(Box<Expr>),
    Bin(BinOp, Box<Expr>, Box<Expr>),
    List(Vec<Expr>),
}

#[derive(Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

fn collect_refs(expr: &Expr, deps: &mut BTreeSet<String>) {
    match expr {
        Expr::Lit(_) => {}
        Expr::Ref(name) => {
            deps.insert(name.clone());
        }
        Expr::Neg(inner) => collect_refs(inner, deps),
        Expr::Bin(_, lhs, rhs) => {
            collect_refs(lhs, deps);
            collect_refs(rhs, deps);
        }
        Expr::List(items) => {
            for item in items {
                collect_refs(item, deps);
            }
        }
    }
}

fn eval(expr: &Expr, refs: &BTreeMap<String, Value>) -> Result<Value, ExprErrorKind> {
    match expr {
        Expr::Lit(value) => Ok(value.clone()),
        Expr::Ref(name) => refs.get(name).cloned().ok_or_else(|| ExprErrorKind::UnknownRef { name: name.clone() }),
        Expr::Neg(inner) => match eval(inner, refs)? {
            Value::Int(value) => Ok(Value::Int(value.wrapping_neg())),
            Value::Float(value) => Ok(Value::Float(-value)),
            other => Err(ExprErrorKind::Type {
                message: format!("unary '-' is not defined for {}", other.type_label()),
            }),
        },
        Expr::Bin(op, lhs, rhs) => apply(*op, eval(lhs, refs)?, eval(rhs, refs)?),
        Expr::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                values.push(eval(item, refs)?);
            }
            Ok(Value::List(values))
        }
    }
}

fn apply(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, ExprErrorKind> {
    use BinOp::{Add, Div, Mul, Rem, Sub};
    use Value::{Float, Int, Str};

    match (op, lhs, rhs) {
        (Add, Str(mut lhs), Str(rhs)) => {
            lhs.push_str(&rhs);
            Ok(Str(lhs))
        }
        (Add, Int(lhs), Int(rhs)) => Ok(Int(lhs.wrapping_add(rhs))),
        (Sub, Int(lhs), Int(rhs)) => Ok(Int(lhs.wrapping_sub(rhs))),
        (Mul, Int(lhs), Int(rhs)) => Ok(Int(lhs.wrapping_mul(rhs))),
        (Div, Int(_), Int(0)) | (Rem, Int(_), Int(0)) => Err(ExprErrorKind::DivisionByZero),
        (Div, Int(lhs), Int(rhs)) => Ok(Int(lhs.wrapping_div(rhs))),
        (Rem, Int(lhs), Int(rhs)) => Ok(Int(lhs.wrapping_rem(rhs))),
        (op, lhs, rhs) => {
            let (Some(lhs), Some(rhs)) = (lhs.as_float(), rhs.as_float()) else {
                return Err(type_error(symbol(op), &lhs, &rhs));
            };
            match op {
                Add => Ok(Float(lhs + rhs)),
                Sub => Ok(Float(lhs - rhs)),
                Mul => Ok(Float(lhs * rhs)),
                Div if rhs == 0.0 => Err(ExprErrorKind::DivisionByZero),
                Div => Ok(Float(lhs / rhs)),
                Rem if rhs == 0.0 => Err(ExprErrorKind::DivisionByZero),
                Rem => Ok(Float(lhs % rhs)),
            }
        }
    }
}

const fn symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
    }
}

fn type_error(op: &str, lhs: &Value, rhs: &Value) -> ExprErrorKind {
    ExprErrorKind::Type {
        message: format!("operator {op:?} is not defined for {} and {}", lhs.type_label(), rhs.type_label()),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
}

fn parse_error(offset: usize, message: impl Into<String>) -> ExprErrorKind {
    ExprErrorKind::Parse {
        offset,
        message: message.into(),
    }
}

fn lex(text: &str) -> Result<Vec<(usize, Token)>, ExprErrorKind> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(offset, ch)) = chars.peek() {
        match ch {
            ch if ch.is_whitespace() => {
                chars.next();
            }
            '+' | '-' | '*' | '/' | '%' | '(' | ')' | '[' | ']' | ',' | '.' => {
                chars.next();
                tokens.push((
                    offset,
                    match ch {
                        '+' => Token::Plus,
                        '-' => Token::Minus,
                        '*' => Token::Star,
                        '/' => Token::Slash,
                        '%' => Token::Percent,
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        '[' => Token::LBracket,
                        ']' => Token::RBracket,
                        ',' => Token::Comma,
                        _ => Token::Dot,
                    },
                ));
            }
            '"' | '\'' => {
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some((_, c)) if c == ch => break,
                        Some((escape_offset, '\\')) => match chars.next() {
                            Some((_, 'n')) => literal.push('\n'),
                            Some((_, 't')) => literal.push('\t'),
                            Some((_, c @ ('\\' | '"' | '\''))) => literal.push(c),
                            _ => return Err(parse_error(escape_offset, "invalid escape sequence")),
                        },
                        Some((_, c)) => literal.push(c),
                        None => return Err(parse_error(offset, "unterminated string literal")),
                    }
                }
                tokens.push((offset, Token::Str(literal)));
            }
            ch if ch.is_ascii_digit() => {
                let mut literal = String::new();
                let mut is_float = false;
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_digit() {
                        literal.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        // Lookahead keeps `refs.x` after a number unambiguous.
                        let mut ahead = chars.clone();
                        ahead.next();
                        match ahead.peek() {
                            Some(&(_, digit)) if digit.is_ascii_digit() => {
                                is_float = true;
                                literal.push('.');
                                chars.next();
                            }
                            _ => break,
                        }
                    } else {
                        break;
                    }
                }
                let token = if is_float {
                    Token::Float(literal.parse().map_err(|_| parse_error(offset, "invalid float literal"))?)
                } else {
                    Token::Int(literal.parse().map_err(|_| parse_error(offset, "integer literal out of range"))?)
                };
                tokens.push((offset, token));
            }
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                let mut ident = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push((offset, Token::Ident(ident)));
            }
            other => return Err(parse_error(offset, format!("unexpected character {other:?}"))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn next(&mut self) -> Option<(usize, Token)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |&(offset, _)| offset)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expression(&mut self) -> Result<Expr, ExprErrorKind> {
        let mut lhs = self.term()?;
        loop {
            let op = if self.eat(&Token::Plus) {
                BinOp::Add
            } else if self.eat(&Token::Minus) {
                BinOp::Sub
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.term()?));
        }
    }

    fn term(&mut self) -> Result<Expr, ExprErrorKind> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat(&Token::Star) {
                BinOp::Mul
            } else if self.eat(&Token::Slash) {
                BinOp::Div
            } else if self.eat(&Token::Percent) {
                BinOp::Rem
            } else {
                return Ok(lhs);
            };
            lhs = Expr::Bin(op, Box::new(lhs), Box::new(self.unary()?));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprErrorKind> {
        if self.eat(&Token::Minus) {
            Ok(Expr::Neg(Box::new(self.unary()?)))
        } else {
            self.primary()
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprErrorKind> {
        let offset = self.offset();
        match self.next() {
            Some((_, Token::Int(value))) => Ok(Expr::Lit(Value::Int(value))),
            Some((_, Token::Float(value))) => Ok(Expr::Lit(Value::Float(value))),
            Some((_, Token::Str(value))) => Ok(Expr::Lit(Value::Str(value))),
            Some((_, Token::Ident(ident))) => match ident.as_str() {
                "null" => Ok(Expr::Lit(Value::Null)),
                "true" => Ok(Expr::Lit(Value::Bool(true))),
                "false" => Ok(Expr::Lit(Value::Bool(false))),
                REF_HOLDER => {
                    if !self.eat(&Token::Dot) {
                        return Err(parse_error(self.offset(), format!("expected '.' after {REF_HOLDER:?}")));
                    }
                    match self.next() {
                        Some((_, Token::Ident(name))) => Ok(Expr::Ref(name)),
                        _ => Err(parse_error(offset, "expected a name after the '.'")),
                    }
                }
                other => Err(parse_error(offset, format!("unknown name {other:?}, references go through {REF_HOLDER:?}"))),
            },
            Some((_, Token::LParen)) => {
                let inner = self.expression()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    Err(parse_error(self.offset(), "expected ')'"))
                }
            }
            Some((_, Token::LBracket)) => {
                let mut items = Vec::new();
                if self.eat(&Token::RBracket) {
                    return Ok(Expr::List(items));
                }
                loop {
                    items.push(self.expression()?);
                    if self.eat(&Token::RBracket) {
                        return Ok(Expr::List(items));
                    }
                    if !self.eat(&Token::Comma) {
                        return Err(parse_error(self.offset(), "expected ',' or ']'"));
                    }
                }
            }
            Some((offset, token)) => Err(parse_error(offset, format!("unexpected token {token:?}"))),
            None => Err(parse_error(offset, "unexpected end of expression")),
        }
    }
}

fn parse(text: &str) -> Result<Expr, ExprErrorKind> {
    let mut parser = Parser {
        tokens: lex(text)?,
        pos: 0,
        end: text.len(),
    };
    let expr = parser.expression()?;
    if parser.pos < parser.tokens.len() {
        return Err(parse_error(parser.offset(), "trailing input after expression"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{ExpressionEvaluator as _, RestrictedEvaluator};
    use crate::{errors::ExprErrorKind, value::Value};
    use alloc::{
        collections::{BTreeMap, BTreeSet},
        string::String,
    };

    fn refs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs.iter().map(|(name, value)| (String::from(*name), value.clone())).collect()
    }

    fn eval(text: &str, pairs: &[(&str, Value)]) -> Result<Value, ExprErrorKind> {
        RestrictedEvaluator.evaluate(text, &refs(pairs))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3", &[]).unwrap(), Value::Int(7));
        assert_eq!(eval("(1 + 2) * 3", &[]).unwrap(), Value::Int(9));
        assert_eq!(eval("-4 / 2", &[]).unwrap(), Value::Int(-2));
        assert_eq!(eval("7 % 4", &[]).unwrap(), Value::Int(3));
        assert_eq!(eval("1 / 2.0", &[]).unwrap(), Value::Float(0.5));
        assert_eq!(eval("1.5 + 1", &[]).unwrap(), Value::Float(2.5));
    }

    #[test]
    fn test_strings_and_lists() {
        assert_eq!(eval("'a' + \"b\"", &[]).unwrap(), Value::from("ab"));
        assert_eq!(
            eval("[1, 'x', [true, null]]", &[]).unwrap(),
            Value::List(alloc::vec![
                Value::Int(1),
                Value::from("x"),
                Value::List(alloc::vec![Value::Bool(true), Value::Null]),
            ]),
        );
    }

    #[test]
    fn test_refs() {
        assert_eq!(eval("refs.base * 2", &[("base", Value::Int(21))]).unwrap(), Value::Int(42));
        assert!(matches!(eval("refs.base", &[]), Err(ExprErrorKind::UnknownRef { .. })));
    }

    #[test]
    fn test_dependencies() {
        let deps = RestrictedEvaluator.dependencies("refs.dep1 + refs.dep2 * refs.dep1").unwrap();
        let expected: BTreeSet<String> = [String::from("dep1"), String::from("dep2")].into_iter().collect();
        assert_eq!(deps, expected);

        assert!(RestrictedEvaluator.dependencies("1 + 1").unwrap().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(eval("1 +", &[]), Err(ExprErrorKind::Parse { .. })));
        assert!(matches!(eval("(1", &[]), Err(ExprErrorKind::Parse { .. })));
        assert!(matches!(eval("bare_name", &[]), Err(ExprErrorKind::Parse { .. })));
        assert!(matches!(eval("1 2", &[]), Err(ExprErrorKind::Parse { .. })));
        assert!(matches!(eval("'open", &[]), Err(ExprErrorKind::Parse { .. })));
    }

    #[test]
    fn test_arithmetic_errors() {
        assert_eq!(eval("1 / 0", &[]), Err(ExprErrorKind::DivisionByZero));
        assert_eq!(eval("1.0 / 0", &[]), Err(ExprErrorKind::DivisionByZero));
        assert!(matches!(eval("'a' * 2", &[]), Err(ExprErrorKind::Type { .. })));
        assert!(matches!(eval("true + 1", &[]), Err(ExprErrorKind::Type { .. })));
    }

    #[test]
    fn test_number_then_ref() {
        assert_eq!(eval("1.5 + refs.x", &[("x", Value::Float(0.5))]).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_negation_wraps_like_binary_ops() {
        assert_eq!(
            eval("-(0 - 9223372036854775807 - 1)", &[]).unwrap(),
            Value::Int(i64::MIN),
        );
        assert_eq!(
            eval("-refs.n", &[("n", Value::Int(i64::MIN))]).unwrap(),
            Value::Int(i64::MIN),
        );
    }
}
