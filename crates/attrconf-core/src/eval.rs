//! Restricted expression evaluation
//!
//! Substituted text can optionally be evaluated as an arithmetic
//! expression, so `"${dim} // ${heads}"` yields an integer. Only literals,
//! names, unary `+`/`-`, the binary operators `+ - * / // % **` and
//! parentheses are understood. Expressions are parsed completely before
//! anything is evaluated.

use thiserror::Error;

use crate::value::Value;

/// Errors raised while evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The text is not an expression
    #[error("invalid syntax: {0}")]
    Syntax(String),
    /// A name has no value
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    /// Operator applied to operands it does not support
    #[error("unsupported operand type(s) for {op}: '{left}' and '{right}'")]
    Unsupported {
        /// Operator text
        op: &'static str,
        /// Type of the left operand
        left: &'static str,
        /// Type of the right operand
        right: &'static str,
    },
    /// Unary operator applied to an operand it does not support
    #[error("bad operand type for unary {op}: '{operand}'")]
    Type {
        /// Operator text
        op: &'static str,
        /// Type of the operand
        operand: &'static str,
    },
    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,
    /// Integer result out of range
    #[error("integer overflow")]
    Overflow,
}

/// Evaluates substituted text
pub trait Evaluate {
    /// Evaluate `expression`, looking names up through `names`
    fn evaluate(
        &self,
        expression: &str,
        names: &dyn Fn(&str) -> Option<Value>,
    ) -> std::result::Result<Value, EvalError>;
}

/// Arithmetic over integers, floats and strings
#[derive(Debug, Clone, Copy, Default)]
pub struct ArithmeticEvaluator;

impl Evaluate for ArithmeticEvaluator {
    fn evaluate(
        &self,
        expression: &str,
        names: &dyn Fn(&str) -> Option<Value>,
    ) -> std::result::Result<Value, EvalError> {
        let expr = ExprParser::new(expression).parse()?;
        eval(&expr, names)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Name(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum UnaryOp {
    Pos,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
        }
    }
}

type ParseResult<T> = std::result::Result<T, EvalError>;

/// Recursive descent parser
///
/// ```text
/// expr   := term (("+" | "-") term)*
/// term   := unary (("*" | "/" | "//" | "%") unary)*
/// unary  := ("+" | "-") unary | power
/// power  := atom ("**" unary)?
/// atom   := number | string | name | "(" expr ")"
/// ```
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> ParseResult<Expr> {
        self.skip_whitespace();
        if self.is_eof() {
            return Err(EvalError::Syntax("empty expression".into()));
        }
        let expr = self.parse_expr()?;
        self.skip_whitespace();
        if !self.is_eof() {
            return Err(self.unexpected());
        }
        Ok(expr)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn unexpected(&self) -> EvalError {
        match self.current() {
            Some(c) => EvalError::Syntax(format!("unexpected '{}' at offset {}", c, self.pos)),
            None => EvalError::Syntax("unexpected end of expression".into()),
        }
    }

    /// Consume `op` if the input continues with it
    fn eat(&mut self, op: &str) -> bool {
        self.skip_whitespace();
        if self.input[self.pos..].starts_with(op) {
            self.pos += op.len();
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = if self.eat("+") {
                BinaryOp::Add
            } else if self.eat("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            self.skip_whitespace();
            // "**" belongs to parse_power
            if self.input[self.pos..].starts_with("**") {
                return Ok(left);
            }
            let op = if self.eat("//") {
                BinaryOp::FloorDiv
            } else if self.eat("/") {
                BinaryOp::Div
            } else if self.eat("*") {
                BinaryOp::Mul
            } else if self.eat("%") {
                BinaryOp::Mod
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.eat("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.eat("+") {
            return Ok(Expr::Unary(UnaryOp::Pos, Box::new(self.parse_unary()?)));
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let base = self.parse_atom()?;
        if self.eat("**") {
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        self.skip_whitespace();
        match self.current() {
            Some('(') => {
                self.advance();
                let inner = self.parse_expr()?;
                if !self.eat(")") {
                    return Err(self.unexpected());
                }
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() => self.parse_number(),
            Some('.') if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.parse_number(),
            Some(q @ ('\'' | '"')) => self.parse_string(q),
            Some(c) if c.is_alphabetic() || c == '_' => Ok(self.parse_name()),
            _ => Err(self.unexpected()),
        }
    }

    fn parse_number(&mut self) -> ParseResult<Expr> {
        let start = self.pos;
        let mut is_float = false;

        while self.current().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.current() == Some('.') {
            is_float = true;
            self.advance();
            while self.current().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.current(), Some('e' | 'E')) {
            let mark = self.pos;
            self.advance();
            if matches!(self.current(), Some('+' | '-')) {
                self.advance();
            }
            if self.current().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                while self.current().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.pos = mark;
            }
        }

        let text = &self.input[start..self.pos];
        if is_float {
            return text
                .parse::<f64>()
                .map(|f| Expr::Literal(Value::Float(f)))
                .map_err(|_| EvalError::Syntax(format!("invalid number '{}'", text)));
        }
        if text.len() > 1 && text.starts_with('0') && text.bytes().any(|b| b != b'0') {
            return Err(EvalError::Syntax(format!(
                "leading zeros in integer literal '{}'",
                text
            )));
        }
        text.parse::<i64>()
            .map(|i| Expr::Literal(Value::Integer(i)))
            .map_err(|_| EvalError::Overflow)
    }

    fn parse_string(&mut self, quote: char) -> ParseResult<Expr> {
        self.advance();
        let mut out = String::new();
        loop {
            match self.current() {
                None => return Err(EvalError::Syntax("unterminated string literal".into())),
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(Expr::Literal(Value::String(out)));
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        _ => return Err(self.unexpected()),
                    };
                    out.push(escaped);
                    self.advance();
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
    }

    fn parse_name(&mut self) -> Expr {
        let start = self.pos;
        while self
            .current()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }
        let name = &self.input[start..self.pos];
        match name {
            "True" | "true" => Expr::Literal(Value::Bool(true)),
            "False" | "false" => Expr::Literal(Value::Bool(false)),
            "None" | "null" => Expr::Literal(Value::Null),
            _ => Expr::Name(name.to_string()),
        }
    }
}

fn eval(expr: &Expr, names: &dyn Fn(&str) -> Option<Value>) -> ParseResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => names(name)
            .map(|v| v.unwrapped())
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Unary(op, operand) => unary(*op, eval(operand, names)?),
        Expr::Binary(op, left, right) => binary(*op, eval(left, names)?, eval(right, names)?),
    }
}

/// Numeric view of an operand; booleans count as integers
enum Num {
    Int(i64),
    Float(f64),
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Integer(i) => Some(Num::Int(*i)),
        Value::Bool(b) => Some(Num::Int(i64::from(*b))),
        Value::Float(f) => Some(Num::Float(*f)),
        _ => None,
    }
}

fn unary(op: UnaryOp, value: Value) -> ParseResult<Value> {
    let symbol = match op {
        UnaryOp::Pos => "+",
        UnaryOp::Neg => "-",
    };
    match (op, as_num(&value)) {
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Integer(i)),
        (UnaryOp::Pos, Some(Num::Float(f))) => Ok(Value::Float(f)),
        (UnaryOp::Neg, Some(Num::Int(i))) => i.checked_neg().map(Value::Integer).ok_or(EvalError::Overflow),
        (UnaryOp::Neg, Some(Num::Float(f))) => Ok(Value::Float(-f)),
        (_, None) => Err(EvalError::Type {
            op: symbol,
            operand: value.type_name(),
        }),
    }
}

/// Longest string a repetition may produce, in bytes
const MAX_STRING_LEN: usize = 1 << 24;

fn binary(op: BinaryOp, left: Value, right: Value) -> ParseResult<Value> {
    let unsupported = || EvalError::Unsupported {
        op: op.symbol(),
        left: left.type_name(),
        right: right.type_name(),
    };

    match (&left, &right) {
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            return Ok(Value::String(format!("{}{}", a, b)));
        }
        (Value::String(s), Value::Integer(n)) | (Value::Integer(n), Value::String(s))
            if op == BinaryOp::Mul =>
        {
            let count = usize::try_from(*n).unwrap_or(0);
            return match s.len().checked_mul(count) {
                Some(len) if len <= MAX_STRING_LEN => Ok(Value::String(s.repeat(count))),
                _ => Err(EvalError::Overflow),
            };
        }
        _ => {}
    }

    match (as_num(&left), as_num(&right)) {
        (Some(Num::Int(a)), Some(Num::Int(b))) => int_op(op, a, b),
        (Some(a), Some(b)) => {
            let a = match a {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            let b = match b {
                Num::Int(i) => i as f64,
                Num::Float(f) => f,
            };
            float_op(op, a, b)
        }
        _ => Err(unsupported()),
    }
}

fn int_op(op: BinaryOp, a: i64, b: i64) -> ParseResult<Value> {
    let checked = |r: Option<i64>| r.map(Value::Integer).ok_or(EvalError::Overflow);
    match op {
        BinaryOp::Add => checked(a.checked_add(b)),
        BinaryOp::Sub => checked(a.checked_sub(b)),
        BinaryOp::Mul => checked(a.checked_mul(b)),
        BinaryOp::Div => float_op(op, a as f64, b as f64),
        BinaryOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let q = a.checked_div(b).ok_or(EvalError::Overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                checked(q.checked_sub(1))
            } else {
                Ok(Value::Integer(q))
            }
        }
        BinaryOp::Mod => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a.checked_rem(b).ok_or(EvalError::Overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Integer(r + b))
            } else {
                Ok(Value::Integer(r))
            }
        }
        BinaryOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(EvalError::DivisionByZero);
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| EvalError::Overflow)?;
            checked(a.checked_pow(exp))
        }
    }
}

fn float_op(op: BinaryOp, a: f64, b: f64) -> ParseResult<Value> {
    let divisor = |b: f64| {
        if b == 0.0 {
            Err(EvalError::DivisionByZero)
        } else {
            Ok(b)
        }
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / divisor(b)?,
        BinaryOp::FloorDiv => (a / divisor(b)?).floor(),
        BinaryOp::Mod => {
            let b = divisor(b)?;
            a - b * (a / b).floor()
        }
        BinaryOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a.powf(b)
        }
    };
    Ok(Value::Float(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn eval_str(expression: &str) -> std::result::Result<Value, EvalError> {
        ArithmeticEvaluator.evaluate(expression, &|name| match name {
            "dim" => Some(Value::Integer(256)),
            "model.heads" => Some(Value::Integer(8)),
            "name" => Some(Value::from("resnet")),
            _ => None,
        })
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval_str("256 // 64"), Ok(Value::Integer(4)));
        assert_eq!(eval_str("1 + 2 * 3"), Ok(Value::Integer(7)));
        assert_eq!(eval_str("(1 + 2) * 3"), Ok(Value::Integer(9)));
        assert_eq!(eval_str("10 - 4 - 3"), Ok(Value::Integer(3)));
    }

    #[test]
    fn test_true_division_yields_float() {
        assert_eq!(eval_str("7 / 2"), Ok(Value::Float(3.5)));
        assert_eq!(eval_str("4 / 2"), Ok(Value::Float(2.0)));
    }

    #[test]
    fn test_floor_semantics() {
        assert_eq!(eval_str("-7 // 2"), Ok(Value::Integer(-4)));
        assert_eq!(eval_str("-7 % 3"), Ok(Value::Integer(2)));
        assert_eq!(eval_str("7 % -3"), Ok(Value::Integer(-2)));
        assert_eq!(eval_str("7.5 // 2"), Ok(Value::Float(3.0)));
    }

    #[test]
    fn test_power_precedence() {
        assert_eq!(eval_str("-2 ** 2"), Ok(Value::Integer(-4)));
        assert_eq!(eval_str("2 ** 3 ** 2"), Ok(Value::Integer(512)));
        assert_eq!(eval_str("2 ** -1"), Ok(Value::Float(0.5)));
    }

    #[test]
    fn test_floats() {
        assert_eq!(eval_str("1e-3 * 2"), Ok(Value::Float(0.002)));
        assert_eq!(eval_str(".5 + 1"), Ok(Value::Float(1.5)));
    }

    #[test]
    fn test_names() {
        assert_eq!(eval_str("dim // model.heads"), Ok(Value::Integer(32)));
        assert_eq!(eval_str("name + '-v2'"), Ok(Value::from("resnet-v2")));
        assert_eq!(eval_str("missing + 1"), Err(EvalError::UnknownName("missing".into())));
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval_str("True"), Ok(Value::Bool(true)));
        assert_eq!(eval_str("None"), Ok(Value::Null));
        assert_eq!(eval_str("'ab' * 3"), Ok(Value::from("ababab")));
        assert_eq!(eval_str("\"a\\tb\""), Ok(Value::from("a\tb")));
    }

    #[test]
    fn test_syntax_errors() {
        for text in ["", "localhost:80", "1 +", "(1", "2024-08-01", "a b", "'open", "1 $ 2"] {
            assert!(
                matches!(eval_str(text), Err(EvalError::Syntax(_))),
                "expected syntax error for {:?}",
                text
            );
        }
    }

    #[test]
    fn test_runtime_errors() {
        assert_eq!(eval_str("1 // 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval_str("1.0 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval_str("9223372036854775807 + 1"), Err(EvalError::Overflow));
        assert!(matches!(eval_str("'a' - 1"), Err(EvalError::Unsupported { .. })));
        assert!(matches!(eval_str("-'a'"), Err(EvalError::Type { .. })));
    }

    #[test]
    fn test_string_repeat_size_is_bounded() {
        assert_eq!(eval_str("'ab' * 9223372036854775807"), Err(EvalError::Overflow));
        assert_eq!(eval_str("16777216 * 'ab'"), Err(EvalError::Overflow));
        assert_eq!(eval_str("'ab' * -1"), Ok(Value::from("")));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EvalError::UnknownName("x".into()).to_string(),
            "name 'x' is not defined"
        );
        assert_eq!(EvalError::DivisionByZero.to_string(), "division by zero");
    }
}
