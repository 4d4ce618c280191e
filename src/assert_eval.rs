//! Boolean assertion expression language over an extracted string map.
//!
//! Grammar (see `SPEC_FULL.md` §7 and `DESIGN.md` Open Question 1):
//!
//! ```text
//! expr       := or_expr
//! or_expr    := and_expr (("or" | "||") and_expr)*
//! and_expr   := not_expr (("and" | "&&") not_expr)*
//! not_expr   := ("not" | "!") not_expr | comparison
//! comparison := atom (("==" | "!=" | "<" | "<=" | ">" | ">=") atom)?
//! atom       := NUMBER | STRING | IDENT | "(" expr ")"
//! ```

use std::collections::HashMap;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AssertError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token \"{0}\"")]
    UnexpectedToken(String),
    #[error("expected \")\"")]
    UnclosedParen,
    #[error("trailing input after expression: \"{0}\"")]
    TrailingInput(String),
    #[error("\"{0}\" is not numeric")]
    NotNumeric(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(String),
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, AssertError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == '"' || c == '\'' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            while i < chars.len() && chars[i] != quote {
                s.push(chars[i]);
                i += 1;
            }
            i += 1; // closing quote
            tokens.push(Token::Str(s));
        } else if c == '=' || c == '!' || c == '<' || c == '>' || c == '&' || c == '|' {
            let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
            match two.as_str() {
                "==" | "!=" | "<=" | ">=" | "&&" | "||" => {
                    tokens.push(Token::Op(two));
                    i += 2;
                }
                _ => {
                    tokens.push(Token::Op(c.to_string()));
                    i += 1;
                }
            }
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let s: String = chars[start..i].iter().collect();
            let n: f64 = s.parse().map_err(|_| AssertError::UnexpectedToken(s.clone()))?;
            tokens.push(Token::Number(n));
        } else if c.is_alphabetic() || c == '_' || c == '.' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.' || chars[i] == '-')
            {
                i += 1;
            }
            let s: String = chars[start..i].iter().collect();
            tokens.push(Token::Ident(s));
        } else {
            return Err(AssertError::UnexpectedToken(c.to_string()));
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone)]
enum Value {
    Bool(bool),
    Text(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        self.pos += 1;
        t
    }

    fn expect_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token::Op(o)) if o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w.eq_ignore_ascii_case(word)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse_expr(&mut self, vars: &HashMap<String, String>) -> Result<bool, AssertError> {
        self.parse_or(vars)
    }

    fn parse_or(&mut self, vars: &HashMap<String, String>) -> Result<bool, AssertError> {
        let mut left = self.parse_and(vars)?;
        loop {
            if self.expect_op("||") || self.expect_ident("or") {
                let right = self.parse_and(vars)?;
                left |= right;
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self, vars: &HashMap<String, String>) -> Result<bool, AssertError> {
        let mut left = self.parse_not(vars)?;
        loop {
            if self.expect_op("&&") || self.expect_ident("and") {
                let right = self.parse_not(vars)?;
                left &= right;
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_not(&mut self, vars: &HashMap<String, String>) -> Result<bool, AssertError> {
        if self.expect_op("!") || self.expect_ident("not") {
            return Ok(!self.parse_not(vars)?);
        }
        self.parse_comparison(vars)
    }

    fn parse_comparison(&mut self, vars: &HashMap<String, String>) -> Result<bool, AssertError> {
        let left = self.parse_atom(vars)?;

        let op = match self.peek() {
            Some(Token::Op(o))
                if matches!(o.as_str(), "==" | "!=" | "<" | "<=" | ">" | ">=") =>
            {
                let o = o.clone();
                self.pos += 1;
                o
            }
            _ => return Ok(truthy(&left)),
        };

        let right = self.parse_atom(vars)?;
        compare(&op, &left, &right)
    }

    fn parse_atom(&mut self, vars: &HashMap<String, String>) -> Result<Value, AssertError> {
        match self.next().cloned() {
            Some(Token::Number(n)) => Ok(Value::Text(format_number(n))),
            Some(Token::Str(s)) => Ok(Value::Text(s)),
            Some(Token::Ident(name)) => Ok(Value::Text(vars.get(&name).cloned().unwrap_or_default())),
            Some(Token::LParen) => {
                let inner = self.parse_expr(vars)?;
                if !matches!(self.next(), Some(Token::RParen)) {
                    return Err(AssertError::UnclosedParen);
                }
                Ok(Value::Bool(inner))
            }
            Some(other) => Err(AssertError::UnexpectedToken(format!("{other:?}"))),
            None => Err(AssertError::UnexpectedEnd),
        }
    }
}

fn format_number(n: f64) -> String {
    if (n.fract()).abs() < f64::EPSILON {
        format!("{n:.0}")
    } else {
        n.to_string()
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Text(s) => !s.is_empty() && s != "0" && !s.eq_ignore_ascii_case("false"),
    }
}

/// Coerce a comparison operand to a number. Only the empty string (meaning a
/// missing identifier, per spec.md §4.5) silently coerces to `0`; any other
/// non-numeric text is a hard error attributed to the check, per
/// `DESIGN.md` Open Question 1.
fn as_number(v: &Value) -> Result<f64, AssertError> {
    match v {
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) if s.is_empty() => Ok(0.0),
        Value::Text(s) => s.parse().map_err(|_| AssertError::NotNumeric(s.clone())),
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> Result<bool, AssertError> {
    let numeric = matches!(op, "<" | "<=" | ">" | ">=")
        || (matches!((left, right), (Value::Text(l), Value::Text(r)) if (l.is_empty() || l.parse::<f64>().is_ok()) && (r.is_empty() || r.parse::<f64>().is_ok())));

    if numeric {
        let l = as_number(left)?;
        let r = as_number(right)?;
        return Ok(match op {
            "==" => (l - r).abs() < f64::EPSILON,
            "!=" => (l - r).abs() >= f64::EPSILON,
            "<" => l < r,
            "<=" => l <= r,
            ">" => l > r,
            ">=" => l >= r,
            _ => unreachable!("only comparison operators reach here"),
        });
    }

    let l = left.to_string();
    let r = right.to_string();
    Ok(match op {
        "==" => l == r,
        "!=" => l != r,
        _ => return Err(AssertError::NotNumeric(l)),
    })
}

/// Evaluate an assertion expression against an extracted value map.
///
/// # Errors
///
/// Returns `AssertError` for malformed expressions or a non-numeric operand
/// used in an ordering comparison.
pub fn eval(expr: &str, vars: &HashMap<String, String>) -> Result<bool, AssertError> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr(vars)?;
    if parser.pos != tokens.len() {
        let remaining: Vec<String> = tokens[parser.pos..].iter().map(|t| format!("{t:?}")).collect();
        return Err(AssertError::TrailingInput(remaining.join(" ")));
    }
    Ok(result)
}
