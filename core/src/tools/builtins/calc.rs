//! Arithmetic calculator tool.
//!
//! A small recursive-descent evaluator over `+ - * / % ^`, parentheses
//! and unary minus. Floats throughout; results that land on an integer
//! are printed without a fractional part.

use crate::tools::registry::ToolEntry;
use crate::tools::registry::ToolSpec;
use agentrun_protocol::AccessLevel;
use agentrun_protocol::JsonSchema;
use agentrun_protocol::ToolResult;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct CalcArgs {
    expression: String,
    #[serde(default)]
    precision: Option<u8>,
}

pub fn calc_tool() -> ToolEntry {
    let spec = ToolSpec {
        name: "calc".to_string(),
        description: "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses \
                      and unary minus."
            .to_string(),
        parameters: schema(),
    };
    ToolEntry::simple(spec, AccessLevel::Read, |args| async move {
        Ok(evaluate_call(args))
    })
}

fn schema() -> Value {
    serde_json::to_value(JsonSchema::object(vec![
        (
            "expression",
            JsonSchema::string("Arithmetic expression, e.g. \"2 + 2 * 10\""),
            true,
        ),
        (
            "precision",
            JsonSchema::integer("Decimal places to round the result to"),
            false,
        ),
    ]))
    .unwrap_or_default()
}

fn evaluate_call(args: Value) -> ToolResult {
    let args: CalcArgs = match serde_json::from_value(args) {
        Ok(args) => args,
        Err(e) => return ToolResult::error(format!("invalid calc arguments: {e}")),
    };
    match evaluate(&args.expression) {
        Ok(value) => ToolResult::ok(format_number(value, args.precision)),
        Err(e) => ToolResult::error(format!("cannot evaluate `{}`: {e}", args.expression)),
    }
}

fn format_number(value: f64, precision: Option<u8>) -> String {
    match precision {
        Some(p) => format!("{value:.prec$}", prec = p as usize),
        None => {
            if value.fract() == 0.0 && value.abs() < 1e15 {
                format!("{}", value as i64)
            } else {
                format!("{value}")
            }
        }
    }
}

/// Evaluate an expression to a float.
pub fn evaluate(expression: &str) -> Result<f64, String> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected token at position {}", parser.pos));
    }
    Ok(value)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '%' => {
                tokens.push(Token::Percent);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| format!("bad number literal `{literal}`"))?;
                tokens.push(Token::Number(number));
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expr := term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Token::Minus => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // term := power (('*' | '/' | '%') power)*
    fn term(&mut self) -> Result<f64, String> {
        let mut value = self.power()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.pos += 1;
                    value *= self.power()?;
                }
                Token::Slash => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    value /= divisor;
                }
                Token::Percent => {
                    self.pos += 1;
                    let divisor = self.power()?;
                    if divisor == 0.0 {
                        return Err("modulo by zero".to_string());
                    }
                    value %= divisor;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    // power := unary ('^' power)?   (right-associative)
    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.peek() == Some(Token::Caret) {
            self.pos += 1;
            let exponent = self.power()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // unary := '-' unary | atom
    fn unary(&mut self) -> Result<f64, String> {
        if self.peek() == Some(Token::Minus) {
            self.pos += 1;
            return Ok(-self.unary()?);
        }
        self.atom()
    }

    // atom := number | '(' expr ')'
    fn atom(&mut self) -> Result<f64, String> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                if self.bump() != Some(Token::RParen) {
                    return Err("missing closing parenthesis".to_string());
                }
                Ok(value)
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}
