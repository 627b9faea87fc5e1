//! Arithmetic mapping expressions: a small tree of literals, column
//! references, and binary operators, parsed once per mapping rule and
//! evaluated per row. Operators chain left-to-right without precedence;
//! unresolved references and impossible operations evaluate to zero.

use anyhow::{Result, bail};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn apply(self, left: Decimal, right: Decimal) -> Decimal {
        let result = match self {
            BinaryOp::Add => left.checked_add(right),
            BinaryOp::Sub => left.checked_sub(right),
            BinaryOp::Mul => left.checked_mul(right),
            BinaryOp::Div => left.checked_div(right),
        };
        result.unwrap_or(Decimal::ZERO)
    }

    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Decimal),
    Column(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Parses `{Quantity} * {UnitPrice} + 0.5` style input. Column
    /// references sit in braces; bare numbers are literals.
    pub fn parse(input: &str) -> Result<Expr> {
        let tokens = tokenize(input)?;
        parse_tokens(tokens, input)
    }

    pub fn column(name: &str) -> Expr {
        Expr::Column(name.to_string())
    }

    pub fn product(left: &str, right: &str) -> Expr {
        Expr::Binary {
            op: BinaryOp::Mul,
            left: Box::new(Expr::column(left)),
            right: Box::new(Expr::column(right)),
        }
    }

    pub fn product_plus(left: &str, right: &str, addend: &str) -> Expr {
        Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::product(left, right)),
            right: Box::new(Expr::column(addend)),
        }
    }

    /// Column names referenced anywhere in the tree.
    pub fn references(&self) -> Vec<&str> {
        fn walk<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
            match expr {
                Expr::Literal(_) => {}
                Expr::Column(name) => out.push(name),
                Expr::Binary { left, right, .. } => {
                    walk(left, out);
                    walk(right, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    pub fn evaluate(&self, resolve: &dyn Fn(&str) -> Option<Decimal>) -> Decimal {
        match self {
            Expr::Literal(value) => *value,
            Expr::Column(name) => resolve(name).unwrap_or(Decimal::ZERO),
            Expr::Binary { op, left, right } => {
                op.apply(left.evaluate(resolve), right.evaluate(resolve))
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Literal(Decimal),
    Column(String),
    Op(BinaryOp),
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                let mut name = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    bail!("Unclosed column reference in expression '{input}'");
                }
                let name = name.trim().to_string();
                if name.is_empty() {
                    bail!("Empty column reference in expression '{input}'");
                }
                tokens.push(Token::Column(name));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Op(BinaryOp::Add));
            }
            '*' => {
                chars.next();
                tokens.push(Token::Op(BinaryOp::Mul));
            }
            '/' => {
                chars.next();
                tokens.push(Token::Op(BinaryOp::Div));
            }
            '-' => {
                // Operator after an operand, sign of a literal otherwise.
                if matches!(
                    tokens.last(),
                    Some(Token::Literal(_)) | Some(Token::Column(_))
                ) {
                    chars.next();
                    tokens.push(Token::Op(BinaryOp::Sub));
                } else {
                    tokens.push(read_number(&mut chars, input)?);
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                tokens.push(read_number(&mut chars, input)?);
            }
            other => bail!("Unexpected character '{other}' in expression '{input}'"),
        }
    }
    Ok(tokens)
}

fn read_number(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    input: &str,
) -> Result<Token> {
    let mut buffer = String::new();
    if chars.peek() == Some(&'-') {
        buffer.push('-');
        chars.next();
    }
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '.' {
            buffer.push(c);
            chars.next();
        } else {
            break;
        }
    }
    match buffer.parse::<Decimal>() {
        Ok(value) => Ok(Token::Literal(value)),
        Err(_) => bail!("Invalid numeric literal '{buffer}' in expression '{input}'"),
    }
}

fn parse_tokens(tokens: Vec<Token>, input: &str) -> Result<Expr> {
    let mut iter = tokens.into_iter();
    let mut expr = match iter.next() {
        Some(Token::Literal(value)) => Expr::Literal(value),
        Some(Token::Column(name)) => Expr::Column(name),
        Some(Token::Op(op)) => bail!(
            "Expression '{input}' begins with the operator '{}'",
            op.symbol()
        ),
        None => bail!("Expression is empty"),
    };
    loop {
        match iter.next() {
            None => return Ok(expr),
            Some(Token::Op(op)) => {
                let right = match iter.next() {
                    Some(Token::Literal(value)) => Expr::Literal(value),
                    Some(Token::Column(name)) => Expr::Column(name),
                    _ => bail!(
                        "Operator '{}' lacks a right operand in expression '{input}'",
                        op.symbol()
                    ),
                };
                expr = Expr::Binary {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                };
            }
            Some(_) => bail!("Missing operator between operands in expression '{input}'"),
        }
    }
}
