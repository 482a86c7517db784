// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A small expression compiler for attractor definitions such as
//! `z^2 + const` or `sin(z) * const`.
//!
//! The text is lexed and parsed once into a tree, constants are
//! folded, and the tree is turned into nested closures.  Nothing here
//! runs inside the iteration loop except the closures themselves.
//!
//! Grammar, loosest to tightest:
//!
//! ```text
//! sum     := product (('+' | '-') product)*
//! product := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := primary (('^' | '**') unary)?
//! primary := number | imaginary | name | name '(' sum ')' | '(' sum ')'
//! ```

use crate::error::{FractalError, Result};
use num::Complex;

/// The compiled form: (current value, parameter) -> next value.
pub type Compiled = Box<dyn Fn(Complex<f64>, Complex<f64>) -> Complex<f64> + Send + Sync>;

/// Values substituted for the names `a`, `b` and `c` at compile time.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Constants {
    /// Value of `a`.
    pub a: Complex<f64>,
    /// Value of `b`.
    pub b: Complex<f64>,
    /// Value of `c`.
    pub c: Complex<f64>,
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Real(f64),
    Imaginary(f64),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Open,
    Close,
    End,
}

fn invalid(position: usize, message: impl Into<String>) -> FractalError {
    FractalError::InvalidExpression {
        position,
        message: message.into(),
    }
}

fn lex(source: &str) -> Result<Vec<(usize, Token)>> {
    let bytes = source.as_bytes();
    let mut tokens = vec![];
    let mut pos = 0;
    while pos < bytes.len() {
        let ch = bytes[pos] as char;
        let start = pos;
        match ch {
            ' ' | '\t' | '\n' | '\r' => {
                pos += 1;
                continue;
            }
            '+' => tokens.push((start, Token::Plus)),
            '-' => tokens.push((start, Token::Minus)),
            '/' => tokens.push((start, Token::Slash)),
            '^' => tokens.push((start, Token::Caret)),
            '(' => tokens.push((start, Token::Open)),
            ')' => tokens.push((start, Token::Close)),
            '*' => {
                if bytes.get(pos + 1) == Some(&b'*') {
                    pos += 1;
                    tokens.push((start, Token::Caret));
                } else {
                    tokens.push((start, Token::Star));
                }
            }
            '0'..='9' | '.' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
                    pos += 1;
                }
                // exponent, as in 1e-3
                if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
                    let mut look = pos + 1;
                    if look < bytes.len() && (bytes[look] == b'+' || bytes[look] == b'-') {
                        look += 1;
                    }
                    if look < bytes.len() && bytes[look].is_ascii_digit() {
                        pos = look;
                        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                            pos += 1;
                        }
                    }
                }
                let text = &source[start..pos];
                let value: f64 = text
                    .parse()
                    .map_err(|_| invalid(start, format!("malformed number '{}'", text)))?;
                let imaginary = pos < bytes.len()
                    && (bytes[pos] == b'j' || bytes[pos] == b'i')
                    && !bytes
                        .get(pos + 1)
                        .map(|b| b.is_ascii_alphanumeric() || *b == b'_')
                        .unwrap_or(false);
                if imaginary {
                    pos += 1;
                    tokens.push((start, Token::Imaginary(value)));
                } else {
                    tokens.push((start, Token::Real(value)));
                }
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                tokens.push((start, Token::Name(source[start..pos].to_string())));
                continue;
            }
            other => return Err(invalid(start, format!("unexpected character '{}'", other))),
        }
        pos += 1;
    }
    tokens.push((source.len(), Token::End));
    Ok(tokens)
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Var {
    Z,
    Param,
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Ln,
    Sqrt,
    Abs,
    Conj,
    Re,
    Im,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "conj" | "conjugate" => Func::Conj,
            "re" => Func::Re,
            "im" => Func::Im,
            _ => return None,
        })
    }

    fn apply(self, v: Complex<f64>) -> Complex<f64> {
        match self {
            Func::Sin => v.sin(),
            Func::Cos => v.cos(),
            Func::Tan => v.tan(),
            Func::Sinh => v.sinh(),
            Func::Cosh => v.cosh(),
            Func::Tanh => v.tanh(),
            Func::Exp => v.exp(),
            Func::Ln => v.ln(),
            Func::Sqrt => v.sqrt(),
            Func::Abs => Complex::new(v.norm(), 0.0),
            Func::Conj => v.conj(),
            Func::Re => Complex::new(v.re, 0.0),
            Func::Im => Complex::new(v.im, 0.0),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Clone, Debug, PartialEq)]
enum Expr {
    Const(Complex<f64>),
    Var(Var),
    Neg(Box<Expr>),
    Call(Func, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

struct Parser<'a> {
    tokens: &'a [(usize, Token)],
    pos: usize,
    constants: Constants,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].1
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].0
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].1.clone();
        if token != Token::End {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<()> {
        if *self.peek() == token {
            self.advance();
            Ok(())
        } else {
            Err(invalid(self.offset(), format!("expected {}", what)))
        }
    }

    fn sum(&mut self) -> Result<Expr> {
        let mut left = self.product()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.product()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn product(&mut self) -> Result<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Token::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if *self.peek() == Token::Caret {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        let at = self.offset();
        match self.advance() {
            Token::Real(v) => Ok(Expr::Const(Complex::new(v, 0.0))),
            Token::Imaginary(v) => Ok(Expr::Const(Complex::new(0.0, v))),
            Token::Open => {
                let inner = self.sum()?;
                self.expect(Token::Close, "')'")?;
                Ok(inner)
            }
            Token::Name(name) => {
                if let Some(func) = Func::lookup(&name) {
                    self.expect(Token::Open, &format!("'(' after {}", name))?;
                    let arg = self.sum()?;
                    self.expect(Token::Close, "')'")?;
                    return Ok(Expr::Call(func, Box::new(arg)));
                }
                match name.as_str() {
                    "z" => Ok(Expr::Var(Var::Z)),
                    "const" | "p" => Ok(Expr::Var(Var::Param)),
                    "a" => Ok(Expr::Const(self.constants.a)),
                    "b" => Ok(Expr::Const(self.constants.b)),
                    "c" => Ok(Expr::Const(self.constants.c)),
                    "i" | "j" | "I" => Ok(Expr::Const(Complex::new(0.0, 1.0))),
                    "pi" => Ok(Expr::Const(Complex::new(std::f64::consts::PI, 0.0))),
                    "e" => Ok(Expr::Const(Complex::new(std::f64::consts::E, 0.0))),
                    _ => Err(invalid(at, format!("unknown name '{}'", name))),
                }
            }
            Token::End => Err(invalid(at, "unexpected end of expression")),
            other => Err(invalid(at, format!("unexpected {:?}", other))),
        }
    }
}

/// Raises `base` to an integer power by repeated squaring.
pub fn int_pow(base: Complex<f64>, exponent: i32) -> Complex<f64> {
    let mut result = Complex::new(1.0, 0.0);
    let mut square = base;
    let mut n = exponent.unsigned_abs();
    while n > 0 {
        if n & 1 == 1 {
            result = result * square;
        }
        square = square * square;
        n >>= 1;
    }
    if exponent < 0 {
        result.inv()
    } else {
        result
    }
}

fn as_small_integer(v: Complex<f64>) -> Option<i32> {
    if v.im == 0.0 && v.re.fract() == 0.0 && v.re.abs() <= 64.0 {
        Some(v.re as i32)
    } else {
        None
    }
}

fn power(base: Complex<f64>, exponent: Complex<f64>) -> Complex<f64> {
    match as_small_integer(exponent) {
        Some(n) => int_pow(base, n),
        None if exponent.im == 0.0 => base.powf(exponent.re),
        None => base.powc(exponent),
    }
}

fn binary(op: BinOp, l: Complex<f64>, r: Complex<f64>) -> Complex<f64> {
    match op {
        BinOp::Add => l + r,
        BinOp::Sub => l - r,
        BinOp::Mul => l * r,
        BinOp::Div => l / r,
        BinOp::Pow => power(l, r),
    }
}

fn fold(expr: Expr) -> Expr {
    match expr {
        Expr::Neg(inner) => match fold(*inner) {
            Expr::Const(v) => Expr::Const(-v),
            other => Expr::Neg(Box::new(other)),
        },
        Expr::Call(func, inner) => match fold(*inner) {
            Expr::Const(v) => Expr::Const(func.apply(v)),
            other => Expr::Call(func, Box::new(other)),
        },
        Expr::Binary(op, l, r) => match (fold(*l), fold(*r)) {
            (Expr::Const(l), Expr::Const(r)) => Expr::Const(binary(op, l, r)),
            (l, r) => Expr::Binary(op, Box::new(l), Box::new(r)),
        },
        leaf => leaf,
    }
}

fn emit(expr: Expr) -> Compiled {
    match expr {
        Expr::Const(v) => Box::new(move |_, _| v),
        Expr::Var(Var::Z) => Box::new(|z, _| z),
        Expr::Var(Var::Param) => Box::new(|_, p| p),
        Expr::Neg(inner) => {
            let inner = emit(*inner);
            Box::new(move |z, p| -inner(z, p))
        }
        Expr::Call(func, inner) => {
            let inner = emit(*inner);
            Box::new(move |z, p| func.apply(inner(z, p)))
        }
        Expr::Binary(BinOp::Pow, base, exponent) => {
            let base = emit(*base);
            match *exponent {
                Expr::Const(e) => match as_small_integer(e) {
                    Some(2) => Box::new(move |z, p| {
                        let v = base(z, p);
                        v * v
                    }),
                    Some(n) => Box::new(move |z, p| int_pow(base(z, p), n)),
                    None if e.im == 0.0 => Box::new(move |z, p| base(z, p).powf(e.re)),
                    None => Box::new(move |z, p| base(z, p).powc(e)),
                },
                exponent => {
                    let exponent = emit(exponent);
                    Box::new(move |z, p| power(base(z, p), exponent(z, p)))
                }
            }
        }
        Expr::Binary(op, l, r) => {
            let l = emit(*l);
            let r = emit(*r);
            match op {
                BinOp::Add => Box::new(move |z, p| l(z, p) + r(z, p)),
                BinOp::Sub => Box::new(move |z, p| l(z, p) - r(z, p)),
                BinOp::Mul => Box::new(move |z, p| l(z, p) * r(z, p)),
                BinOp::Div => Box::new(move |z, p| l(z, p) / r(z, p)),
                BinOp::Pow => Box::new(move |z, p| power(l(z, p), r(z, p))),
            }
        }
    }
}

/// Parses and compiles `source`, substituting `constants` for `a`,
/// `b` and `c`.
pub fn compile(source: &str, constants: Constants) -> Result<Compiled> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        constants,
    };
    let tree = parser.sum()?;
    if *parser.peek() != Token::End {
        return Err(invalid(parser.offset(), "trailing input"));
    }
    Ok(emit(fold(tree)))
}
