//! Lexer and recursive-descent parser for filter expressions.
//!
//! Precedence, loosest first: `|`/`or`, `&`/`and`, `~`/`not`, comparisons,
//! method calls. Both `col("x")` and `pl.col("x")` are accepted as column
//! references.

use super::{CmpOp, Expr, Pattern, StrFunc};
use crate::models::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Cmp(CmpOp),
    Amp,
    Pipe,
    Tilde,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Int(i) => write!(f, "{}", i),
            Token::Cmp(op) => write!(f, "'{}'", op.symbol()),
            Token::Amp => f.write_str("'&'"),
            Token::Pipe => f.write_str("'|'"),
            Token::Tilde => f.write_str("'~'"),
            Token::Dot => f.write_str("'.'"),
            Token::Comma => f.write_str("','"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::LBracket => f.write_str("'['"),
            Token::RBracket => f.write_str("']'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(usize, Token)>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Err(format!("unterminated string starting at {}", start)),
                        Some(&ch) if ch == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            let escaped = match chars.get(i + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some('0') => '\0',
                                Some(&other) => other,
                                None => {
                                    return Err(format!(
                                        "unterminated string starting at {}",
                                        start
                                    ))
                                }
                            };
                            s.push(escaped);
                            i += 2;
                        }
                        Some(&ch) => {
                            s.push(ch);
                            i += 1;
                        }
                    }
                }
                tokens.push((start, Token::Str(s)));
                continue;
            }
            c if c.is_ascii_digit()
                || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().filter(|&&d| d != '_').collect();
                let n = text
                    .parse::<i64>()
                    .map_err(|e| format!("invalid integer '{}' at {}: {}", text, start, e))?;
                tokens.push((start, Token::Int(n)));
                continue;
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push((start, Token::Ident(chars[start..i].iter().collect())));
                continue;
            }
            _ => {}
        }

        let next = chars.get(i + 1).copied();
        let (tok, width) = match (c, next) {
            ('=', Some('=')) => (Token::Cmp(CmpOp::Eq), 2),
            ('!', Some('=')) => (Token::Cmp(CmpOp::Ne), 2),
            ('<', Some('=')) => (Token::Cmp(CmpOp::Le), 2),
            ('>', Some('=')) => (Token::Cmp(CmpOp::Ge), 2),
            ('<', _) => (Token::Cmp(CmpOp::Lt), 1),
            ('>', _) => (Token::Cmp(CmpOp::Gt), 1),
            ('&', _) => (Token::Amp, 1),
            ('|', _) => (Token::Pipe, 1),
            ('~', _) => (Token::Tilde, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            _ => return Err(format!("unexpected character '{}' at {}", c, start)),
        };
        tokens.push((start, tok));
        i += width;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

/// Parse a filter expression.
///
/// The result is not type checked; see [`Expr::check`].
pub fn parse(input: &str) -> Result<Expr, String> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.chars().count(),
    };
    let expr = parser.parse_or()?;
    if let Some((at, tok)) = parser.tokens.get(parser.pos) {
        return Err(format!("unexpected {} at {}", tok, at));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == word)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|(at, _)| *at).unwrap_or(self.end)
    }

    fn unexpected(&self, expected: &str) -> String {
        match self.tokens.get(self.pos) {
            Some((at, tok)) => format!("expected {}, found {} at {}", expected, tok, at),
            None => format!("expected {}, found end of input", expected),
        }
    }

    fn expect(&mut self, tok: Token) -> Result<(), String> {
        if self.peek() == Some(&tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&tok.to_string()))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Pipe) || self.peek_ident("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        let mut left = self.parse_not()?;
        while self.peek() == Some(&Token::Amp) || self.peek_ident("and") {
            self.pos += 1;
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, String> {
        if self.peek() == Some(&Token::Tilde) || self.peek_ident("not") {
            self.pos += 1;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, String> {
        let left = self.parse_postfix()?;
        if let Some(Token::Cmp(op)) = self.peek() {
            let op = *op;
            self.pos += 1;
            let right = self.parse_postfix()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_postfix(&mut self) -> Result<Expr, String> {
        let mut expr = self.parse_primary()?;
        while self.peek() == Some(&Token::Dot) {
            self.pos += 1;
            expr = self.parse_method(expr)?;
        }
        Ok(expr)
    }

    fn parse_method(&mut self, target: Expr) -> Result<Expr, String> {
        let at = self.position();
        let name = match self.peek() {
            Some(Token::Ident(name)) => name.clone(),
            _ => return Err(self.unexpected("method name")),
        };
        self.pos += 1;
        let target = Box::new(target);

        match name.as_str() {
            "str" => {
                self.expect(Token::Dot)?;
                let fn_at = self.position();
                let func_name = match self.peek() {
                    Some(Token::Ident(n)) => n.clone(),
                    _ => return Err(self.unexpected("str function")),
                };
                self.pos += 1;
                self.expect(Token::LParen)?;
                let func = match func_name.as_str() {
                    "starts_with" => StrFunc::StartsWith(self.string_arg()?),
                    "ends_with" => StrFunc::EndsWith(self.string_arg()?),
                    "contains" => {
                        let pattern = self.string_arg()?;
                        StrFunc::Contains(
                            Pattern::new(&pattern)
                                .map_err(|e| format!("invalid regex {:?}: {}", pattern, e))?,
                        )
                    }
                    "to_lowercase" => StrFunc::ToLowercase,
                    "to_uppercase" => StrFunc::ToUppercase,
                    "len_chars" => StrFunc::LenChars,
                    other => return Err(format!("unknown function 'str.{}' at {}", other, fn_at)),
                };
                self.expect(Token::RParen)?;
                Ok(Expr::Str { func, target })
            }
            "is_in" => {
                self.expect(Token::LParen)?;
                self.expect(Token::LBracket)?;
                let mut values = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    loop {
                        values.push(self.literal()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.pos += 1;
                            if self.peek() == Some(&Token::RBracket) {
                                break;
                            }
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RBracket)?;
                self.expect(Token::RParen)?;
                Ok(Expr::IsIn { target, values })
            }
            "is_between" => {
                self.expect(Token::LParen)?;
                let low = self.literal()?;
                self.expect(Token::Comma)?;
                let high = self.literal()?;
                self.expect(Token::RParen)?;
                Ok(Expr::IsBetween { target, low, high })
            }
            "not_" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Expr::Not(target))
            }
            "is_null" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Expr::IsNull(target))
            }
            "is_not_null" => {
                self.expect(Token::LParen)?;
                self.expect(Token::RParen)?;
                Ok(Expr::IsNotNull(target))
            }
            other => Err(format!("unknown method '{}' at {}", other, at)),
        }
    }

    fn string_arg(&mut self) -> Result<String, String> {
        match self.peek() {
            Some(Token::Str(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.unexpected("string literal")),
        }
    }

    fn literal(&mut self) -> Result<Value, String> {
        let value = match self.peek() {
            Some(Token::Str(s)) => Value::Str(s.clone()),
            Some(Token::Int(n)) => Value::Int(*n),
            Some(Token::Ident(w)) => match w.as_str() {
                "true" | "True" => Value::Bool(true),
                "false" | "False" => Value::Bool(false),
                "null" | "None" => Value::Null,
                _ => return Err(self.unexpected("literal")),
            },
            _ => return Err(self.unexpected("literal")),
        };
        self.pos += 1;
        Ok(value)
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Str(_)) | Some(Token::Int(_)) => Ok(Expr::Literal(self.literal()?)),
            Some(Token::Ident(word)) => {
                let at = self.position();
                match word.as_str() {
                    "true" | "True" | "false" | "False" | "null" | "None" => {
                        Ok(Expr::Literal(self.literal()?))
                    }
                    "pl" => {
                        self.pos += 1;
                        self.expect(Token::Dot)?;
                        self.parse_call()
                    }
                    "col" | "lit" => self.parse_call(),
                    other => Err(format!("unknown identifier '{}' at {}", other, at)),
                }
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    fn parse_call(&mut self) -> Result<Expr, String> {
        let at = self.position();
        let name = match self.peek() {
            Some(Token::Ident(f)) => f.clone(),
            _ => return Err(self.unexpected("'col' or 'lit'")),
        };
        self.pos += 1;
        match name.as_str() {
            "col" => {
                self.expect(Token::LParen)?;
                let name = self.string_arg()?;
                self.expect(Token::RParen)?;
                Ok(Expr::Column(name))
            }
            "lit" => {
                self.expect(Token::LParen)?;
                let value = self.literal()?;
                self.expect(Token::RParen)?;
                Ok(Expr::Literal(value))
            }
            other => Err(format!("unknown function '{}' at {}", other, at)),
        }
    }
}
