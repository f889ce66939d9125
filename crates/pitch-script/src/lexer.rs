//! Tokenizer for strategy source text.
//!
//! The lexer turns source text into a flat vector of [`Token`]s, each tagged
//! with the line it started on so later stages can report useful positions.

use crate::error::{ScriptError, ScriptResult};

/// Reserved words of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    True,
    False,
    Null,
    Undefined,
    Throw,
    Typeof,
}

impl Keyword {
    fn from_ident(ident: &str) -> Option<Self> {
        Some(match ident {
            "var" => Self::Var,
            "let" => Self::Let,
            "const" => Self::Const,
            "function" => Self::Function,
            "return" => Self::Return,
            "if" => Self::If,
            "else" => Self::Else,
            "while" => Self::While,
            "for" => Self::For,
            "break" => Self::Break,
            "continue" => Self::Continue,
            "true" => Self::True,
            "false" => Self::False,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            "throw" => Self::Throw,
            "typeof" => Self::Typeof,
            _ => return None,
        })
    }
}

/// Kinds of token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),
    /// Operators and punctuation, stored as their source spelling.
    Punct(&'static str),
    Eof,
}

/// A token plus the line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
}

/// Punctuators, longest first so greedy matching picks `===` before `==`.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=", "%=",
    "{", "}", "(", ")", "[", "]", ";", ",", ".", ":", "?", "+", "-", "*", "/", "%", "<", ">",
    "=", "!",
];

/// Splits `source` into tokens. The final token is always [`TokenKind::Eof`].
pub fn tokenize(source: &str) -> ScriptResult<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line = 1u32;

    while pos < bytes.len() {
        let c = bytes[pos];

        if c == b'\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        // Comments
        if c == b'/' && bytes.get(pos + 1) == Some(&b'/') {
            while pos < bytes.len() && bytes[pos] != b'\n' {
                pos += 1;
            }
            continue;
        }
        if c == b'/' && bytes.get(pos + 1) == Some(&b'*') {
            let start_line = line;
            pos += 2;
            loop {
                match bytes.get(pos) {
                    None => return Err(ScriptError::syntax(start_line, "unterminated comment")),
                    Some(b'*') if bytes.get(pos + 1) == Some(&b'/') => {
                        pos += 2;
                        break;
                    }
                    Some(b'\n') => {
                        line += 1;
                        pos += 1;
                    }
                    Some(_) => pos += 1,
                }
            }
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(pos + 1).is_some_and(u8::is_ascii_digit)) {
            let (value, len) = lex_number(&source[pos..], line)?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                line,
            });
            pos += len;
            continue;
        }

        if c == b'"' || c == b'\'' {
            let (value, len, newlines) = lex_string(&source[pos..], line)?;
            tokens.push(Token {
                kind: TokenKind::Str(value),
                line,
            });
            pos += len;
            line += newlines;
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            let start = pos;
            while pos < bytes.len()
                && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_' || bytes[pos] == b'$')
            {
                pos += 1;
            }
            let word = &source[start..pos];
            let kind = match Keyword::from_ident(word) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => TokenKind::Ident(word.to_string()),
            };
            tokens.push(Token { kind, line });
            continue;
        }

        let rest = &source[pos..];
        match PUNCTUATORS.iter().find(|p| rest.starts_with(**p)) {
            Some(punct) => {
                tokens.push(Token {
                    kind: TokenKind::Punct(punct),
                    line,
                });
                pos += punct.len();
            }
            None => {
                let ch = rest.chars().next().unwrap_or('?');
                return Err(ScriptError::syntax(line, format!("unexpected character `{ch}`")));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    Ok(tokens)
}

fn lex_number(text: &str, line: u32) -> ScriptResult<(f64, usize)> {
    let bytes = text.as_bytes();
    let mut len = 0;
    let mut seen_dot = false;
    let mut seen_exp = false;

    while len < bytes.len() {
        let c = bytes[len];
        if c.is_ascii_digit() {
            len += 1;
        } else if c == b'.' && !seen_dot && !seen_exp {
            seen_dot = true;
            len += 1;
        } else if (c == b'e' || c == b'E') && !seen_exp && len > 0 {
            seen_exp = true;
            len += 1;
            if matches!(bytes.get(len), Some(b'+' | b'-')) {
                len += 1;
            }
        } else {
            break;
        }
    }

    if bytes.get(len).is_some_and(|c| c.is_ascii_alphabetic() || *c == b'_') {
        return Err(ScriptError::syntax(line, "identifier starts immediately after number"));
    }

    text[..len]
        .parse::<f64>()
        .map(|value| (value, len))
        .map_err(|_| ScriptError::syntax(line, format!("malformed number `{}`", &text[..len])))
}

/// Returns the unescaped string, the consumed byte length, and how many
/// newlines the literal spanned.
fn lex_string(text: &str, line: u32) -> ScriptResult<(String, usize, u32)> {
    let mut chars = text.char_indices();
    let Some((_, quote)) = chars.next() else {
        return Err(ScriptError::syntax(line, "expected string"));
    };

    let mut out = String::new();
    let mut newlines = 0;
    while let Some((idx, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((out, idx + c.len_utf8(), newlines)),
            '\n' => {
                return Err(ScriptError::syntax(line + newlines, "unterminated string literal"));
            }
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\n' => newlines += 1,
                    other => out.push(other),
                }
            }
            other => out.push(other),
        }
    }
    Err(ScriptError::syntax(line, "unterminated string literal"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn numbers_and_identifiers() {
        assert_eq!(
            kinds("x1 = 2.5e2;"),
            vec![
                TokenKind::Ident("x1".into()),
                TokenKind::Punct("="),
                TokenKind::Number(250.0),
                TokenKind::Punct(";"),
                TokenKind::Eof,
            ]
        );
        assert_eq!(kinds(".5")[0], TokenKind::Number(0.5));
    }

    #[test]
    fn greedy_punctuators() {
        assert_eq!(
            kinds("a === b !== c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Punct("==="),
                TokenKind::Ident("b".into()),
                TokenKind::Punct("!=="),
                TokenKind::Ident("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_are_recognised() {
        assert_eq!(kinds("function")[0], TokenKind::Keyword(Keyword::Function));
        assert_eq!(kinds("functional")[0], TokenKind::Ident("functional".into()));
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(kinds(r#""a\"b""#)[0], TokenKind::Str("a\"b".into()));
        assert_eq!(kinds("'it\\'s'")[0], TokenKind::Str("it's".into()));
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let tokens = tokenize("// one\n/* two\nthree */ x").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("x".into()));
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn errors_report_line() {
        let err = tokenize("a\nb\n#").unwrap_err();
        assert_eq!(
            err,
            ScriptError::Syntax {
                line: 3,
                message: "unexpected character `#`".into()
            }
        );
        assert!(tokenize("'open").is_err());
        assert!(tokenize("/* open").is_err());
        assert!(tokenize("12abc").is_err());
    }
}
