//! Tokenizer for GUX spec text.
//!
//! Produces a flat token stream with byte spans. Anything outside the small
//! token vocabulary is kept as `Other` so widget arguments survive intact.

use crate::error::{Location, ParseError, ParseErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Number(String),
    /// Text of one `///` line, without the marker.
    Doc(String),
    Open(char),
    Close(char),
    Colon,
    Comma,
    Dot,
    Other(char),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if source[i..].starts_with("//") {
            let line_end = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
            if source[i..].starts_with("///") {
                let text = source[i + 3..line_end].trim().to_string();
                tokens.push(Token {
                    kind: TokenKind::Doc(text),
                    start,
                    end: line_end,
                });
            }
            i = line_end;
            continue;
        }

        let kind = match c {
            b'\'' | b'"' => {
                let Some((text, end)) = scan_string(source, i) else {
                    return Err(ParseError::new(
                        ParseErrorKind::UnbalancedDelimiters,
                        format!("unterminated string starting with {}", c as char),
                        Location::at(source, start),
                    ));
                };
                i = end;
                TokenKind::Str(text)
            }
            b'(' | b'[' | b'{' => {
                i += 1;
                TokenKind::Open(c as char)
            }
            b')' | b']' | b'}' => {
                i += 1;
                TokenKind::Close(c as char)
            }
            b':' => {
                i += 1;
                TokenKind::Colon
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'.' => {
                i += 1;
                TokenKind::Dot
            }
            b'-' if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                i = scan_number(bytes, i + 1);
                TokenKind::Number(source[start..i].to_string())
            }
            b'0'..=b'9' => {
                i = scan_number(bytes, i);
                TokenKind::Number(source[start..i].to_string())
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                TokenKind::Ident(source[start..i].to_string())
            }
            _ => {
                let ch = source[i..].chars().next().unwrap_or('\u{fffd}');
                i += ch.len_utf8();
                TokenKind::Other(ch)
            }
        };

        tokens.push(Token {
            kind,
            start,
            end: i,
        });
    }

    Ok(tokens)
}

/// String literal opening at `open`. Returns the unescaped body and the
/// offset just past the closing quote. `\x` stands for `x`, except the
/// usual `\n` and `\t`.
fn scan_string(source: &str, open: usize) -> Option<(String, usize)> {
    let quote = source[open..].chars().next()?;
    let mut text = String::new();
    let mut chars = source[open + 1..].char_indices();
    while let Some((offset, ch)) = chars.next() {
        match ch {
            '\\' => match chars.next()?.1 {
                'n' => text.push('\n'),
                't' => text.push('\t'),
                other => text.push(other),
            },
            c if c == quote => return Some((text, open + 1 + offset + 1)),
            c => text.push(c),
        }
    }
    None
}

fn scan_number(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i + 1 < bytes.len() && bytes[i] == b'.' && bytes[i + 1].is_ascii_digit() {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    i
}

/// Verify that every `(`, `[` and `{` is closed by its partner.
pub(crate) fn check_balanced(source: &str, tokens: &[Token]) -> Result<(), ParseError> {
    let mut stack: Vec<&Token> = Vec::new();
    for token in tokens {
        match token.kind {
            TokenKind::Open(_) => stack.push(token),
            TokenKind::Close(close) => {
                let expected = stack.pop().and_then(|open| match open.kind {
                    TokenKind::Open(o) => Some(matching(o)),
                    _ => None,
                });
                if expected != Some(close) {
                    return Err(ParseError::new(
                        ParseErrorKind::UnbalancedDelimiters,
                        match expected {
                            Some(e) => format!("found '{close}' where '{e}' was expected"),
                            None => format!("unexpected '{close}' with nothing open"),
                        },
                        Location::at(source, token.start),
                    ));
                }
            }
            _ => {}
        }
    }
    if let Some(open) = stack.pop() {
        let ch = match open.kind {
            TokenKind::Open(o) => o,
            _ => '(',
        };
        return Err(ParseError::new(
            ParseErrorKind::UnbalancedDelimiters,
            format!("'{ch}' is never closed"),
            Location::at(source, open.start),
        ));
    }
    Ok(())
}

fn matching(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}
