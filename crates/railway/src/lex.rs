//! The Railway tokeniser.
//!
//! Newlines are significant (they terminate statements); consecutive
//! newlines collapse into one token. Comments are delimited by `$ … $`
//! and may span lines, and a backslash before a line break continues
//! the statement. Number literals may carry a denominator (`3/4` is a
//! single token), so dividing two literals needs spaces around the `/`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Name,
    Number,
    Str,
    Newline,
    End,
    // Keywords
    Import,
    As,
    Global,
    Let,
    Unlet,
    Func,
    Return,
    Println,
    Print,
    If,
    Fi,
    Else,
    Loop,
    Pool,
    For,
    Rof,
    Call,
    Uncall,
    Do,
    Undo,
    Yield,
    Swap,
    Push,
    Pop,
    Try,
    Catch,
    Yrt,
    Promote,
    In,
    To,
    By,
    Tensor,
    Barrier,
    Mutex,
    Xetum,
    /// `TID`
    ThreadId,
    /// `#TID`
    NumThreads,
    // Symbols
    SwapArrow,
    RightArrow,
    Leq,
    Geq,
    NotEq,
    EqEq,
    IDivEq,
    PowEq,
    AddEq,
    SubEq,
    MulEq,
    DivEq,
    ModEq,
    XorEq,
    OrEq,
    AndEq,
    IDiv,
    Pow,
    Less,
    Greater,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Pipe,
    Amp,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Hash,
    Bang,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub col: u32,
}

/// A character the tokeniser cannot place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unexpected character at line {}, col {}", self.line, self.col)
    }
}

impl std::error::Error for LexError {}

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "global" => TokenKind::Global,
        "let" => TokenKind::Let,
        "unlet" => TokenKind::Unlet,
        "func" => TokenKind::Func,
        "return" => TokenKind::Return,
        "println" => TokenKind::Println,
        "print" => TokenKind::Print,
        "if" => TokenKind::If,
        "fi" => TokenKind::Fi,
        "else" => TokenKind::Else,
        "loop" => TokenKind::Loop,
        "pool" => TokenKind::Pool,
        "for" => TokenKind::For,
        "rof" => TokenKind::Rof,
        "call" => TokenKind::Call,
        "uncall" => TokenKind::Uncall,
        "do" => TokenKind::Do,
        "undo" => TokenKind::Undo,
        "yield" => TokenKind::Yield,
        "swap" => TokenKind::Swap,
        "push" => TokenKind::Push,
        "pop" => TokenKind::Pop,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "yrt" => TokenKind::Yrt,
        "promote" => TokenKind::Promote,
        "in" => TokenKind::In,
        "to" => TokenKind::To,
        "by" => TokenKind::By,
        "tensor" => TokenKind::Tensor,
        "barrier" => TokenKind::Barrier,
        "mutex" => TokenKind::Mutex,
        "xetum" => TokenKind::Xetum,
        "TID" => TokenKind::ThreadId,
        _ => return None,
    })
}

fn is_name_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_name_continue(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.'
}

pub(crate) fn tokenise(source: &str) -> Result<Vec<Token>, LexError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0usize;
    let mut line = 1u32;
    let mut col = 0u32;
    let mut skip_newline = true;

    let mut push = |kind: TokenKind, text: &str, line: u32, col: u32| {
        tokens.push(Token {
            kind,
            text: text.to_owned(),
            line,
            col,
        });
    };

    while pos < bytes.len() {
        let byte = bytes[pos];

        if byte == b'\n' {
            if !skip_newline {
                push(TokenKind::Newline, "\n", line, col);
            }
            skip_newline = true;
            line += 1;
            col = 0;
            pos += 1;
            continue;
        }

        if byte == b' ' || byte == b'\t' || byte == b'\r' || byte == 0x0c {
            pos += 1;
            col += 1;
            continue;
        }

        // $ … $ comments, possibly spanning lines.
        if byte == b'$' {
            let start = pos;
            pos += 1;
            while pos < bytes.len() && bytes[pos] != b'$' {
                if bytes[pos] == b'\n' {
                    line += 1;
                    col = 0;
                }
                pos += 1;
            }
            if pos < bytes.len() {
                pos += 1;
            }
            col += (pos - start) as u32;
            continue;
        }

        // A backslash continues the statement over a line break.
        if byte == b'\\' {
            let mut ahead = pos + 1;
            while ahead < bytes.len() && matches!(bytes[ahead], b' ' | b'\t' | b'\r' | 0x0c) {
                ahead += 1;
            }
            if ahead < bytes.len() && bytes[ahead] == b'\n' {
                pos = ahead + 1;
                line += 1;
                col = 0;
                continue;
            }
            return Err(LexError { line, col });
        }

        if is_name_start(byte) {
            let start = pos;
            while pos < bytes.len() && is_name_continue(bytes[pos]) {
                pos += 1;
            }
            let text = &source[start..pos];
            let kind = keyword(text).unwrap_or(TokenKind::Name);
            push(kind, text, line, col);
            col += (pos - start) as u32;
            skip_newline = false;
            continue;
        }

        if byte.is_ascii_digit() {
            let start = pos;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
            // A denominator is part of the literal: `3/4` is one token.
            if pos + 1 < bytes.len() && bytes[pos] == b'/' && bytes[pos + 1].is_ascii_digit() {
                pos += 1;
                while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                    pos += 1;
                }
            }
            push(TokenKind::Number, &source[start..pos], line, col);
            col += (pos - start) as u32;
            skip_newline = false;
            continue;
        }

        if byte == b'"' || byte == b'\'' {
            let quote = byte;
            let start = pos;
            pos += 1;
            let content_start = pos;
            while pos < bytes.len() && bytes[pos] != quote {
                if bytes[pos] == b'\n' {
                    line += 1;
                    col = 0;
                }
                pos += 1;
            }
            if pos >= bytes.len() {
                return Err(LexError { line, col });
            }
            push(TokenKind::Str, &source[content_start..pos], line, col);
            pos += 1;
            col += (pos - start) as u32;
            skip_newline = false;
            continue;
        }

        // `#TID` is its own token; a lone `#` is the length operator.
        if byte == b'#'
            && source[pos..].len() >= 4
            && &source[pos + 1..pos + 4] == "TID"
            && bytes.get(pos + 4).map_or(true, |b| !is_name_continue(*b))
        {
            push(TokenKind::NumThreads, "#TID", line, col);
            pos += 4;
            col += 4;
            skip_newline = false;
            continue;
        }

        // Longest-match symbols.
        let symbol = [
            ("<=>", TokenKind::SwapArrow),
            ("//=", TokenKind::IDivEq),
            ("**=", TokenKind::PowEq),
            ("=>", TokenKind::RightArrow),
            ("<=", TokenKind::Leq),
            (">=", TokenKind::Geq),
            ("!=", TokenKind::NotEq),
            ("==", TokenKind::EqEq),
            ("+=", TokenKind::AddEq),
            ("-=", TokenKind::SubEq),
            ("*=", TokenKind::MulEq),
            ("/=", TokenKind::DivEq),
            ("%=", TokenKind::ModEq),
            ("^=", TokenKind::XorEq),
            ("|=", TokenKind::OrEq),
            ("&=", TokenKind::AndEq),
            ("//", TokenKind::IDiv),
            ("**", TokenKind::Pow),
            ("<", TokenKind::Less),
            (">", TokenKind::Greater),
            ("=", TokenKind::Assign),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("^", TokenKind::Caret),
            ("|", TokenKind::Pipe),
            ("&", TokenKind::Amp),
            ("(", TokenKind::LParen),
            (")", TokenKind::RParen),
            ("[", TokenKind::LBracket),
            ("]", TokenKind::RBracket),
            ("{", TokenKind::LBrace),
            ("}", TokenKind::RBrace),
            (",", TokenKind::Comma),
            (".", TokenKind::Dot),
            ("#", TokenKind::Hash),
            ("!", TokenKind::Bang),
        ]
        .iter()
        .find(|(text, _)| source[pos..].starts_with(text));

        match symbol {
            Some((text, kind)) => {
                push(*kind, text, line, col);
                pos += text.len();
                col += text.len() as u32;
                skip_newline = false;
            }
            None => return Err(LexError { line, col }),
        }
    }

    if !skip_newline {
        push(TokenKind::Newline, "\n", line, col);
    }
    push(TokenKind::End, "", line, col);
    Ok(tokens)
}
