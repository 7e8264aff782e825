use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub(crate) struct Lexer<'src> {
    source: &'src [u8],
    file_id: u16,
    pos: usize,
    end: usize,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    pub(crate) fn new(source: &'src str, file_id: u16) -> Self {
        Self::new_in_range(source, file_id, 0, source.len())
    }

    /// Create a lexer over `source[start..end]` that still reports spans as
    /// absolute offsets into `source`. Used to re-read a single definition
    /// out of a larger file.
    pub(crate) fn new_in_range(source: &'src str, file_id: u16, start: usize, end: usize) -> Self {
        Self {
            source: source.as_bytes(),
            file_id,
            pos: start.min(source.len()),
            end: end.min(source.len()),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn tokenize(mut self) -> (Vec<Spanned<Lexeme>>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn next_token(&mut self) -> Spanned<Lexeme> {
        loop {
            self.skip_whitespace_and_comments();

            if self.pos >= self.end {
                return self.make_token(Lexeme::Eof, self.end, self.end);
            }

            let start = self.pos;
            let ch = self.source[self.pos];

            if is_ident_start(ch) {
                return self.scan_ident_or_keyword();
            }

            if ch.is_ascii_digit() {
                return self.scan_number();
            }

            if let Some(tok) = self.scan_symbol(start) {
                return tok;
            }
            // scan_symbol returned None → error was recorded, try again
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.pos < self.end && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            if self.pos + 1 < self.end
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.end && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            break;
        }
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.end && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = self.text(start, self.pos);
        let token = Lexeme::from_keyword(&text).unwrap_or(Lexeme::Ident(text));
        self.make_token(token, start, self.pos)
    }

    /// Numbers: `12`, `0.5`, `1e-3`, `2.5E+4`. A `.` is only part of the
    /// literal when a digit follows, so `0..n` lexes as a range.
    fn scan_number(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        self.eat_digits();
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            self.eat_digits();
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let sign = usize::from(matches!(self.peek_at(1), Some(b'+') | Some(b'-')));
            if self.peek_at(1 + sign).is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1 + sign;
                self.eat_digits();
            }
        }
        let text = self.text(start, self.pos);
        match text.parse::<f64>() {
            Ok(n) => self.make_token(Lexeme::Number(n), start, self.pos),
            Err(_) => {
                self.diagnostics.push(Diagnostic::error(
                    format!("malformed number literal '{}'", text),
                    Span::new(self.file_id, start as u32, self.pos as u32),
                ));
                self.make_token(Lexeme::Number(0.0), start, self.pos)
            }
        }
    }

    fn eat_digits(&mut self) {
        while self.pos < self.end && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Option<Spanned<Lexeme>> {
        let ch = self.source[self.pos];
        self.pos += 1;

        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b'[' => Lexeme::LBracket,
            b']' => Lexeme::RBracket,
            b',' => Lexeme::Comma,
            b';' => Lexeme::Semicolon,
            b'@' => Lexeme::At,
            b'+' => Lexeme::Plus,
            b'-' => Lexeme::Minus,
            b'/' => Lexeme::Slash,
            b'%' => Lexeme::Percent,
            b'.' => self.pick(b'.', Lexeme::DotDot, Lexeme::Dot),
            b'*' => self.pick(b'*', Lexeme::StarStar, Lexeme::Star),
            b'=' => self.pick(b'=', Lexeme::EqEq, Lexeme::Eq),
            b'!' => self.pick(b'=', Lexeme::BangEq, Lexeme::Bang),
            b'<' => self.pick(b'=', Lexeme::LtEq, Lexeme::Lt),
            b'>' => self.pick(b'=', Lexeme::GtEq, Lexeme::Gt),
            b'&' | b'|' => {
                if self.peek() == Some(ch) {
                    self.pos += 1;
                    if ch == b'&' {
                        Lexeme::AmpAmp
                    } else {
                        Lexeme::PipePipe
                    }
                } else {
                    self.diagnostics.push(
                        Diagnostic::error(
                            format!("unexpected '{}'; there are no bitwise operators", ch as char),
                            Span::new(self.file_id, start as u32, self.pos as u32),
                        )
                        .with_help(format!(
                            "use `{0}{0}` for the logical operator",
                            ch as char
                        )),
                    );
                    return None;
                }
            }
            _ => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("unexpected character '{}' (U+{:04X})", ch as char, ch),
                        Span::new(self.file_id, start as u32, self.pos as u32),
                    )
                    .with_help("this character is not part of the fastats syntax".to_string()),
                );
                return None;
            }
        };

        Some(self.make_token(token, start, self.pos))
    }

    /// Two-character lexeme if the next byte is `next`, otherwise `single`.
    fn pick(&mut self, next: u8, double: Lexeme, single: Lexeme) -> Lexeme {
        if self.peek() == Some(next) {
            self.pos += 1;
            double
        } else {
            single
        }
    }

    fn peek(&self) -> Option<u8> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        let idx = self.pos + offset;
        if idx < self.end {
            Some(self.source[idx])
        } else {
            None
        }
    }

    fn text(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.source[start..end]).into_owned()
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(self.file_id, start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}
