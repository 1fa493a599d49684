use super::error::{PDFError, PDFResult};
use super::stream::Stream;

/// Tokens produced by the [`Lexer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// End of input
    EOF,
    Boolean(bool),
    Null,
    Number(f64),
    /// Literal string `( ... )`
    String(Vec<u8>),
    /// Hex string `< ... >`
    HexString(Vec<u8>),
    /// Name `/Name`, with `#xx` escapes decoded
    Name(String),
    /// Bare keyword such as `obj`, `R`, `stream`, `xref`
    Command(String),
    ArrayStart,
    ArrayEnd,
    DictStart,
    DictEnd,
}

impl Token {
    /// Returns true if this token is the keyword `cmd`.
    pub fn is_command(&self, cmd: &str) -> bool {
        matches!(self, Token::Command(c) if c == cmd)
    }
}

const MAX_COMMAND_LENGTH: usize = 128;

/// PDF Lexer for tokenizing PDF syntax.
///
/// Reads bytes lazily from a [`Stream`] and never consumes past the end of the
/// token it returns, so the stream position after a `stream` keyword is exactly
/// where the keyword ends.
pub struct Lexer {
    stream: Stream,
    str_buf: Vec<u8>,
}

/// PDF whitespace: NUL, TAB, LF, FF, CR, SPACE
#[inline]
pub(crate) fn is_whitespace(ch: u8) -> bool {
    matches!(ch, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// PDF delimiters: ( ) < > [ ] { } / %
#[inline]
pub(crate) fn is_delimiter(ch: u8) -> bool {
    matches!(
        ch,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

#[inline]
fn is_special(ch: u8) -> bool {
    is_whitespace(ch) || is_delimiter(ch)
}

fn hex_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        _ => None,
    }
}

impl Lexer {
    pub fn new(stream: Stream) -> Self {
        Lexer {
            stream,
            str_buf: Vec::new(),
        }
    }

    /// Current absolute byte offset.
    pub fn pos(&self) -> usize {
        self.stream.pos()
    }

    /// Raw access for readers that bypass tokenization (stream bodies).
    pub fn stream_mut(&mut self) -> &mut Stream {
        &mut self.stream
    }

    fn peek(&self) -> Option<u8> {
        self.stream.peek_byte()
    }

    fn advance(&mut self) -> Option<u8> {
        self.stream.get_byte()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b'%' {
                while let Some(c) = self.advance() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                }
            } else if is_whitespace(ch) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Gets the next token from the stream.
    pub fn get_token(&mut self) -> PDFResult<Token> {
        self.skip_whitespace_and_comments();

        let Some(ch) = self.peek() else {
            return Ok(Token::EOF);
        };

        match ch {
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.get_number(),
            b'(' => self.get_string(),
            b'/' => self.get_name(),
            b'[' => {
                self.advance();
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.advance();
                Ok(Token::ArrayEnd)
            }
            b'<' => {
                self.advance();
                if self.peek() == Some(b'<') {
                    self.advance();
                    Ok(Token::DictStart)
                } else {
                    Ok(self.get_hex_string())
                }
            }
            b'>' => {
                let offset = self.pos();
                self.advance();
                if self.peek() == Some(b'>') {
                    self.advance();
                    Ok(Token::DictEnd)
                } else {
                    Err(PDFError::syntax(offset, "unexpected '>'"))
                }
            }
            b')' | b'{' | b'}' => {
                let offset = self.pos();
                self.advance();
                Err(PDFError::syntax(
                    offset,
                    format!("illegal character '{}'", ch as char),
                ))
            }
            _ => self.get_command(),
        }
    }

    /// Parses integers, reals and the exponent forms some producers emit.
    fn get_number(&mut self) -> PDFResult<Token> {
        let offset = self.pos();
        let mut sign = 1.0;

        match self.peek() {
            Some(b'-') => {
                sign = -1.0;
                self.advance();
                // Double negative is tolerated
                if self.peek() == Some(b'-') {
                    self.advance();
                }
            }
            Some(b'+') => {
                self.advance();
            }
            _ => {}
        }

        let mut value = 0.0_f64;
        let mut divide_by = 0.0_f64;
        let mut seen_digit = false;
        let mut exponent: Option<(i32, i32)> = None;

        while let Some(ch) = self.peek() {
            match ch {
                b'0'..=b'9' => {
                    let digit = f64::from(ch - b'0');
                    if let Some((_, ref mut power)) = exponent {
                        *power = power.saturating_mul(10).saturating_add(i32::from(ch - b'0'));
                    } else {
                        value = value * 10.0 + digit;
                        if divide_by != 0.0 {
                            divide_by *= 10.0;
                        }
                    }
                    seen_digit = true;
                }
                b'.' if exponent.is_none() => {
                    if divide_by != 0.0 {
                        break;
                    }
                    divide_by = 1.0;
                }
                b'e' | b'E' if seen_digit && exponent.is_none() => {
                    // Only an exponent when followed by a sign or digit
                    let next = self.stream.bytes().get(self.pos() + 1).copied();
                    match next {
                        Some(b'+') => {
                            self.advance();
                            exponent = Some((1, 0));
                        }
                        Some(b'-') => {
                            self.advance();
                            exponent = Some((-1, 0));
                        }
                        Some(b'0'..=b'9') => exponent = Some((1, 0)),
                        _ => break,
                    }
                }
                _ => break,
            }
            self.advance();
        }

        if !seen_digit {
            // Lone sign or dot reads as zero when followed by a boundary
            if self.peek().map_or(true, is_special) {
                return Ok(Token::Number(0.0));
            }
            return Err(PDFError::syntax(offset, "invalid number"));
        }

        if divide_by != 0.0 {
            value /= divide_by;
        }
        if let Some((exp_sign, power)) = exponent {
            value *= 10_f64.powi(exp_sign * power);
        }

        Ok(Token::Number(sign * value))
    }

    /// Parses a literal string with nested parentheses and escapes.
    fn get_string(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();
        self.advance(); // '('
        let mut depth = 1;

        while let Some(ch) = self.advance() {
            match ch {
                b'(' => {
                    depth += 1;
                    self.str_buf.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    self.str_buf.push(ch);
                }
                b'\\' => {
                    let Some(esc) = self.advance() else { break };
                    match esc {
                        b'n' => self.str_buf.push(b'\n'),
                        b'r' => self.str_buf.push(b'\r'),
                        b't' => self.str_buf.push(b'\t'),
                        b'b' => self.str_buf.push(0x08),
                        b'f' => self.str_buf.push(0x0C),
                        b'0'..=b'7' => {
                            let mut x = u32::from(esc - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        x = (x << 3) + u32::from(d - b'0');
                                        self.advance();
                                    }
                                    _ => break,
                                }
                            }
                            self.str_buf.push((x & 0xFF) as u8);
                        }
                        b'\r' => {
                            // Escaped line break is a continuation
                            if self.peek() == Some(b'\n') {
                                self.advance();
                            }
                        }
                        b'\n' => {}
                        other => self.str_buf.push(other),
                    }
                }
                _ => self.str_buf.push(ch),
            }
        }

        Ok(Token::String(self.str_buf.clone()))
    }

    /// Parses `<48656c6c6f>`; the opening `<` is already consumed.
    fn get_hex_string(&mut self) -> Token {
        self.str_buf.clear();
        let mut high: Option<u8> = None;

        while let Some(ch) = self.advance() {
            if ch == b'>' {
                break;
            }
            let Some(digit) = hex_value(ch) else {
                continue;
            };
            match high.take() {
                Some(h) => self.str_buf.push((h << 4) | digit),
                None => high = Some(digit),
            }
        }

        // Odd number of digits: final digit is followed by an implicit 0
        if let Some(h) = high {
            self.str_buf.push(h << 4);
        }

        Token::HexString(self.str_buf.clone())
    }

    /// Parses `/Name`, decoding `#xx` escapes.
    fn get_name(&mut self) -> PDFResult<Token> {
        self.str_buf.clear();
        self.advance(); // '/'

        while let Some(ch) = self.peek() {
            if is_special(ch) {
                break;
            }
            self.advance();
            if ch == b'#' {
                let bytes = self.stream.bytes();
                let pos = self.pos();
                let decoded = match (bytes.get(pos), bytes.get(pos + 1)) {
                    (Some(&a), Some(&b)) => hex_value(a).zip(hex_value(b)),
                    _ => None,
                };
                if let Some((a, b)) = decoded {
                    self.advance();
                    self.advance();
                    self.str_buf.push((a << 4) | b);
                    continue;
                }
            }
            self.str_buf.push(ch);
        }

        Ok(Token::Name(String::from_utf8_lossy(&self.str_buf).into_owned()))
    }

    /// Reads a keyword; `true`, `false` and `null` become typed tokens.
    fn get_command(&mut self) -> PDFResult<Token> {
        let offset = self.pos();
        let mut command = String::new();

        while let Some(ch) = self.peek() {
            if is_special(ch) {
                break;
            }
            if command.len() >= MAX_COMMAND_LENGTH {
                return Err(PDFError::syntax(offset, "command token too long"));
            }
            command.push(ch as char);
            self.advance();
        }

        Ok(match command.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Command(command),
        })
    }
}
