use super::error::{PDFError, PDFResult};
use super::lexer::{Lexer, Token};
use super::primitives::{Dict, PDFObject, Ref};
use std::collections::VecDeque;
use tracing::warn;

/// Resolves an indirect `/Length` while a stream body is being read.
pub type LengthResolver<'a> = dyn Fn(Ref) -> Option<usize> + 'a;

/// Builds [`PDFObject`]s from the lexer's tokens.
///
/// Lookahead is filled lazily: the parser only reads ahead when it needs to
/// tell `N G R` apart from two plain numbers, so after a dictionary followed by
/// `stream` the lexer sits exactly at the end of the keyword.
pub struct Parser<'a> {
    lexer: Lexer,
    lookahead: VecDeque<Token>,
    length_resolver: Option<&'a LengthResolver<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(lexer: Lexer) -> Self {
        Parser {
            lexer,
            lookahead: VecDeque::with_capacity(2),
            length_resolver: None,
        }
    }

    /// Installs a callback for streams whose `/Length` is an indirect reference.
    pub fn with_length_resolver(mut self, resolver: &'a LengthResolver<'a>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }

    fn peek(&mut self, n: usize) -> PDFResult<&Token> {
        while self.lookahead.len() <= n {
            let token = self.lexer.get_token()?;
            self.lookahead.push_back(token);
        }
        Ok(&self.lookahead[n])
    }

    fn next_token(&mut self) -> PDFResult<Token> {
        match self.lookahead.pop_front() {
            Some(token) => Ok(token),
            None => self.lexer.get_token(),
        }
    }

    /// Offset of the next unread token, approximately (for diagnostics).
    pub(crate) fn offset(&self) -> usize {
        self.lexer.pos()
    }

    /// Consumes the keyword `cmd` or fails.
    pub fn expect_command(&mut self, cmd: &str) -> PDFResult<()> {
        let offset = self.offset();
        match self.next_token()? {
            token if token.is_command(cmd) => Ok(()),
            other => Err(PDFError::syntax(
                offset,
                format!("expected '{}', got {:?}", cmd, other),
            )),
        }
    }

    /// Reads a non-negative integer token.
    pub fn expect_integer(&mut self) -> PDFResult<u64> {
        let offset = self.offset();
        match self.next_token()? {
            Token::Number(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as u64),
            other => Err(PDFError::syntax(
                offset,
                format!("expected integer, got {:?}", other),
            )),
        }
    }

    /// Returns true if the next token is the keyword `cmd` (without consuming it).
    pub fn peek_command(&mut self, cmd: &str) -> PDFResult<bool> {
        Ok(self.peek(0)?.is_command(cmd))
    }

    /// Parses one object: arrays, dictionaries, streams, references, scalars.
    pub fn parse_object(&mut self) -> PDFResult<PDFObject> {
        let offset = self.offset();
        match self.next_token()? {
            Token::ArrayStart => self.parse_array(),
            Token::DictStart => self.parse_dictionary(),
            Token::Number(n) => self.parse_number_or_ref(n),
            Token::Boolean(b) => Ok(PDFObject::Boolean(b)),
            Token::Null => Ok(PDFObject::Null),
            Token::String(s) => Ok(PDFObject::String(s)),
            Token::HexString(s) => Ok(PDFObject::HexString(s)),
            Token::Name(n) => Ok(PDFObject::Name(n)),
            Token::EOF => Err(PDFError::UnexpectedEndOfStream),
            other => Err(PDFError::syntax(
                offset,
                format!("unexpected token {:?}", other),
            )),
        }
    }

    fn parse_number_or_ref(&mut self, n: f64) -> PDFResult<PDFObject> {
        let is_ref = n >= 0.0
            && n.fract() == 0.0
            && matches!(self.peek(0)?, Token::Number(g) if *g >= 0.0 && g.fract() == 0.0)
            && self.peek(1)?.is_command("R");

        if !is_ref {
            return Ok(PDFObject::Number(n));
        }

        let offset = self.offset();
        let generation = match self.next_token()? {
            Token::Number(g) => g as u32,
            other => {
                return Err(PDFError::syntax(
                    offset,
                    format!("expected generation number, got {:?}", other),
                ));
            }
        };
        self.next_token()?; // 'R'
        Ok(PDFObject::Ref(Ref::new(n as u32, generation)))
    }

    fn parse_array(&mut self) -> PDFResult<PDFObject> {
        let mut array = Vec::new();
        loop {
            match self.peek(0)? {
                Token::ArrayEnd => {
                    self.next_token()?;
                    return Ok(PDFObject::Array(array));
                }
                Token::EOF => return Err(PDFError::UnexpectedEndOfStream),
                _ => {}
            }
            let offset = self.offset();
            match self.parse_object() {
                Ok(obj) => array.push(obj),
                Err(PDFError::UnexpectedEndOfStream) => return Err(PDFError::UnexpectedEndOfStream),
                Err(e) => {
                    warn!(offset, error = %e, "malformed array element, using null");
                    array.push(PDFObject::Null);
                }
            }
        }
    }

    fn parse_dictionary(&mut self) -> PDFResult<PDFObject> {
        let mut dict = Dict::new();
        loop {
            let offset = self.offset();
            match self.next_token()? {
                Token::DictEnd => break,
                Token::Name(key) => {
                    if matches!(self.peek(0)?, Token::DictEnd) {
                        // Key without a value
                        dict.insert(key, PDFObject::Null);
                        continue;
                    }
                    let value = match self.parse_object() {
                        Ok(value) => value,
                        Err(PDFError::UnexpectedEndOfStream) => {
                            return Err(PDFError::UnexpectedEndOfStream);
                        }
                        Err(e) => {
                            warn!(offset, key = %key, error = %e, "malformed dictionary value, using null");
                            PDFObject::Null
                        }
                    };
                    dict.insert(key, value);
                }
                Token::EOF => return Err(PDFError::UnexpectedEndOfStream),
                other => {
                    return Err(PDFError::syntax(
                        offset,
                        format!("expected dictionary key, got {:?}", other),
                    ));
                }
            }
        }

        if self.peek_command("stream")? {
            self.next_token()?;
            return self.parse_stream_body(dict);
        }
        Ok(PDFObject::Dictionary(dict))
    }

    /// Reads the bytes between `stream` and `endstream`.
    fn parse_stream_body(&mut self, dict: Dict) -> PDFResult<PDFObject> {
        debug_assert!(self.lookahead.is_empty());
        let stream = self.lexer.stream_mut();

        // Single EOL after the keyword: CRLF or LF (a lone CR is tolerated)
        if stream.peek_byte() == Some(b'\r') {
            stream.get_byte();
        }
        if stream.peek_byte() == Some(b'\n') {
            stream.get_byte();
        }
        let start = stream.pos();

        let declared = match dict.get("Length") {
            Some(PDFObject::Ref(r)) => self.length_resolver.and_then(|resolve| resolve(*r)),
            Some(obj) => obj.as_usize(),
            None => None,
        };

        let stream = self.lexer.stream_mut();
        let length = match declared {
            Some(len) if Self::length_fits(stream.bytes(), start, len) => len,
            _ => {
                let end = stream.find_forward(b"endstream").ok_or_else(|| {
                    PDFError::syntax(start, "stream without endstream")
                })?;
                warn!(offset = start, "stream /Length missing or wrong, scanning for endstream");
                let mut len = end - start;
                // Drop the EOL that precedes the keyword
                let bytes = stream.bytes();
                if len > 0 && bytes[start + len - 1] == b'\n' {
                    len -= 1;
                }
                if len > 0 && bytes[start + len - 1] == b'\r' {
                    len -= 1;
                }
                len
            }
        };

        let data = stream.get_bytes(length)?;
        if !self.peek_command("endstream")? {
            // Declared length was short; resynchronize on the keyword
            let stream = self.lexer.stream_mut();
            if let Some(end) = stream.find_forward(b"endstream") {
                stream.set_pos(end)?;
            }
            self.lookahead.clear();
        }
        self.expect_command("endstream")?;

        Ok(PDFObject::Stream { dict, data })
    }

    /// True when `endstream` follows `start + len`, allowing an EOL in between.
    fn length_fits(bytes: &[u8], start: usize, len: usize) -> bool {
        let Some(mut pos) = start.checked_add(len) else {
            return false;
        };
        while pos < bytes.len() && matches!(bytes[pos], b'\r' | b'\n' | b' ') {
            pos += 1;
        }
        bytes[pos.min(bytes.len())..].starts_with(b"endstream")
    }

    /// Parses `N G obj <object> endobj`, checking the header against `expected`.
    pub fn parse_indirect_object(&mut self, expected: Ref) -> PDFResult<PDFObject> {
        let offset = self.offset();
        let num = self.expect_integer()? as u32;
        let generation = self.expect_integer()? as u32;
        if num != expected.num || generation != expected.generation {
            return Err(PDFError::syntax(
                offset,
                format!("expected object {}, found {} {} obj", expected, num, generation),
            ));
        }
        self.expect_command("obj")?;
        let object = self.parse_object()?;
        if !self.peek_command("endobj")? {
            warn!(reference = %expected, "missing endobj");
        }
        Ok(object)
    }
}
