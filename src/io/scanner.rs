//! Byte-level JSON framing over a `BufRead`.
//!
//! The scanner does not build values itself. It walks the document just far
//! enough to cut out one value at a time, which is then handed to
//! `serde_json`. While copying, the bare literals `NaN`, `Infinity` and
//! `-Infinity` are rewritten as JSON strings so `serde_json` accepts them.

use std::io::BufRead;

use crate::error::DcsError;

pub(crate) struct Scanner<R> {
    reader: R,
    offset: u64,
}

impl<R: BufRead> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, offset: 0 }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn peek(&mut self) -> Result<Option<u8>, DcsError> {
        let buf = self.reader.fill_buf().map_err(|e| {
            DcsError::request(None, format!("failed reading response body: {e}"))
        })?;
        Ok(buf.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn next_byte(&mut self) -> Result<Option<u8>, DcsError> {
        let b = self.peek()?;
        if b.is_some() {
            self.bump();
        }
        Ok(b)
    }

    fn eof(&self) -> DcsError {
        DcsError::Decode(format!("unexpected end of payload at byte {}", self.offset))
    }

    pub fn unexpected(&self, found: u8, wanted: &str) -> DcsError {
        DcsError::Decode(format!(
            "expected {wanted} at byte {}, found '{}'",
            self.offset,
            found.escape_ascii()
        ))
    }

    /// Next non-whitespace byte without consuming it.
    pub fn peek_non_ws(&mut self) -> Result<Option<u8>, DcsError> {
        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                return Ok(Some(b));
            }
            self.bump();
        }
        Ok(None)
    }

    /// Consume `want` after optional whitespace.
    pub fn expect(&mut self, want: u8) -> Result<(), DcsError> {
        match self.peek_non_ws()? {
            Some(b) if b == want => {
                self.bump();
                Ok(())
            }
            Some(b) => Err(self.unexpected(b, &format!("'{}'", want as char))),
            None => Err(self.eof()),
        }
    }

    /// Consume the current byte after `peek_non_ws` has returned it.
    pub fn skip_peeked(&mut self) {
        self.bump();
    }

    pub fn read_string(&mut self) -> Result<String, DcsError> {
        match self.peek_non_ws()? {
            Some(b'"') => {}
            Some(b) => return Err(self.unexpected(b, "a string")),
            None => return Err(self.eof()),
        }
        let mut raw = Vec::new();
        self.copy_string(&mut raw)?;
        serde_json::from_slice(&raw).map_err(|e| DcsError::Decode(format!("invalid string: {e}")))
    }

    /// Raw bytes of the next complete JSON value.
    pub fn capture_value(&mut self) -> Result<Vec<u8>, DcsError> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        loop {
            let b = self.peek_non_ws()?.ok_or_else(|| self.eof())?;
            match b {
                b'"' => self.copy_string(&mut out)?,
                b'{' | b'[' => {
                    self.bump();
                    out.push(b);
                    depth += 1;
                }
                b'}' | b']' | b',' | b':' if depth == 0 => {
                    return Err(self.unexpected(b, "a value"));
                }
                b'}' | b']' => {
                    self.bump();
                    out.push(b);
                    depth -= 1;
                }
                b',' | b':' => {
                    self.bump();
                    out.push(b);
                }
                _ => self.copy_scalar(&mut out)?,
            }
            if depth == 0 {
                return Ok(out);
            }
        }
    }

    fn copy_string(&mut self, out: &mut Vec<u8>) -> Result<(), DcsError> {
        // Opening quote.
        self.bump();
        out.push(b'"');
        loop {
            let b = self.next_byte()?.ok_or_else(|| self.eof())?;
            out.push(b);
            match b {
                b'\\' => {
                    let escaped = self.next_byte()?.ok_or_else(|| self.eof())?;
                    out.push(escaped);
                }
                b'"' => return Ok(()),
                _ => {}
            }
        }
    }

    fn copy_scalar(&mut self, out: &mut Vec<u8>) -> Result<(), DcsError> {
        let mut token = Vec::new();
        while let Some(b) = self.peek()? {
            if b.is_ascii_whitespace() || matches!(b, b',' | b':' | b'{' | b'}' | b'[' | b']' | b'"') {
                break;
            }
            token.push(b);
            self.bump();
        }
        match token.as_slice() {
            b"NaN" | b"Infinity" | b"+Infinity" | b"-Infinity" => {
                out.push(b'"');
                out.extend_from_slice(&token);
                out.push(b'"');
            }
            _ => out.extend_from_slice(&token),
        }
        Ok(())
    }
}

/// Rewrite a whole document so `serde_json` can parse it in one go.
pub(crate) fn sanitize_document(bytes: &[u8]) -> Result<Vec<u8>, DcsError> {
    let mut scanner = Scanner::new(bytes);
    let doc = scanner.capture_value()?;
    if let Some(b) = scanner.peek_non_ws()? {
        return Err(scanner.unexpected(b, "end of payload"));
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_nested_values_one_at_a_time() {
        let mut s = Scanner::new(&b" {\"a\": [1, {\"b\": \"}\"}]} , 42"[..]);
        assert_eq!(s.capture_value().unwrap(), b"{\"a\":[1,{\"b\":\"}\"}]}".to_vec());
        s.expect(b',').unwrap();
        assert_eq!(s.capture_value().unwrap(), b"42".to_vec());
        assert_eq!(s.peek_non_ws().unwrap(), None);
    }

    #[test]
    fn escaped_quotes_stay_inside_strings() {
        let mut s = Scanner::new(&br#""say \"hi\"" tail"#[..]);
        assert_eq!(s.read_string().unwrap(), "say \"hi\"");
    }

    #[test]
    fn non_finite_literals_become_strings() {
        let doc = sanitize_document(b"[NaN, Infinity, -Infinity, 1.5e3, null]").unwrap();
        assert_eq!(doc, br#"["NaN","Infinity","-Infinity",1.5e3,null]"#.to_vec());
    }

    #[test]
    fn truncated_payload_is_a_decode_error() {
        let err = sanitize_document(b"{\"readings\": [1, 2").unwrap_err();
        assert!(matches!(err, DcsError::Decode(_)));
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        assert!(sanitize_document(b"{} x").is_err());
    }
}
