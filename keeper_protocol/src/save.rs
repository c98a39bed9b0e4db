// Tab-delimited text encoding for durable save files.
//
// Save files are meant to be diffable and hand-editable, so records are
// written as tokens separated by tabs, one logical group per line:
//
//   1	Cannon_1	2	2
//   2	3
//   2	4
//
// The reader does not care about the layout: it splits on any ASCII
// whitespace and hands out tokens in order, the same way the writer emitted
// them. Consequently a token may never contain whitespace; `SaveWriter`
// rejects such tokens instead of silently producing an unreadable file.
//
// Field order is owned by the record code, exactly as for `packet.rs`.

use std::collections::VecDeque;
use std::fmt::Display;
use std::io::{BufRead, Write};
use std::str::FromStr;

use crate::error::WireError;
use crate::wire_enum::WireEnum;

/// Token writer for save streams.
pub struct SaveWriter<W: Write> {
    inner: W,
    line_open: bool,
}

impl<W: Write> SaveWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            line_open: false,
        }
    }

    /// Write one token, preceded by a tab unless it starts a line.
    pub fn token<T: Display>(&mut self, value: T) -> Result<&mut Self, WireError> {
        let text = value.to_string();
        if text.is_empty() || text.chars().any(char::is_whitespace) {
            return Err(WireError::InvalidToken(text));
        }
        if self.line_open {
            self.inner.write_all(b"\t")?;
        }
        self.inner.write_all(text.as_bytes())?;
        self.line_open = true;
        Ok(self)
    }

    pub fn enum_token<E: WireEnum>(&mut self, value: E) -> Result<&mut Self, WireError> {
        self.token(value.to_wire())
    }

    pub fn end_line(&mut self) -> Result<&mut Self, WireError> {
        self.inner.write_all(b"\n")?;
        self.line_open = false;
        Ok(self)
    }

    pub fn flush(&mut self) -> Result<(), WireError> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Whitespace-token reader for save streams.
pub struct SaveReader<R: BufRead> {
    inner: R,
    pending: VecDeque<String>,
    line: usize,
}

impl<R: BufRead> SaveReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            line: 0,
        }
    }

    /// Next raw token, or `None` at end of stream. Blank lines are skipped.
    pub fn next_token(&mut self) -> Result<Option<String>, WireError> {
        while self.pending.is_empty() {
            let mut buf = String::new();
            if self.inner.read_line(&mut buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            self.pending
                .extend(buf.split_whitespace().map(str::to_owned));
        }
        Ok(self.pending.pop_front())
    }

    /// Next token parsed as `T`.
    pub fn token<T: FromStr>(&mut self) -> Result<T, WireError> {
        let expected = std::any::type_name::<T>();
        let token = self.next_token()?.ok_or(WireError::MissingToken {
            line: self.line,
            expected,
        })?;
        token.parse().map_err(|_| WireError::BadToken {
            line: self.line,
            token,
            expected,
        })
    }

    pub fn enum_token<E: WireEnum>(&mut self) -> Result<E, WireError> {
        let raw: u32 = self.token()?;
        E::from_wire(raw).ok_or(WireError::UnknownEnumValue {
            kind: E::KIND,
            value: raw,
        })
    }

    /// 1-based number of the last line read, for diagnostics.
    pub fn line(&self) -> usize {
        self.line
    }
}
