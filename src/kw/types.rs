//! Element type tags.
//!
//! The tag set is closed.  On disk each tag is a 4-byte ASCII code in the
//! header record; `C0nn` carries the string width in its last three digits.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Width of a `CHAR` element and of a keyword name.
pub const STRING8_LEN: usize = 8;
/// Elements per data record for numeric and bool keywords.
pub const BLOCKSIZE_NUMERIC: usize = 1000;
/// Elements per data record for character keywords.
pub const BLOCKSIZE_CHAR: usize = 105;
/// Largest width a `C0nn` tag can express.
pub const MAX_STRING_WIDTH: u16 = 999;

pub const BOOL_TRUE_INT:  i32 = -1;
pub const BOOL_FALSE_INT: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EclType {
    Int,
    Float,
    Double,
    Bool,
    /// Fixed 8-character string.
    Char,
    /// Fixed-width string, width 1..=999.
    String(u16),
    /// Message keyword; carries no payload bytes.
    Mess,
}

impl EclType {
    /// The 4-byte code written into header records.
    pub fn code(self) -> [u8; 4] {
        match self {
            EclType::Int       => *b"INTE",
            EclType::Float     => *b"REAL",
            EclType::Double    => *b"DOUB",
            EclType::Bool      => *b"LOGI",
            EclType::Char      => *b"CHAR",
            EclType::Mess      => *b"MESS",
            EclType::String(w) => {
                let s = format!("C{:03}", w.min(MAX_STRING_WIDTH));
                let b = s.as_bytes();
                [b[0], b[1], b[2], b[3]]
            }
        }
    }

    /// Resolve a header code.  Returns `None` for anything outside the set.
    pub fn from_code(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"INTE" => Some(EclType::Int),
            b"REAL" => Some(EclType::Float),
            b"DOUB" => Some(EclType::Double),
            b"LOGI" => Some(EclType::Bool),
            b"CHAR" => Some(EclType::Char),
            b"MESS" => Some(EclType::Mess),
            [b'C', digits @ ..] if digits.iter().all(u8::is_ascii_digit) => {
                let width = digits.iter().fold(0u16, |acc, d| acc * 10 + (d - b'0') as u16);
                if width == 0 { None } else { Some(EclType::String(width)) }
            }
            _ => None,
        }
    }

    /// Bytes one element occupies on disk.
    pub fn element_size(self) -> usize {
        match self {
            EclType::Int | EclType::Float | EclType::Bool => 4,
            EclType::Double    => 8,
            EclType::Char      => STRING8_LEN,
            EclType::String(w) => w as usize,
            EclType::Mess      => 0,
        }
    }

    /// Maximum elements per physical data record.
    pub fn block_size(self) -> usize {
        if self.is_alpha() { BLOCKSIZE_CHAR } else { BLOCKSIZE_NUMERIC }
    }

    /// INT, FLOAT and DOUBLE expose a raw numeric buffer.
    pub fn is_numeric(self) -> bool {
        matches!(self, EclType::Int | EclType::Float | EclType::Double)
    }

    pub fn is_alpha(self) -> bool {
        matches!(self, EclType::Char | EclType::String(_) | EclType::Mess)
    }

    /// Human-readable name, for diagnostics only.
    pub fn name(self) -> &'static str {
        match self {
            EclType::Int       => "INT",
            EclType::Float     => "FLOAT",
            EclType::Double    => "DOUBLE",
            EclType::Bool      => "BOOL",
            EclType::Char      => "CHAR8",
            EclType::String(_) => "STRING",
            EclType::Mess      => "MESSAGE",
        }
    }
}

impl fmt::Display for EclType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        f.write_str(std::str::from_utf8(&code).unwrap_or(self.name()))
    }
}
