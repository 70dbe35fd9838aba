//! # Text Encodings
//!
//! Purpose: Map text to wire bytes and back for the character sets a peer on
//! another runtime is likely to use. 7-bit ASCII is the default.
//!
//! ## Design Principles
//! 1. **Closed Set**: An enum instead of a charset registry keeps dispatch
//!    monomorphic and the supported set explicit.
//! 2. **Lossy Decode**: Invalid input decodes to U+FFFD rather than failing a
//!    read whose framing already succeeded.
//! 3. **Substitute on Encode**: Unmappable characters become `?`, the same
//!    substitution the peer runtimes apply.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

/// Byte substituted for characters the target encoding cannot represent.
const SUBSTITUTE: u8 = b'?';

/// Supported text encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum TextEncoding {
    /// 7-bit US-ASCII.
    #[default]
    Ascii,
    /// ISO-8859-1.
    Latin1,
    /// UTF-8.
    Utf8,
    /// UTF-16 little endian (.NET `Encoding.Unicode`).
    Utf16Le,
    /// UTF-16 big endian.
    Utf16Be,
}

/// Returned when an encoding name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown text encoding: {0}")]
pub struct UnknownEncoding(pub String);

impl TextEncoding {
    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Ascii => "us-ascii",
            TextEncoding::Latin1 => "iso-8859-1",
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
        }
    }

    /// Width in bytes of one code unit. Delimiter matches must start on a
    /// multiple of this width.
    pub fn unit_width(self) -> usize {
        match self {
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => 2,
            _ => 1,
        }
    }

    /// Encodes text into a fresh byte vector.
    pub fn encode(self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * self.unit_width());
        self.encode_into(text, &mut out);
        out
    }

    /// Encodes text without substitution. Returns `None` when any character
    /// has no representation in this encoding.
    pub fn try_encode(self, text: &str) -> Option<Vec<u8>> {
        let representable = match self {
            TextEncoding::Ascii => text.is_ascii(),
            TextEncoding::Latin1 => text.chars().all(|c| u32::from(c) <= 0xFF),
            TextEncoding::Utf8 | TextEncoding::Utf16Le | TextEncoding::Utf16Be => true,
        };
        representable.then(|| self.encode(text))
    }

    /// Appends the encoded form of `text` to `out`.
    pub fn encode_into(self, text: &str, out: &mut Vec<u8>) {
        match self {
            TextEncoding::Ascii => {
                out.extend(text.chars().map(|c| if c.is_ascii() { c as u8 } else { SUBSTITUTE }));
            }
            TextEncoding::Latin1 => {
                out.extend(text.chars().map(|c| u8::try_from(u32::from(c)).unwrap_or(SUBSTITUTE)));
            }
            TextEncoding::Utf8 => out.extend_from_slice(text.as_bytes()),
            TextEncoding::Utf16Le => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            TextEncoding::Utf16Be => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
        }
    }

    /// Decodes bytes into text, replacing invalid input with U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Ascii => bytes
                .iter()
                .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
                .collect(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Utf16Le => decode_utf16(bytes, u16::from_le_bytes),
            TextEncoding::Utf16Be => decode_utf16(bytes, u16::from_be_bytes),
        }
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let chunks = bytes.chunks_exact(2);
    let dangling = !chunks.remainder().is_empty();
    let units = chunks.map(|pair| to_unit([pair[0], pair[1]]));

    let mut text: String = char::decode_utf16(units)
        .map(|unit| unit.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect();
    if dangling {
        text.push(char::REPLACEMENT_CHARACTER);
    }
    text
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf16le" | "utf-16le" | "unicode" => Ok(TextEncoding::Utf16Le),
            "utf16be" | "utf-16be" | "bigendianunicode" => Ok(TextEncoding::Utf16Be),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}

impl TryFrom<String> for TextEncoding {
    type Error = UnknownEncoding;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
