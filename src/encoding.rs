// src/encoding.rs
use std::borrow::Cow;
use std::fmt;

use encoding_rs::Encoding;

use crate::error::ConsoleError;

/// The character encoding a console stream is decoded with.
///
/// Fixed for the lifetime of a stream. Only ASCII-compatible encodings are
/// accepted, because line boundaries are found by scanning for the `\n` byte.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TextEncoding {
    inner: &'static Encoding,
}

impl TextEncoding {
    pub const UTF_8: TextEncoding = TextEncoding {
        inner: encoding_rs::UTF_8,
    };

    /// Resolve an encoding from a label such as `"UTF-8"`, `"windows-1252"`
    /// or `"ibm866"`. Labels are matched case-insensitively.
    pub fn for_label(label: &str) -> Result<Self, ConsoleError> {
        let inner = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            ConsoleError::UnknownEncoding {
                label: label.to_string(),
            }
        })?;

        if !inner.is_ascii_compatible() {
            return Err(ConsoleError::UnsupportedEncoding {
                name: inner.name().to_string(),
            });
        }

        Ok(TextEncoding { inner })
    }

    pub fn name(&self) -> &'static str {
        self.inner.name()
    }

    /// Decode `bytes`, substituting U+FFFD for malformed sequences.
    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Cow<'a, str> {
        let (text, had_errors) = self.inner.decode_without_bom_handling(bytes);
        if had_errors {
            tracing::trace!(encoding = self.name(), "replaced malformed byte sequence");
        }
        text
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        TextEncoding::UTF_8
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
