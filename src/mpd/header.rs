//! `binary: <size>` header parsing.

use super::decoder::DecodeError;
use super::scanner::{find_newline, BINARY_PREFIX};

/// A parsed binary header: everything before the payload plus its geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryHeader {
  /// Response text up to and including the header line's `\n`.
  pub text: String,
  /// Index of the `\n` ending the header line; the payload starts right after.
  pub offset: usize,
  /// Declared payload length in bytes.
  pub size: usize,
}

impl BinaryHeader {
  /// Parse the header whose `binary: ` marker starts at `marker`.
  ///
  /// Returns `Ok(None)` while the header line is still incomplete.
  pub fn parse(buf: &[u8], marker: usize) -> Result<Option<Self>, DecodeError> {
    let Some(newline) = find_newline(buf, marker) else {
      return Ok(None);
    };

    let size_start = marker + BINARY_PREFIX.len();
    let raw = buf.get(size_start..newline).unwrap_or_default();
    let invalid = || DecodeError::InvalidBinarySize(String::from_utf8_lossy(raw).into_owned());
    if raw.is_empty() || !raw.iter().all(u8::is_ascii_digit) {
      return Err(invalid());
    }
    let size = std::str::from_utf8(raw)
      .ok()
      .and_then(|digits| digits.parse::<usize>().ok())
      .ok_or_else(invalid)?;

    Ok(Some(Self {
      text: String::from_utf8_lossy(&buf[..=newline]).into_owned(),
      offset: newline,
      size,
    }))
  }

  /// First byte index past the payload.
  pub fn payload_end(&self) -> usize {
    self.offset + 1 + self.size
  }
}
