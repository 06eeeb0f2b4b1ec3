//! Marker detection over accumulated protocol bytes.
//!
//! MPD frames carry no length prefix. A frame ends when one of these lines
//! shows up, so every routine here works on whole lines:
//!
//! | Marker | Bytes | Meaning |
//! |---|---|---|
//! | error | `ACK [` | error response, ends with its own line |
//! | init | `OK MPD ` | greeting banner, ends with its own line |
//! | binary | `binary: ` | header announcing N raw bytes |
//! | terminator | `OK` line | end of a normal response |

pub const ERROR_PREFIX: &[u8] = b"ACK [";
pub const INIT_PREFIX: &[u8] = b"OK MPD ";
pub const BINARY_PREFIX: &[u8] = b"binary: ";
pub const TERMINATOR: &[u8] = b"OK\n";

/// What a single complete line means to the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
  Init,
  Error,
  BinaryHeader,
  Terminator,
  Data,
}

/// Classify one complete line, trailing `\n` included.
pub fn classify_line(line: &[u8]) -> LineKind {
  if has_terminator(line) {
    LineKind::Terminator
  } else if line.starts_with(INIT_PREFIX) {
    LineKind::Init
  } else if line.starts_with(ERROR_PREFIX) {
    LineKind::Error
  } else if line.starts_with(BINARY_PREFIX) {
    LineKind::BinaryHeader
  } else {
    LineKind::Data
  }
}

/// Index of the next `\n` at or after `from`.
pub fn find_newline(buf: &[u8], from: usize) -> Option<usize> {
  buf.get(from..)?.iter().position(|&b| b == b'\n').map(|pos| pos + from)
}

/// True when the buffer ends with an `OK` line.
///
/// Buffers shorter than the 3-byte `OK\n` are never terminated. A 3-byte
/// buffer only has to match; anything longer also needs the `\n` right before
/// the `O` so that `OK` owns its line.
pub fn has_terminator(buf: &[u8]) -> bool {
  let len = buf.len();
  if len < TERMINATOR.len() || !buf.ends_with(TERMINATOR) {
    return false;
  }
  len == TERMINATOR.len() || buf[len - 4] == b'\n'
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_terminator_short_buffers() {
    assert!(!has_terminator(b""));
    assert!(!has_terminator(b"\n"));
    assert!(!has_terminator(b"K\n"));
    assert!(has_terminator(b"OK\n"));
  }

  #[test]
  fn test_terminator_needs_own_line() {
    assert!(has_terminator(b"\nOK\n"));
    assert!(has_terminator(b"volume: 50\nOK\n"));
    assert!(!has_terminator(b"xOK\n"));
    assert!(!has_terminator(b"title: BOOK\n"));
    assert!(!has_terminator(b"volume: 50\nOK"));
  }

  #[test]
  fn test_classify_line() {
    assert_eq!(classify_line(b"OK\n"), LineKind::Terminator);
    assert_eq!(classify_line(b"OK MPD 0.21.25\n"), LineKind::Init);
    assert_eq!(classify_line(b"ACK [5@0] {play} malformed\n"), LineKind::Error);
    assert_eq!(classify_line(b"binary: 4096\n"), LineKind::BinaryHeader);
    assert_eq!(classify_line(b"volume: 50\n"), LineKind::Data);
    assert_eq!(classify_line(b"OKAY\n"), LineKind::Data);
    assert_eq!(classify_line(b"\n"), LineKind::Data);
  }

  #[test]
  fn test_markers_only_match_at_line_start() {
    assert_eq!(classify_line(b"Title: ACK [not an error]\n"), LineKind::Data);
    assert_eq!(classify_line(b"comment: binary: 5\n"), LineKind::Data);
    assert_eq!(classify_line(b"title: BOOK\n"), LineKind::Data);
  }

  #[test]
  fn test_find_newline() {
    assert_eq!(find_newline(b"ab\ncd\n", 0), Some(2));
    assert_eq!(find_newline(b"ab\ncd\n", 3), Some(5));
    assert_eq!(find_newline(b"ab", 0), None);
    assert_eq!(find_newline(b"ab", 9), None);
  }
}
