//! Growable byte buffer that collects socket reads until a frame completes.

use bytes::{Bytes, BytesMut};

/// Initial capacity, sized for a typical textual response.
const INITIAL_CAPACITY: usize = 8 * 1024;

/// Append-only buffer with pattern search over everything accumulated so far.
///
/// Searches always scan the whole concatenated contents, never just the last
/// appended chunk, so a pattern split across reads is still found.
#[derive(Debug)]
pub struct ByteAccumulator {
  buffer: BytesMut,
}

impl ByteAccumulator {
  pub fn new() -> Self {
    Self {
      buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
    }
  }

  /// Append a raw chunk. Any earlier search result may now be stale.
  pub fn append(&mut self, chunk: &[u8]) {
    self.buffer.extend_from_slice(chunk);
  }

  /// Read-only view of the current contents.
  pub fn snapshot(&self) -> &[u8] {
    &self.buffer
  }

  /// Discard everything.
  pub fn reset(&mut self) {
    self.buffer.clear();
  }

  /// Lowest index at which `pattern` starts, if present.
  ///
  /// The decoder walks lines instead; this is for callers inspecting raw
  /// buffered bytes.
  pub fn search(&self, pattern: &[u8]) -> Option<usize> {
    self.search_from(pattern, 0)
  }

  /// Lowest index `>= from` at which `pattern` starts, if present.
  pub fn search_from(&self, pattern: &[u8], from: usize) -> Option<usize> {
    find_from(&self.buffer, pattern, from)
  }

  /// Remove and return the first `len` bytes, keeping whatever follows.
  pub fn take(&mut self, len: usize) -> Bytes {
    let len = len.min(self.buffer.len());
    self.buffer.split_to(len).freeze()
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }
}

impl Default for ByteAccumulator {
  fn default() -> Self {
    Self::new()
  }
}

/// Naive forward search; responses are small enough that this never matters.
fn find_from(haystack: &[u8], pattern: &[u8], from: usize) -> Option<usize> {
  if pattern.is_empty() {
    return (from <= haystack.len()).then_some(from);
  }
  if from >= haystack.len() || haystack.len() - from < pattern.len() {
    return None;
  }
  haystack[from..]
    .windows(pattern.len())
    .position(|window| window == pattern)
    .map(|pos| pos + from)
}
