//! Decoded frame types.

use std::fmt;

use bytes::Bytes;
use serde::Serialize;

/// One complete unit of server output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
  /// Greeting banner, e.g. `OK MPD 0.21.25\n`.
  Init { text: String },
  /// Textual response ending in an `OK` line.
  Response { text: String },
  /// Textual prologue plus exactly the announced number of raw bytes.
  BinaryResponse { text: String, binary: Bytes },
  /// Response starting with `ACK [`.
  ErrorResponse { text: String },
}

impl Frame {
  /// Full text of the frame as received (synthetic terminator for binary).
  pub fn text(&self) -> &str {
    match self {
      Frame::Init { text }
      | Frame::Response { text }
      | Frame::BinaryResponse { text, .. }
      | Frame::ErrorResponse { text } => text,
    }
  }

  /// Raw payload of a binary response.
  pub fn binary(&self) -> Option<&Bytes> {
    match self {
      Frame::BinaryResponse { binary, .. } => Some(binary),
      _ => None,
    }
  }

  pub fn is_error(&self) -> bool {
    matches!(self, Frame::ErrorResponse { .. })
  }

  /// Text without the trailing `OK` line and newlines.
  pub fn body(&self) -> &str {
    let text = self.text();
    let text = match self {
      Frame::Response { .. } | Frame::BinaryResponse { .. } => {
        text.strip_suffix("OK\n").unwrap_or(text)
      }
      _ => text,
    };
    text.trim_end_matches('\n')
  }

  /// `key: value` pairs from the body, in order.
  pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .body()
      .lines()
      .filter_map(|line| line.split_once(": "))
  }

  /// Server protocol version announced by an `Init` frame.
  pub fn protocol_version(&self) -> Option<ProtocolVersion> {
    match self {
      Frame::Init { text } => ProtocolVersion::parse(text),
      _ => None,
    }
  }

  /// Structured form of an `ErrorResponse`.
  pub fn ack(&self) -> Option<AckError> {
    match self {
      Frame::ErrorResponse { text } => AckError::parse(text),
      _ => None,
    }
  }
}

/// `major.minor.patch` from the greeting banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ProtocolVersion {
  pub major: u32,
  pub minor: u32,
  pub patch: u32,
}

impl ProtocolVersion {
  /// Parse a banner line such as `OK MPD 0.21.25`.
  pub fn parse(banner: &str) -> Option<Self> {
    let version = banner.trim().strip_prefix("OK MPD ")?;
    let mut parts = version.split('.').map(|part| part.trim().parse::<u32>());

    let major = parts.next()?.ok()?;
    let minor = parts.next()?.ok()?;
    let patch = match parts.next() {
      Some(part) => part.ok()?,
      None => 0,
    };

    Some(Self {
      major,
      minor,
      patch,
    })
  }

  /// `albumart`/`readpicture` binary responses exist from 0.21 on.
  pub fn supports_binary(&self) -> bool {
    *self >= ProtocolVersion {
      major: 0,
      minor: 21,
      patch: 0,
    }
  }
}

impl fmt::Display for ProtocolVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
  }
}

/// Parsed `ACK [code@index] {command} message` line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckError {
  pub code: u32,
  /// Position of the failing command inside a command list.
  pub list_index: u32,
  pub command: String,
  pub message: String,
}

impl AckError {
  pub fn parse(text: &str) -> Option<Self> {
    let line = text.lines().find(|line| line.starts_with("ACK ["))?;
    let rest = line.strip_prefix("ACK [")?;

    let (location, rest) = rest.split_once(']')?;
    let (code, list_index) = location.split_once('@')?;

    let rest = rest.trim_start();
    let (command, message) = match rest.strip_prefix('{') {
      Some(inner) => {
        let (command, message) = inner.split_once('}')?;
        (command, message.trim())
      }
      None => ("", rest.trim()),
    };

    Some(Self {
      code: code.trim().parse().ok()?,
      list_index: list_index.trim().parse().ok()?,
      command: command.to_string(),
      message: message.to_string(),
    })
  }
}

impl fmt::Display for AckError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "[{}@{}] {{{}}} {}",
      self.code, self.list_index, self.command, self.message
    )
  }
}
