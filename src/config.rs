//! Connection configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::mpd::DEFAULT_MAX_FRAME_SIZE;

/// Client configuration. Every field has a default, so `{}` is valid JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
  /// MPD host name or address.
  #[serde(default = "default_host")]
  pub host: String,

  /// MPD TCP port.
  #[serde(default = "default_port")]
  pub port: u16,

  /// How long to wait for the TCP connection to open, in milliseconds.
  #[serde(default = "default_connect_timeout_ms")]
  pub connect_timeout_ms: u64,

  /// How long a request waits for its response, in seconds.
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,

  /// Size of a single socket read.
  #[serde(default = "default_read_buffer_size")]
  pub read_buffer_size: usize,

  /// Largest frame the decoder will buffer before giving up on it.
  #[serde(default = "default_max_frame_size")]
  pub max_frame_size: usize,
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  6600
}

fn default_connect_timeout_ms() -> u64 {
  5000
}

fn default_request_timeout_secs() -> u64 {
  180
}

fn default_read_buffer_size() -> usize {
  8192
}

fn default_max_frame_size() -> usize {
  DEFAULT_MAX_FRAME_SIZE
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      connect_timeout_ms: default_connect_timeout_ms(),
      request_timeout_secs: default_request_timeout_secs(),
      read_buffer_size: default_read_buffer_size(),
      max_frame_size: default_max_frame_size(),
    }
  }
}

impl ClientConfig {
  /// Parse from JSON, filling missing fields with defaults.
  pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(json)
  }

  /// Validate configuration values.
  pub fn validate(&self) -> Result<(), String> {
    if self.host.trim().is_empty() {
      return Err("Host cannot be empty".to_string());
    }
    if self.port == 0 {
      return Err("Port cannot be 0".to_string());
    }
    if self.connect_timeout_ms == 0 {
      return Err("Connect timeout must be greater than 0".to_string());
    }
    if self.request_timeout_secs == 0 {
      return Err("Request timeout must be greater than 0".to_string());
    }
    if self.read_buffer_size < 64 {
      return Err("Read buffer size must be at least 64 bytes".to_string());
    }
    if self.max_frame_size < self.read_buffer_size {
      return Err("Max frame size cannot be smaller than the read buffer".to_string());
    }
    Ok(())
  }

  pub fn connect_timeout(&self) -> Duration {
    Duration::from_millis(self.connect_timeout_ms)
  }

  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}
