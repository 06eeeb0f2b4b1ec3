//! High-level MPD client: owns the current [`Connection`] and its settings.

use std::sync::Arc;

use async_channel::Receiver;
use parking_lot::Mutex;
use thiserror::Error;

use super::connection::{Connection, ConnectionError, ConnectionEvent, ConnectionState};
use super::frame::{AckError, Frame};
use crate::config::ClientConfig;

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("Connection error: {0}")]
  Connection(#[from] ConnectionError),
  #[error("MPD command failed: {0}")]
  Command(AckError),
  #[error("MPD returned an unrecognized error: {0}")]
  Server(String),
  #[error("Request timed out")]
  Timeout,
  #[error("Not connected")]
  NotConnected,
  #[error("Invalid configuration: {0}")]
  InvalidConfig(String),
}

/// MPD client that can be connected, dropped and reconnected.
///
/// Each `connect` builds a fresh [`Connection`]; no decoder state survives a
/// reconnect.
#[derive(Clone)]
pub struct MpdClient {
  config: Arc<Mutex<ClientConfig>>,
  connection: Arc<Mutex<Option<Arc<Connection>>>>,
}

impl MpdClient {
  pub fn new(config: ClientConfig) -> Self {
    Self {
      config: Arc::new(Mutex::new(config)),
      connection: Arc::new(Mutex::new(None)),
    }
  }

  pub fn config(&self) -> ClientConfig {
    self.config.lock().clone()
  }

  /// Replace the configuration (takes effect on next connect).
  pub fn set_config(&self, config: ClientConfig) -> Result<(), ClientError> {
    config.validate().map_err(ClientError::InvalidConfig)?;
    *self.config.lock() = config;
    Ok(())
  }

  /// Connect to the configured endpoint, replacing any current connection.
  ///
  /// Returns the event receiver for the new connection. A failure to reach
  /// the server shows up there as a `TransportError`.
  pub async fn connect(&self) -> Result<Receiver<ConnectionEvent>, ClientError> {
    let config = self.config();
    config.validate().map_err(ClientError::InvalidConfig)?;

    self.disconnect().await;

    let conn = Arc::new(Connection::connect(&config.host, config.port, &config));
    let events = conn.events();
    *self.connection.lock() = Some(conn);

    Ok(events)
  }

  /// Point the client at `host:port` and connect.
  pub async fn connect_to(
    &self,
    host: &str,
    port: u16,
  ) -> Result<Receiver<ConnectionEvent>, ClientError> {
    {
      let mut config = self.config.lock();
      config.host = host.to_string();
      config.port = port;
    }
    self.connect().await
  }

  /// Drop the current connection and open a fresh one to the same endpoint.
  pub async fn reconnect(&self) -> Result<Receiver<ConnectionEvent>, ClientError> {
    let config = self.config();
    log::info!("Reconnecting to MPD at {}:{}", config.host, config.port);
    self.connect().await
  }

  /// Close the current connection, if any.
  pub async fn disconnect(&self) {
    let conn = self.connection.lock().take();
    if let Some(conn) = conn {
      conn.disconnect().await;
    }
  }

  fn get_connection(&self) -> Result<Arc<Connection>, ClientError> {
    let guard = self.connection.lock();
    guard.clone().ok_or(ClientError::NotConnected)
  }

  /// Send raw protocol text; the answer arrives as an event.
  pub fn send(&self, message: &str) -> Result<(), ClientError> {
    self.get_connection()?.send(message)?;
    Ok(())
  }

  /// Send a command and wait for its answer.
  ///
  /// `ACK` answers become [`ClientError::Command`].
  pub async fn request(&self, message: &str) -> Result<Frame, ClientError> {
    let conn = self.get_connection()?;
    let timeout = self.config.lock().request_timeout();

    let frame = match tokio::time::timeout(timeout, conn.request(message)).await {
      Ok(result) => result?,
      Err(_) => {
        log::error!("MPD request timed out after {:?}: {}", timeout, message.trim_end());
        return Err(ClientError::Timeout);
      }
    };

    match frame {
      Frame::ErrorResponse { text } => match AckError::parse(&text) {
        Some(ack) => Err(ClientError::Command(ack)),
        None => Err(ClientError::Server(text.trim_end().to_string())),
      },
      frame => Ok(frame),
    }
  }

  pub fn state(&self) -> ConnectionState {
    self
      .connection
      .lock()
      .as_ref()
      .map(|conn| conn.state())
      .unwrap_or(ConnectionState::Disconnected)
  }

  pub fn is_connected(&self) -> bool {
    self.state() == ConnectionState::Connected
  }

  /// Event receiver of the current connection.
  pub fn events(&self) -> Option<Receiver<ConnectionEvent>> {
    let guard = self.connection.lock();
    guard.as_ref().map(|conn| conn.events())
  }
}

impl Default for MpdClient {
  fn default() -> Self {
    Self::new(ClientConfig::default())
  }
}
