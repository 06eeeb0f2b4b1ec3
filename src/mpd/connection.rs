//! TCP connection to an MPD server.
//!
//! One reader task owns the [`FrameDecoder`] and one writer task owns the write
//! half of the socket. Callers talk to both through channels, so `send` never
//! waits on the network and concurrent senders are serialized by the queue.
//!
//! ```text
//! send()/request() ─► write queue ─► writer task ─► socket
//! socket ─► reader task ─► FrameDecoder ─► request waiter | event channel
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_channel::{Receiver, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::decoder::{DecodeError, FrameDecoder};
use super::frame::Frame;
use crate::config::ClientConfig;

/// How long `disconnect` waits for the connection task to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ConnectionError {
  #[error("Connection failed: {0}")]
  ConnectionFailed(String),
  #[error("Connection timed out")]
  ConnectTimeout,
  #[error("Connection closed by peer")]
  ClosedByPeer,
  #[error("Read failed: {0}")]
  ReadFailed(std::io::Error),
  #[error("Write failed: {0}")]
  WriteFailed(#[from] std::io::Error),
  #[error("Disconnected")]
  Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
  Disconnected,
  Connecting,
  Connected,
}

/// Notifications delivered to the consumer, in wire order.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
  StateChanged(ConnectionState),
  /// A frame nobody was waiting for via [`Connection::request`].
  Frame(Frame),
  /// The connection is dead; a `StateChanged(Disconnected)` follows.
  TransportError(String),
  /// A malformed frame was discarded; the connection stays up.
  DecodeError(DecodeError),
}

/// State shared between the caller side and the connection tasks.
struct Shared {
  state: ConnectionState,
  /// Set once the connection is going down, locally or not.
  closing: bool,
  /// Requesters waiting for the next frame, oldest first.
  pending: VecDeque<oneshot::Sender<Frame>>,
}

/// Handle the connection tasks use to report back.
#[derive(Clone)]
struct Link {
  shared: Arc<Mutex<Shared>>,
  events: Sender<ConnectionEvent>,
  cancel: CancellationToken,
}

impl Link {
  fn emit(&self, event: ConnectionEvent) {
    // Unbounded, and the receiver lives as long as the Connection.
    let _ = self.events.try_send(event);
  }

  fn set_state(&self, state: ConnectionState) {
    self.shared.lock().state = state;
    self.emit(ConnectionEvent::StateChanged(state));
  }

  /// Report a fatal error unless the connection is already going down.
  fn report(&self, err: ConnectionError) {
    let first = {
      let mut shared = self.shared.lock();
      !std::mem::replace(&mut shared.closing, true)
    };
    self.cancel.cancel();

    if first {
      log::error!("MPD transport error: {}", err);
      self.emit(ConnectionEvent::TransportError(err.to_string()));
    } else {
      log::debug!("Ignoring error after close: {}", err);
    }
  }

  /// Hand a frame to the oldest requester, or to the event channel.
  ///
  /// Each non-Init frame answers exactly one request. If that requester gave
  /// up, its answer goes to the event channel and the next one keeps waiting.
  fn dispatch(&self, frame: Frame) {
    let waiter = match frame {
      Frame::Init { .. } => None,
      _ => self.shared.lock().pending.pop_front(),
    };

    let frame = match waiter {
      Some(waiter) => match waiter.send(frame) {
        Ok(()) => return,
        Err(unclaimed) => {
          log::debug!("Requester gone, forwarding its answer as an event");
          unclaimed
        }
      },
      None => frame,
    };
    self.emit(ConnectionEvent::Frame(frame));
  }

  fn finish(&self) {
    {
      let mut shared = self.shared.lock();
      shared.closing = true;
      shared.state = ConnectionState::Disconnected;
      shared.pending.clear();
    }
    self.emit(ConnectionEvent::StateChanged(ConnectionState::Disconnected));
  }
}

/// A single connection attempt. Never reused; reconnecting builds a new one.
pub struct Connection {
  shared: Arc<Mutex<Shared>>,
  write_tx: Sender<Vec<u8>>,
  event_rx: Receiver<ConnectionEvent>,
  cancel: CancellationToken,
  task: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
  /// Start connecting to `host:port` in the background.
  ///
  /// Must be called from inside a tokio runtime. Failures arrive on
  /// [`events`](Self::events) as `TransportError`, never as a return value.
  pub fn connect(host: &str, port: u16, config: &ClientConfig) -> Self {
    let shared = Arc::new(Mutex::new(Shared {
      state: ConnectionState::Connecting,
      closing: false,
      pending: VecDeque::new(),
    }));

    let (event_tx, event_rx) = async_channel::unbounded();
    let (write_tx, write_rx) = async_channel::unbounded::<Vec<u8>>();
    let cancel = CancellationToken::new();

    let link = Link {
      shared: shared.clone(),
      events: event_tx,
      cancel: cancel.clone(),
    };
    link.emit(ConnectionEvent::StateChanged(ConnectionState::Connecting));

    let addr = format!("{}:{}", host, port);
    let task = tokio::spawn(Self::run(link, addr, config.clone(), write_rx));

    Self {
      shared,
      write_tx,
      event_rx,
      cancel,
      task: Mutex::new(Some(task)),
    }
  }

  async fn run(link: Link, addr: String, config: ClientConfig, write_rx: Receiver<Vec<u8>>) {
    log::info!("Connecting to MPD at {}", addr);

    let connected = tokio::select! {
      _ = link.cancel.cancelled() => {
        link.finish();
        return;
      }
      result = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(&addr)) => result,
    };

    let stream = match connected {
      Ok(Ok(stream)) => stream,
      Ok(Err(e)) => {
        link.report(ConnectionError::ConnectionFailed(format!("{}: {}", addr, e)));
        link.finish();
        return;
      }
      Err(_) => {
        link.report(ConnectionError::ConnectTimeout);
        link.finish();
        return;
      }
    };

    if let Err(e) = stream.set_nodelay(true) {
      log::debug!("Could not set TCP_NODELAY: {}", e);
    }
    link.set_state(ConnectionState::Connected);
    log::info!("Connected to MPD at {}", addr);

    let (reader, writer) = stream.into_split();
    let writer_handle = tokio::spawn(Self::writer_loop(link.clone(), writer, write_rx));

    let decoder = FrameDecoder::with_max_frame_size(config.max_frame_size);
    if let Err(e) = Self::reader_loop(&link, reader, decoder, config.read_buffer_size).await {
      link.report(e);
    }

    link.cancel.cancel();
    let _ = writer_handle.await;
    link.finish();
    log::info!("MPD connection to {} closed", addr);
  }

  async fn reader_loop(
    link: &Link,
    mut reader: OwnedReadHalf,
    mut decoder: FrameDecoder,
    read_size: usize,
  ) -> Result<(), ConnectionError> {
    log::info!("MPD reader loop started");
    let mut buf = vec![0u8; read_size];

    loop {
      let n = tokio::select! {
        _ = link.cancel.cancelled() => return Ok(()),
        result = reader.read(&mut buf) => result.map_err(ConnectionError::ReadFailed)?,
      };
      if n == 0 {
        return Err(ConnectionError::ClosedByPeer);
      }

      decoder.extend(&buf[..n]);
      loop {
        match decoder.next_frame() {
          Ok(Some(frame)) => {
            log::debug!("MPD frame: {} bytes of text", frame.text().len());
            link.dispatch(frame);
          }
          Ok(None) => break,
          Err(e) => {
            log::warn!("Discarding malformed MPD frame: {}", e);
            link.emit(ConnectionEvent::DecodeError(e));
            break;
          }
        }
      }
    }
  }

  async fn writer_loop(link: Link, mut writer: OwnedWriteHalf, write_rx: Receiver<Vec<u8>>) {
    log::info!("MPD writer loop started");

    loop {
      let data = tokio::select! {
        _ = link.cancel.cancelled() => break,
        msg = write_rx.recv() => match msg {
          Ok(data) => data,
          Err(_) => break,
        },
      };

      if let Err(e) = writer.write_all(&data).await {
        link.report(ConnectionError::WriteFailed(e));
        break;
      }
      if let Err(e) = writer.flush().await {
        link.report(ConnectionError::WriteFailed(e));
        break;
      }
    }

    let _ = writer.shutdown().await;
    log::info!("MPD writer loop stopped");
  }

  /// Queue raw protocol text. The caller supplies the trailing newline.
  pub fn send(&self, message: &str) -> Result<(), ConnectionError> {
    if self.shared.lock().closing {
      return Err(ConnectionError::Disconnected);
    }
    self
      .write_tx
      .try_send(message.as_bytes().to_vec())
      .map_err(|_| ConnectionError::Disconnected)
  }

  /// Send a command and wait for the frame that answers it.
  ///
  /// Answers are matched to requests in order, so don't mix raw
  /// [`send`](Self::send) calls with outstanding requests. Dropping the
  /// returned future keeps the slot in line; the frame answering it then goes
  /// to the event channel.
  pub async fn request(&self, message: &str) -> Result<Frame, ConnectionError> {
    let rx = {
      let mut shared = self.shared.lock();
      if shared.closing {
        return Err(ConnectionError::Disconnected);
      }

      let (tx, rx) = oneshot::channel();
      shared.pending.push_back(tx);
      if self.write_tx.try_send(message.as_bytes().to_vec()).is_err() {
        shared.pending.pop_back();
        return Err(ConnectionError::Disconnected);
      }
      rx
    };

    rx.await.map_err(|_| ConnectionError::Disconnected)
  }

  /// Close the connection and wait briefly for the tasks to stop.
  ///
  /// A pending read is abandoned, and no `TransportError` is reported for
  /// the close.
  pub async fn disconnect(&self) {
    log::info!("MPD disconnect requested");
    self.shared.lock().closing = true;
    self.cancel.cancel();

    let handle = self.task.lock().take();
    if let Some(handle) = handle {
      if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
        log::warn!("MPD connection task did not stop within {:?}", SHUTDOWN_GRACE);
      }
    }
  }

  pub fn state(&self) -> ConnectionState {
    self.shared.lock().state
  }

  pub fn is_connected(&self) -> bool {
    self.state() == ConnectionState::Connected
  }

  /// Event receiver for frames, state changes and errors.
  pub fn events(&self) -> Receiver<ConnectionEvent> {
    self.event_rx.clone()
  }
}

impl Drop for Connection {
  fn drop(&mut self) {
    self.shared.lock().closing = true;
    self.cancel.cancel();
  }
}
