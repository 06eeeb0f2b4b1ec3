//! MPD protocol module - decodes the server's response stream and manages the
//! TCP connection.
//!
//! Architecture:
//! - `accumulator.rs` - growable byte buffer with cross-read pattern search
//! - `scanner.rs` - marker constants and line/terminator checks
//! - `header.rs` - `binary: <size>` header parsing
//! - `frame.rs` - decoded frame types, banner version and `ACK` parsing
//! - `decoder.rs` - frame decoder state machine
//! - `connection.rs` - socket, reader and writer tasks, event delivery
//! - `client.rs` - reconnectable client with request/response pairing

mod accumulator;
mod client;
mod connection;
mod decoder;
mod frame;
mod header;
mod scanner;

pub use accumulator::ByteAccumulator;
pub use client::{ClientError, MpdClient};
pub use connection::{Connection, ConnectionError, ConnectionEvent, ConnectionState};
pub use decoder::{DecodeError, FrameDecoder, DEFAULT_MAX_FRAME_SIZE};
pub use frame::{AckError, Frame, ProtocolVersion};
pub use header::BinaryHeader;
pub use scanner::{
  classify_line, find_newline, has_terminator, LineKind, BINARY_PREFIX,
  ERROR_PREFIX, INIT_PREFIX, TERMINATOR,
};
