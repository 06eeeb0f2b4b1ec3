//! Client-side decoder and connection for the MPD (Music Player Daemon)
//! line protocol, including its inline `binary:` payloads.
//!
//! ```no_run
//! use mpd_wire::{ClientConfig, ConnectionEvent, MpdClient};
//!
//! # async fn demo() -> Result<(), mpd_wire::ClientError> {
//! let client = MpdClient::new(ClientConfig::default());
//! let events = client.connect().await?;
//!
//! let status = client.request("status\n").await?;
//! for (key, value) in status.pairs() {
//!   println!("{key} = {value}");
//! }
//!
//! while let Ok(event) = events.recv().await {
//!   if let ConnectionEvent::Frame(frame) = event {
//!     println!("{}", frame.text());
//!   }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod mpd;

pub use config::ClientConfig;
pub use mpd::{
  AckError, ClientError, Connection, ConnectionError, ConnectionEvent, ConnectionState,
  DecodeError, Frame, FrameDecoder, MpdClient, ProtocolVersion,
};
