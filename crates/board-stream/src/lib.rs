//! # board-stream
//!
//! Client-side real-time event channel for the pipeline kanban dashboard.
//!
//! The dashboard takes its initial board state from a REST snapshot; this
//! crate keeps that state live by owning a single long-lived SSE connection
//! scoped to a project, reconnecting automatically with bounded exponential
//! backoff, and fanning each `{type, timestamp, data}` envelope out to a
//! consumer-supplied callback set after per-type validation.
//!
//! ## Features
//!
//! - **Auto-Reconnection**: 1 s → 30 s doubling backoff with a budget of ten
//!   scheduled attempts; a terminal error is surfaced only once the budget is
//!   spent, and a successful open resets it.
//! - **Typed Status**: a `watch` channel publishing
//!   `connecting | connected | disconnected | error` plus the terminal error.
//! - **Callback Freshness**: the callback set can be replaced at any time
//!   without reconnecting; events always dispatch through the latest set.
//! - **Contained Failures**: malformed messages and incomplete payloads are
//!   dropped without ever disturbing the connection.
//! - **Transport Seam**: the reconnect state machine is generic over
//!   [`StreamTransport`], so tests drive it with scripted transports under
//!   virtual time.
//!
//! # Architecture
//!
//! ```text
//! BoardStream::connect(config, callbacks)
//!   └─ spawns background task ──► tokio::spawn(stream_driver)
//!        │                              │
//!        ├── StreamHandle ◄── mpsc ◄────┤  (commands: Close, Reconnect,
//!        │        │                     │   SetEnabled, SetProject)
//!        │        └── Arc<RwLock<BoardCallbacks>> ◄─ read at dispatch time
//!        │                              │
//!        └── watch::Receiver ◄──────────┘  (StreamStatus transitions)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use board_stream::{BoardCallbacks, BoardStream, StreamConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = StreamConfig::new("http://localhost:3000/api/events", "proj-1");
//! let callbacks = BoardCallbacks::new()
//!     .on_item_moved(|item_id, from_stage, to_stage, _item| {
//!         println!("{item_id}: {from_stage} -> {to_stage}");
//!     })
//!     .on_item_deleted(|item_id| {
//!         println!("deleted {item_id}");
//!     });
//!
//! let stream = BoardStream::connect(config, callbacks).await?;
//! let (handle, mut status) = stream.split();
//!
//! status.wait_for(|s| s.is_connected()).await?;
//! // ... later, replace the callbacks without reconnecting:
//! handle.set_callbacks(BoardCallbacks::new());
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod transport;

pub use backoff::{BackoffConfig, calculate_backoff};
pub use config::StreamConfig;
pub use connection::{BoardStream, ConnectionState, StreamCommand, StreamHandle, StreamStatus};
pub use dispatch::{BoardCallbacks, dispatch_envelope, dispatch_message};
pub use envelope::{BoardEnvelope, BoardEventType};
pub use error::{StreamError, StreamResult};
pub use transport::{ByteStream, HttpTransport, StreamTransport};
