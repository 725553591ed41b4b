//! Connection driver for the board event stream.
//!
//! Provides [`BoardStream`] and [`StreamHandle`] for managing the long-lived
//! SSE connection with auto-reconnection, a bounded retry budget, and
//! callback-set replacement without reconnecting.

use std::sync::{Arc, PoisonError, RwLock};

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{
    backoff::calculate_backoff,
    config::StreamConfig,
    dispatch::{BoardCallbacks, dispatch_message},
    error::{StreamError, StreamResult},
    transport::{HttpTransport, StreamTransport},
};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Connection state machine states.
///
/// Exactly one value is current at any time; consumers observe transitions
/// through the status watch channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// Attempting to establish a connection.
    Connecting,
    /// Actively receiving events.
    Connected,
    /// Not connected: initial state, between retries, or disabled.
    Disconnected,
    /// Retry budget exhausted — terminal until the consumer re-enables the
    /// stream or requests a reconnect.
    Error,
}

impl ConnectionState {
    /// Returns `true` if the connection is actively streaming.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if the connection gave up after exhausting its retry
    /// budget.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Connection status exposed to the consumer.
///
/// `error` is non-null only in the terminal [`ConnectionState::Error`] state.
#[derive(Clone, Debug)]
pub struct StreamStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Terminal connection error, if the retry budget was exhausted.
    pub error: Option<Arc<StreamError>>,
}

impl StreamStatus {
    /// Returns `true` iff the state is [`ConnectionState::Connected`].
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn disconnected() -> Self {
        Self::of(ConnectionState::Disconnected)
    }

    fn of(state: ConnectionState) -> Self {
        Self { state, error: None }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Control commands sent from [`StreamHandle`] to the background task.
#[derive(Debug)]
pub enum StreamCommand {
    /// Shut the connection down for good.
    Close,
    /// Drop the current connection and reconnect with a fresh retry budget.
    Reconnect {
        /// Human-readable reason for the reconnection request.
        reason: String,
    },
    /// Toggle the connection on or off. Disabling closes the connection and
    /// cancels any pending reconnect timer; enabling resets the retry budget.
    SetEnabled(bool),
    /// Switch to a different project's stream (opens a fresh connection).
    SetProject(String),
}

// ---------------------------------------------------------------------------
// Public API: BoardStream
// ---------------------------------------------------------------------------

/// Entry point for the board event stream.
///
/// Call [`connect()`](BoardStream::connect) to spawn the background driver,
/// then [`split()`](BoardStream::split) to obtain a [`StreamHandle`] (for
/// control and callback replacement) and a status watch receiver.
pub struct BoardStream {
    handle: StreamHandle,
    status_rx: watch::Receiver<StreamStatus>,
}

impl BoardStream {
    /// Start the event stream with the production HTTP transport.
    ///
    /// Spawns a background task that owns the connection, reconnects with
    /// exponential backoff, and dispatches each received event through the
    /// current callback set. Returns immediately; observe progress through
    /// the status watch channel.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub async fn connect(config: StreamConfig, callbacks: BoardCallbacks) -> StreamResult<Self> {
        Self::connect_with_transport(config, callbacks, HttpTransport::new()).await
    }

    /// Start the event stream over a custom [`StreamTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails.
    pub async fn connect_with_transport<T: StreamTransport>(
        config: StreamConfig,
        callbacks: BoardCallbacks,
        transport: T,
    ) -> StreamResult<Self> {
        config.validate().map_err(StreamError::config)?;

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity);
        let (status_tx, status_rx) = watch::channel(StreamStatus::disconnected());
        let callbacks = Arc::new(RwLock::new(callbacks));

        tokio::spawn(stream_driver(
            config,
            Arc::new(transport),
            Arc::clone(&callbacks),
            cmd_rx,
            status_tx,
        ));

        let handle = StreamHandle {
            cmd_tx,
            callbacks,
            status_rx: status_rx.clone(),
        };

        Ok(Self { handle, status_rx })
    }

    /// Split into a control handle and a status watch receiver.
    pub fn split(self) -> (StreamHandle, watch::Receiver<StreamStatus>) {
        (self.handle, self.status_rx)
    }

    /// Get a reference to the control handle.
    pub fn handle(&self) -> &StreamHandle {
        &self.handle
    }

    /// Current connection status.
    pub fn status(&self) -> StreamStatus {
        self.status_rx.borrow().clone()
    }
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// Clone-able handle for controlling a running board stream.
#[derive(Clone)]
pub struct StreamHandle {
    cmd_tx: mpsc::Sender<StreamCommand>,
    callbacks: Arc<RwLock<BoardCallbacks>>,
    status_rx: watch::Receiver<StreamStatus>,
}

impl StreamHandle {
    /// Shut the stream down. Cancels any pending reconnect timer; no further
    /// callback invocations occur afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task has already shut down.
    pub async fn close(&self) -> StreamResult<()> {
        self.send(StreamCommand::Close).await
    }

    /// Drop the current connection and reconnect with a fresh retry budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task has already shut down.
    pub async fn reconnect(&self, reason: &str) -> StreamResult<()> {
        self.send(StreamCommand::Reconnect {
            reason: reason.to_string(),
        })
        .await
    }

    /// Toggle the connection on or off.
    ///
    /// Disabling closes the connection and cancels any pending reconnect
    /// timer without surfacing an error; enabling from the disabled or
    /// terminal-error state opens a fresh connection with a reset retry
    /// budget.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task has already shut down.
    pub async fn set_enabled(&self, enabled: bool) -> StreamResult<()> {
        self.send(StreamCommand::SetEnabled(enabled)).await
    }

    /// Switch to a different project's stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task has already shut down.
    pub async fn set_project(&self, project_id: impl Into<String>) -> StreamResult<()> {
        self.send(StreamCommand::SetProject(project_id.into())).await
    }

    /// Replace the callback set without disturbing the connection.
    ///
    /// Events dispatched after this call see only the new set; the driver
    /// reads the latest set at dispatch time rather than capturing one at
    /// connect time.
    pub fn set_callbacks(&self, callbacks: BoardCallbacks) {
        *self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner) = callbacks;
    }

    /// Current connection status.
    pub fn status(&self) -> StreamStatus {
        self.status_rx.borrow().clone()
    }

    /// A watch receiver for observing status transitions.
    pub fn watch_status(&self) -> watch::Receiver<StreamStatus> {
        self.status_rx.clone()
    }

    /// Check whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    async fn send(&self, cmd: StreamCommand) -> StreamResult<()> {
        self.cmd_tx.send(cmd).await.map_err(|_| {
            StreamError::connection_closed("stream background task shut down".to_string())
        })
    }
}

// ---------------------------------------------------------------------------
// Internal: background driver
// ---------------------------------------------------------------------------

/// The long-lived background task that drives the stream connection.
///
/// It connects, reads SSE events, dispatches them through the current
/// callback set, and reconnects with exponential backoff on failures. At most
/// one live transport stream exists at any instant; the previous stream is
/// dropped before a new open is issued.
async fn stream_driver<T: StreamTransport>(
    mut config: StreamConfig,
    transport: Arc<T>,
    callbacks: Arc<RwLock<BoardCallbacks>>,
    mut cmd_rx: mpsc::Receiver<StreamCommand>,
    status_tx: watch::Sender<StreamStatus>,
) {
    let mut enabled = config.enabled;
    let mut attempt: u32 = 0;

    'outer: loop {
        // --- Idle until enabled ---
        if !enabled {
            status_tx.send_replace(StreamStatus::disconnected());
            loop {
                match cmd_rx.recv().await {
                    Some(StreamCommand::SetEnabled(true)) => {
                        attempt = 0;
                        enabled = true;
                        break;
                    }
                    Some(StreamCommand::SetEnabled(false)) => {}
                    Some(StreamCommand::SetProject(project_id)) => {
                        config.project_id = project_id;
                    }
                    Some(StreamCommand::Reconnect { reason }) => {
                        warn!(reason = %reason, "Reconnect requested while disabled, ignoring");
                    }
                    Some(StreamCommand::Close) | None => {
                        status_tx.send_replace(StreamStatus::disconnected());
                        return;
                    }
                }
            }
        }

        // --- Establish connection ---
        let url = config.stream_url();
        status_tx.send_replace(StreamStatus::of(ConnectionState::Connecting));
        info!(url = %url, attempt, "Stream connecting");

        match transport.open(&url, config.connect_timeout).await {
            Ok(byte_stream) => {
                info!(url = %url, "Stream connection established");
                attempt = 0;
                status_tx.send_replace(StreamStatus::of(ConnectionState::Connected));

                let mut events = byte_stream.eventsource();

                // --- Event loop ---
                loop {
                    tokio::select! {
                        biased;

                        cmd = cmd_rx.recv() => match cmd {
                            Some(StreamCommand::Close) | None => {
                                info!("Stream closing (requested)");
                                status_tx.send_replace(StreamStatus::disconnected());
                                return;
                            }
                            Some(StreamCommand::SetEnabled(false)) => {
                                info!("Stream disabled");
                                enabled = false;
                                continue 'outer;
                            }
                            Some(StreamCommand::SetEnabled(true)) => {}
                            Some(StreamCommand::SetProject(project_id)) => {
                                info!(project_id = %project_id, "Switching project stream");
                                config.project_id = project_id;
                                attempt = 0;
                                continue 'outer;
                            }
                            Some(StreamCommand::Reconnect { reason }) => {
                                warn!(reason = %reason, "Stream reconnect requested");
                                attempt = 0;
                                continue 'outer;
                            }
                        },

                        item = events.next() => match item {
                            Some(Ok(event)) => {
                                debug!(
                                    event_type = %event.event,
                                    id = %event.id,
                                    "Stream event received",
                                );
                                let current = callbacks
                                    .read()
                                    .unwrap_or_else(PoisonError::into_inner);
                                dispatch_message(&current, &event.data);
                            }
                            Some(Err(err)) => {
                                let err = StreamError::sse(err.to_string());
                                error!(error = %err, "Stream error");
                                break;
                            }
                            None => {
                                warn!("Stream ended by server");
                                break;
                            }
                        },
                    }
                }
            }
            Err(err) => {
                error!(url = %url, error = %err, "Stream connection failed");
            }
        }

        // --- Failure path: backoff, or give up once the budget is spent ---
        status_tx.send_replace(StreamStatus::disconnected());

        if let Some(max) = config.reconnect_max_attempts
            && attempt >= max
        {
            error!(attempts = max, "Max stream reconnect attempts exceeded");
            status_tx.send_replace(StreamStatus {
                state: ConnectionState::Error,
                error: Some(Arc::new(StreamError::RetriesExhausted { attempts: max })),
            });

            // Terminal until the consumer re-enables or forces a reconnect.
            loop {
                match cmd_rx.recv().await {
                    Some(StreamCommand::SetEnabled(true))
                    | Some(StreamCommand::Reconnect { .. }) => {
                        attempt = 0;
                        continue 'outer;
                    }
                    Some(StreamCommand::SetEnabled(false)) => {
                        enabled = false;
                        continue 'outer;
                    }
                    Some(StreamCommand::SetProject(project_id)) => {
                        config.project_id = project_id;
                        attempt = 0;
                        continue 'outer;
                    }
                    Some(StreamCommand::Close) | None => {
                        status_tx.send_replace(StreamStatus::disconnected());
                        return;
                    }
                }
            }
        }

        let delay = calculate_backoff(config.backoff(), attempt);
        attempt = attempt.saturating_add(1);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Stream reconnecting after backoff"
        );

        // Backoff sleep, cancellable by any command.
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => match cmd {
                    Some(StreamCommand::Close) | None => {
                        status_tx.send_replace(StreamStatus::disconnected());
                        return;
                    }
                    Some(StreamCommand::SetEnabled(false)) => {
                        info!("Stream disabled, cancelling pending reconnect");
                        enabled = false;
                        continue 'outer;
                    }
                    Some(StreamCommand::SetEnabled(true)) => {}
                    Some(StreamCommand::SetProject(project_id)) => {
                        config.project_id = project_id;
                        attempt = 0;
                        continue 'outer;
                    }
                    Some(StreamCommand::Reconnect { reason }) => {
                        warn!(reason = %reason, "Stream reconnect requested during backoff");
                        attempt = 0;
                        continue 'outer;
                    }
                },

                () = &mut sleep => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Connecting.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(!ConnectionState::Error.is_connected());

        assert!(ConnectionState::Error.is_error());
        assert!(!ConnectionState::Connected.is_error());
    }

    #[test]
    fn test_status_is_connected_mirrors_state() {
        let status = StreamStatus::of(ConnectionState::Connected);
        assert!(status.is_connected());
        assert!(status.error.is_none());

        let status = StreamStatus::disconnected();
        assert!(!status.is_connected());
        assert!(status.error.is_none());
    }
}
