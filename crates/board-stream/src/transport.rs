//! Transport seam between the connection driver and the host HTTP stack.
//!
//! The reconnection state machine in [`connection`](crate::connection) is
//! transport-agnostic: it only needs something that can open a byte stream to
//! a URL. [`HttpTransport`] is the production implementation; tests substitute
//! scripted transports to exercise the reconnect logic under virtual time.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt, stream::BoxStream};
use tokio::time::timeout;

use crate::error::{StreamError, StreamResult};

/// Raw bytes arriving on an open stream connection.
pub type ByteStream = BoxStream<'static, StreamResult<Bytes>>;

/// Something that can open a server-push byte stream to a URL.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Open a single connection and return its body as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established, times out,
    /// or the endpoint does not speak `text/event-stream`.
    async fn open(&self, url: &str, connect_timeout: Duration) -> StreamResult<ByteStream>;
}

#[async_trait]
impl<T: StreamTransport + ?Sized> StreamTransport for std::sync::Arc<T> {
    async fn open(&self, url: &str, connect_timeout: Duration) -> StreamResult<ByteStream> {
        (**self).open(url, connect_timeout).await
    }
}

/// Production transport: a streaming HTTP GET with SSE headers.
#[derive(Clone, Debug, Default)]
pub struct HttpTransport;

impl HttpTransport {
    /// Create a new HTTP transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    async fn open(&self, url: &str, connect_timeout: Duration) -> StreamResult<ByteStream> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| StreamError::config(format!("Failed to build HTTP client: {e}")))?;

        let request = client
            .get(url)
            .header(http::header::ACCEPT, "text/event-stream")
            .header(http::header::CACHE_CONTROL, "no-cache");

        let response = timeout(connect_timeout, request.send())
            .await
            .map_err(|_| StreamError::timeout(connect_timeout))?
            .map_err(StreamError::Http)?;

        // Validate status.
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::invalid_status(status));
        }

        // Validate Content-Type.
        if let Some(ct) = response.headers().get(http::header::CONTENT_TYPE) {
            let ct_str = ct.to_str().unwrap_or("");
            if !ct_str.contains("text/event-stream") {
                return Err(StreamError::invalid_content_type(ct_str));
            }
        }

        Ok(response.bytes_stream().map_err(StreamError::Http).boxed())
    }
}
