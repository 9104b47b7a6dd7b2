use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};

use super::{ClientConfig, ConnectionState, CorrelationCheck};
use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::{FrameError, TransportError};
use crate::frame::codec::FrameCodec;
use crate::frame::Frame;
use crate::retry;
use crate::transport::Connector;

/// Initial read buffer size for a connection.
const READ_BUF_CAPACITY: usize = 8 * 1024;

/// One live stream: the write half plus the task that reassembles frames from
/// the read half.
struct Connection<S> {
    writer: WriteHalf<S>,
    frames: mpsc::Receiver<Result<Frame, FrameError>>,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    /// Set while a request is written but its response not yet received.
    in_flight: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    fn spawn(stream: S, max_payload_size: u32) -> Self {
        let (read_half, writer) = tokio::io::split(stream);
        let alive = Arc::new(AtomicBool::new(true));
        let (tx, frames) = mpsc::channel(1);
        let reader = tokio::spawn(read_frames(
            read_half,
            FrameCodec::with_max_payload_size(max_payload_size),
            tx,
            Arc::clone(&alive),
        ));
        Self {
            writer,
            frames,
            alive,
            reader,
            in_flight: false,
        }
    }
}

impl<S> Connection<S> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl<S> Drop for Connection<S> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Reassemble frames from `reader` until EOF or error.
///
/// Clears `alive` before reporting a failure so the owning client observes an
/// unsolicited close even if nobody is waiting on a response.
async fn read_frames<R>(
    mut reader: R,
    mut codec: FrameCodec,
    frames: mpsc::Sender<Result<Frame, FrameError>>,
    alive: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(READ_BUF_CAPACITY);

    let failure = loop {
        match codec.decode(&mut buf) {
            Ok(Some(frame)) => {
                if frames.send(Ok(frame)).await.is_err() {
                    break None;
                }
                continue;
            }
            Ok(None) => {}
            Err(e) => break Some(e),
        }

        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                if codec.is_mid_frame() || !buf.is_empty() {
                    tracing::debug!(buffered = buf.len(), "peer closed connection mid-frame");
                } else {
                    tracing::debug!("peer closed connection");
                }
                break None;
            }
            Ok(_) => {}
            Err(e) => break Some(FrameError::Io(e)),
        }
    };

    alive.store(false, Ordering::Release);
    if let Some(e) = failure {
        let _ = frames.send(Err(e)).await;
    }
}

/// Open one stream, bounded by `timeout`. Dropping the connect future on
/// expiry tears down the half-open socket.
async fn open<C: Connector>(connector: &C, timeout: Duration) -> Result<C::Stream, TransportError> {
    match tokio::time::timeout(timeout, connector.connect()).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(TransportError::Connect(e)),
        Err(_) => Err(TransportError::ConnectTimeout(timeout)),
    }
}

/// Request/response client for an enclave behind a byte-stream socket.
///
/// Each `send()` writes one frame and waits for the next complete frame. The
/// protocol has no multiplexing, so the `&mut self` receiver is what keeps
/// requests strictly sequential; callers that need concurrency should queue
/// externally or open independent clients.
pub struct TransportClient<C: Connector> {
    connector: C,
    config: ClientConfig,
    codec: FrameCodec,
    state: ConnectionState,
    conn: Option<Connection<C::Stream>>,
}

impl<C: Connector> TransportClient<C> {
    pub fn new(connector: C, config: ClientConfig) -> Self {
        let codec = FrameCodec::with_max_payload_size(config.max_payload_size);
        Self {
            connector,
            config,
            codec,
            state: ConnectionState::Disconnected,
            conn: None,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current connection state. A stream closed by the peer reads as
    /// `Disconnected` as soon as the reader notices.
    pub fn state(&self) -> ConnectionState {
        match (&self.conn, self.state) {
            (Some(conn), ConnectionState::Connected) if !conn.is_alive() => {
                ConnectionState::Disconnected
            }
            (_, state) => state,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open a fresh connection, discarding any existing one.
    ///
    /// Each attempt is bounded by `connect_timeout` and attempts are retried
    /// per the configured retry policy. The final failure is returned as is.
    pub async fn connect(&mut self) -> Result<(), TransportError> {
        self.teardown();
        self.state = ConnectionState::Connecting;

        let connector = &self.connector;
        let timeout = self.config.connect_timeout;
        let result =
            retry::with_retry(&self.config.retry_policy, || open(connector, timeout)).await;

        match result {
            Ok(stream) => {
                self.conn = Some(Connection::spawn(stream, self.config.max_payload_size));
                self.state = ConnectionState::Connected;
                tracing::info!(peer = %self.connector.peer(), "connected to enclave");
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                tracing::warn!(peer = %self.connector.peer(), error = %e, "enclave connect failed");
                Err(e)
            }
        }
    }

    /// Send one request and wait for the next response frame.
    ///
    /// With the default [`ReconnectPolicy`](super::ReconnectPolicy), a
    /// disconnected client connects first, and a socket-level failure during
    /// the exchange triggers one reconnect and one resend. Parse errors are
    /// never retried.
    pub async fn send(
        &mut self,
        request: &RequestEnvelope,
    ) -> Result<ResponseEnvelope, TransportError> {
        let wire = self.encode(request)?;
        self.realign();

        if !self.is_connected() {
            if !self.config.reconnect.auto_connect {
                return Err(TransportError::NotConnected);
            }
            tracing::debug!(method = %request.method, "not connected, connecting before send");
            self.connect().await?;
        }

        let mut reconnects = 0;
        loop {
            match self.round_trip(&wire).await {
                Ok(frame) => return self.accept_response(request, frame),
                Err(e) if e.is_io() && self.config.reconnect.allows(reconnects) => {
                    reconnects += 1;
                    tracing::warn!(
                        method = %request.method,
                        reconnect = reconnects,
                        error = %e,
                        "enclave exchange failed, reconnecting"
                    );
                    self.teardown();
                    self.connect().await?;
                }
                Err(e) => {
                    self.teardown();
                    return Err(e);
                }
            }
        }
    }

    /// Build a request with a fresh id and send it.
    pub async fn call(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<ResponseEnvelope, TransportError> {
        let request = RequestEnvelope::new(method, params);
        self.send(&request).await
    }

    /// Close the connection if there is one. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.writer.shutdown().await {
                tracing::debug!(error = %e, "error shutting down enclave stream");
            }
            tracing::debug!(peer = %self.connector.peer(), "disconnected from enclave");
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Make sure the next frame read belongs to the next request.
    ///
    /// A connection left mid-exchange by a dropped `send()` future still has
    /// that response in flight and is discarded. Frames the peer pushed while
    /// no request was outstanding are dropped.
    fn realign(&mut self) {
        let Some(conn) = self.conn.as_mut() else {
            return;
        };
        if conn.in_flight {
            tracing::warn!(
                peer = %self.connector.peer(),
                "previous request abandoned mid-exchange, dropping connection"
            );
            self.teardown();
            return;
        }
        while let Ok(item) = conn.frames.try_recv() {
            match item {
                Ok(frame) => {
                    tracing::warn!(len = frame.len(), "discarding unsolicited frame from enclave")
                }
                Err(e) => tracing::debug!(error = %e, "enclave connection failed while idle"),
            }
        }
    }

    fn teardown(&mut self) {
        self.conn = None;
        self.state = ConnectionState::Disconnected;
    }

    fn encode(&mut self, request: &RequestEnvelope) -> Result<Bytes, TransportError> {
        let frame = Frame::from_json(request).map_err(TransportError::Encode)?;
        let mut buf = BytesMut::with_capacity(frame.wire_len());
        self.codec.encode(frame, &mut buf)?;
        Ok(buf.freeze())
    }

    async fn round_trip(&mut self, wire: &[u8]) -> Result<Frame, TransportError> {
        let conn = self.conn.as_mut().ok_or(TransportError::NotConnected)?;

        conn.in_flight = true;
        conn.writer.write_all(wire).await?;
        conn.writer.flush().await?;

        match conn.frames.recv().await {
            Some(Ok(frame)) => {
                conn.in_flight = false;
                Ok(frame)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(TransportError::Closed),
        }
    }

    fn accept_response(
        &mut self,
        request: &RequestEnvelope,
        frame: Frame,
    ) -> Result<ResponseEnvelope, TransportError> {
        let response: ResponseEnvelope = match frame.to_json() {
            Ok(response) => response,
            Err(e) => {
                self.teardown();
                return Err(TransportError::Parse(e));
            }
        };

        if response.id != request.id {
            match self.config.correlation {
                CorrelationCheck::Ignore => {}
                CorrelationCheck::Warn => tracing::warn!(
                    sent = %request.id,
                    received = %response.id,
                    "response id does not match request"
                ),
                CorrelationCheck::Enforce => {
                    self.teardown();
                    return Err(TransportError::CorrelationMismatch {
                        sent: request.id.clone(),
                        received: response.id,
                    });
                }
            }
        }

        Ok(response)
    }
}
