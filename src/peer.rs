//! Peer — correlated request/response over one duplex channel.
//!
//! DESIGN
//! ======
//! A `Peer` owns the write half of the channel behind an async mutex, the
//! handler registry behind its own sync mutex, and a one-shot closed flag.
//! The read half is handed to the dispatch loop by `listen`.
//!
//! Every inbound packet is routed exactly one way:
//! - its `packet_id` matches a pending send → that reply callback, once
//! - otherwise its `type` has a handler → handler, reply written back
//! - otherwise → dropped
//!
//! Both dispatch paths run off the read loop behind a `catch_unwind`
//! boundary: handlers on a spawned task, reply callbacks (plain sync
//! closures) on the blocking pool. Caller code can neither stall nor kill
//! the read loop.
//!
//! LIFECYCLE
//! =========
//! 1. `Peer::new` wraps an open channel and assigns a random identity
//! 2. Collaborators `register_handler` before traffic starts
//! 3. `listen` spawns the dispatch loop, `spawn_heartbeat` the liveness task
//! 4. A failed or timed-out read, or a local `close`, fires the closed flag
//!    once and abandons every pending reply (waiters in `call` see `Closed`)
//! 5. The dispatch loop and liveness task both watch the closed flag and exit

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use futures::{FutureExt, Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PeerConfig;
use crate::error::PeerError;
use crate::packet::{Packet, decode_packet, encode_packet};
use crate::registry::{Handler, Registry, ReplyCallback};
use crate::transport::{self, FrameSink, FrameStream, Inbound, WireMessage};

/// One endpoint of a duplex connection. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Peer {
    inner: Arc<PeerInner>,
}

struct PeerInner {
    id: String,
    config: PeerConfig,
    /// Serializes every physical write.
    writer: Mutex<FrameSink>,
    /// Taken once by `listen`.
    reader: std::sync::Mutex<Option<FrameStream>>,
    registry: Registry,
    closed: watch::Sender<bool>,
}

// =============================================================================
// CONSTRUCTION
// =============================================================================

impl Peer {
    /// Wrap an already-open channel using the default timeouts.
    pub fn new<S, M, E>(channel: S) -> Self
    where
        S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + 'static,
        M: WireMessage,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::with_config(channel, PeerConfig::default())
    }

    pub fn with_config<S, M, E>(channel: S, config: PeerConfig) -> Self
    where
        S: Stream<Item = Result<M, E>> + Sink<M, Error = E> + Send + 'static,
        M: WireMessage,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (writer, reader) = transport::split(channel);
        let (closed, _) = watch::channel(false);
        let id = Uuid::new_v4().to_string();
        debug!(peer_id = %id, "peer: created");

        Self {
            inner: Arc::new(PeerInner {
                id,
                config,
                writer: Mutex::new(writer),
                reader: std::sync::Mutex::new(Some(reader)),
                registry: Registry::default(),
                closed,
            }),
        }
    }

    /// Process-unique identity. Never sent on the wire.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn config(&self) -> PeerConfig {
        self.inner.config
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// Resolves once the peer is torn down: a read failure, or `close`.
    pub async fn closed(&self) {
        let mut closed = self.inner.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }
}

// =============================================================================
// OUTBOUND
// =============================================================================

impl Peer {
    /// Install a durable responder for every inbound packet of `kind`.
    ///
    /// Register before calling `listen`. Returning `None` sends nothing back;
    /// a returned packet is stamped with the request's `packet_id` and
    /// `session_id` before it is written.
    pub fn register_handler<F, Fut>(&self, kind: impl Into<String>, handler: F)
    where
        F: Fn(Packet) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Packet>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |packet: Packet| handler(packet).boxed());
        self.inner.registry.register(kind.into(), handler);
    }

    /// Fire-and-forget send. Returns the correlation id assigned to `packet`.
    ///
    /// # Errors
    ///
    /// Returns codec, write, or write-timeout errors.
    pub async fn send(&self, packet: Packet) -> Result<String, PeerError> {
        self.dispatch_send(packet, None).await
    }

    /// Send `packet` and run `callback` with the reply carrying its
    /// correlation id. The reply seen by `callback` always carries this
    /// request's `packet_id` and `session_id`.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Closed`] if the peer is already torn down, plus
    /// codec, write, or write-timeout errors. On error the callback is
    /// dropped without running.
    pub async fn send_with<F>(&self, packet: Packet, callback: F) -> Result<String, PeerError>
    where
        F: FnOnce(Packet) + Send + 'static,
    {
        self.dispatch_send(packet, Some(Box::new(callback))).await
    }

    /// Send `packet` and wait for its reply.
    ///
    /// There is no deadline here; wrap it or use [`Peer::call_timeout`].
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::Closed`] if the peer is torn down before the
    /// reply arrives, plus any error from [`Peer::send_with`].
    pub async fn call(&self, packet: Packet) -> Result<Packet, PeerError> {
        let (tx, rx) = oneshot::channel();
        self.send_with(packet, move |reply| {
            let _ = tx.send(reply);
        })
        .await?;
        rx.await.map_err(|_| PeerError::Closed)
    }

    /// [`Peer::call`] with a deadline. On expiry the pending entry is
    /// removed, so a late reply falls through to type-handler routing.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::ReplyTimeout`] on expiry, otherwise as `call`.
    pub async fn call_timeout(&self, packet: Packet, deadline: Duration) -> Result<Packet, PeerError> {
        let (tx, rx) = oneshot::channel();
        let correlation_id = self
            .send_with(packet, move |reply| {
                let _ = tx.send(reply);
            })
            .await?;

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(PeerError::Closed),
            Err(_) => {
                self.inner.registry.take_pending(&correlation_id);
                Err(PeerError::ReplyTimeout(deadline))
            }
        }
    }

    /// Tear the peer down and close the underlying channel.
    ///
    /// The closed flag fires before the channel is touched, so the dispatch
    /// loop stops and pending replies are abandoned even when the remote
    /// never answers the close frame or a write is stalled. Errors from an
    /// already-dead channel are ignored, so calling this twice is harmless.
    pub async fn close(&self) {
        self.inner.mark_closed();

        let bound = self.inner.config.write_timeout;
        let shutdown = async {
            let mut writer = self.inner.writer.lock().await;
            writer.close().await
        };
        match tokio::time::timeout(bound, shutdown).await {
            Ok(Ok(())) => debug!(peer_id = %self.inner.id, "peer: channel closed"),
            Ok(Err(e)) => debug!(peer_id = %self.inner.id, error = %e, "peer: close on dead channel"),
            Err(_) => warn!(peer_id = %self.inner.id, ?bound, "peer: close timed out"),
        }
    }

    async fn dispatch_send(&self, mut packet: Packet, callback: Option<ReplyCallback>) -> Result<String, PeerError> {
        packet.correlation_id = Uuid::new_v4().to_string();
        // Encode before registering: a packet that cannot be encoded leaves
        // nothing behind.
        let text = encode_packet(&packet)?;
        let correlation_id = packet.correlation_id.clone();

        if let Some(callback) = callback {
            let wrapped = wrap_reply(&packet, callback);
            if !self.inner.registry.insert_pending(correlation_id.clone(), wrapped) {
                return Err(PeerError::Closed);
            }
        }

        if let Err(e) = self.inner.write_text(text).await {
            self.inner.registry.take_pending(&correlation_id);
            return Err(e);
        }
        Ok(correlation_id)
    }
}

impl PeerInner {
    async fn write_text(&self, text: String) -> Result<(), PeerError> {
        let bound = self.config.write_timeout;
        let mut writer = self.writer.lock().await;
        match tokio::time::timeout(bound, writer.send(text)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(PeerError::Write(e)),
            Err(_) => Err(PeerError::WriteTimeout(bound)),
        }
    }

    /// Fire the closed flag. Only the first call has any effect.
    fn mark_closed(&self) -> bool {
        let fired = self.closed.send_if_modified(|closed| {
            if *closed {
                return false;
            }
            *closed = true;
            true
        });
        if fired {
            let abandoned = self.registry.abandon_all();
            info!(peer_id = %self.id, abandoned, "peer: closed");
        }
        fired
    }
}

/// Wrap a caller callback so it sees its own request context and can never
/// unwind into the dispatch task.
fn wrap_reply(request: &Packet, callback: ReplyCallback) -> ReplyCallback {
    let correlation_id = request.correlation_id.clone();
    let session_id = request.session_id.clone();

    Box::new(move |mut reply: Packet| {
        reply.stamp(&correlation_id, &session_id);
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(move || callback(reply))) {
            error!(
                %correlation_id,
                panic = panic_message(panic.as_ref()),
                "peer: reply callback panicked"
            );
        }
    })
}

// =============================================================================
// DISPATCH LOOP
// =============================================================================

impl Peer {
    /// Spawn the dispatch loop.
    ///
    /// # Errors
    ///
    /// Returns [`PeerError::AlreadyListening`] on a second call.
    pub fn listen(&self) -> Result<JoinHandle<()>, PeerError> {
        let reader = self
            .inner
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(PeerError::AlreadyListening)?;
        let inner = Arc::clone(&self.inner);
        Ok(tokio::spawn(dispatch_loop(inner, reader)))
    }
}

async fn dispatch_loop(inner: Arc<PeerInner>, mut reader: FrameStream) {
    let read_timeout = inner.config.read_timeout;
    let mut closed = inner.closed.subscribe();
    info!(peer_id = %inner.id, "peer: dispatch started");

    while !*closed.borrow_and_update() {
        let read = tokio::select! {
            _ = closed.changed() => {
                debug!(peer_id = %inner.id, "peer: dispatch stopped by close");
                break;
            }
            read = tokio::time::timeout(read_timeout, reader.next()) => read,
        };
        let bytes = match read {
            Ok(Some(Ok(Inbound::Frame(bytes)))) => bytes,
            Ok(Some(Ok(Inbound::Control))) => continue,
            Ok(Some(Ok(Inbound::Close))) => {
                info!(peer_id = %inner.id, "peer: remote sent close");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!(peer_id = %inner.id, error = %e, "peer: read failed");
                break;
            }
            Ok(None) => {
                info!(peer_id = %inner.id, "peer: channel ended");
                break;
            }
            Err(_) => {
                warn!(peer_id = %inner.id, ?read_timeout, "peer: read timed out");
                break;
            }
        };

        match decode_packet(&bytes) {
            Ok(packet) => route(&inner, packet),
            Err(e) => warn!(peer_id = %inner.id, error = %e, len = bytes.len(), "peer: dropping undecodable frame"),
        }
    }

    inner.mark_closed();
}

/// Pending replies take priority over type handlers.
fn route(inner: &Arc<PeerInner>, packet: Packet) {
    if !packet.correlation_id.is_empty() {
        if let Some(callback) = inner.registry.take_pending(&packet.correlation_id) {
            tokio::task::spawn_blocking(move || callback(packet));
            return;
        }
    }

    let Some(handler) = inner.registry.handler(&packet.kind) else {
        debug!(peer_id = %inner.id, packet_type = %packet.kind, "peer: no handler, dropping packet");
        return;
    };
    let inner = Arc::clone(inner);
    tokio::spawn(async move { respond(&inner, handler, packet).await });
}

async fn respond(inner: &PeerInner, handler: Handler, request: Packet) {
    let correlation_id = request.correlation_id.clone();
    let session_id = request.session_id.clone();
    let kind = request.kind.clone();

    let outcome = AssertUnwindSafe(async move { handler(request).await })
        .catch_unwind()
        .await;
    let mut response = match outcome {
        Ok(Some(response)) => response,
        Ok(None) => return,
        Err(panic) => {
            error!(
                peer_id = %inner.id,
                packet_type = %kind,
                panic = panic_message(panic.as_ref()),
                "peer: handler panicked"
            );
            return;
        }
    };

    response.stamp(&correlation_id, &session_id);
    let text = match encode_packet(&response) {
        Ok(text) => text,
        Err(e) => {
            warn!(peer_id = %inner.id, packet_type = %kind, error = %e, "peer: reply encode failed");
            return;
        }
    };
    if let Err(e) = inner.write_text(text).await {
        warn!(peer_id = %inner.id, packet_type = %kind, error = %e, "peer: reply write failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// =============================================================================
// LIVENESS
// =============================================================================

impl Peer {
    /// Spawn the liveness task: one `heartbeat` packet per configured
    /// period until the closed flag fires. Purely outbound.
    pub fn spawn_heartbeat(&self) -> JoinHandle<()> {
        let peer = self.clone();
        tokio::spawn(async move { peer.heartbeat().await })
    }

    async fn heartbeat(&self) {
        let period = self.inner.config.heartbeat_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut closed = self.inner.closed.subscribe();

        while !self.is_closed() {
            tokio::select! {
                changed = closed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if self.is_closed() {
                        break;
                    }
                    if let Err(e) = self.send(Packet::heartbeat()).await {
                        warn!(peer_id = %self.inner.id, error = %e, "peer: heartbeat write failed");
                    }
                }
            }
        }

        info!(peer_id = %self.inner.id, "peer: heartbeat stopped");
    }
}

#[cfg(test)]
#[path = "peer_test.rs"]
mod tests;
