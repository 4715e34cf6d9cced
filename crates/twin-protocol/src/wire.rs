//! Correlation-tracking client over an abstract frame transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, oneshot};
use twin_core::ChannelError;

use crate::message::ProtocolMessage;
use crate::status::Status;

/// Already-connected duplex text-frame pipe.
///
/// Socket management lives with the implementor; the client only needs to
/// push frames out and consume the incoming sequence.
#[async_trait]
pub trait FrameTransport: Send + Sync {
    /// Send one outgoing frame.
    async fn send(&self, frame: String) -> Result<(), ChannelError>;

    /// The incoming frame sequence. Ends when the transport closes.
    fn frames(&self) -> BoxStream<'static, String>;
}

/// Protocol client: issues requests, routes responses by correlation id,
/// fans out updates.
pub struct WireClient {
    transport: Arc<dyn FrameTransport>,
    next_id: AtomicU64,
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<Status>>>>,
    updates: broadcast::Sender<Value>,
    closed: AtomicBool,
}

impl WireClient {
    /// Attach to a transport and start the background read loop.
    #[must_use]
    pub fn connect(transport: Arc<dyn FrameTransport>) -> Arc<Self> {
        let (updates, _) = broadcast::channel(256);
        let client = Arc::new(Self {
            transport,
            next_id: AtomicU64::new(1),
            pending: Arc::new(Mutex::new(HashMap::new())),
            updates,
            closed: AtomicBool::new(false),
        });

        let reader = Arc::clone(&client);
        tokio::spawn(async move {
            reader.read_loop().await;
        });

        client
    }

    async fn read_loop(self: Arc<Self>) {
        let mut frames = self.transport.frames();
        while let Some(frame) = frames.next().await {
            match ProtocolMessage::decode_frame(&frame) {
                Some(ProtocolMessage::Response { id, status }) => {
                    if let Some(waiter) = self.pending.lock().await.remove(&id) {
                        let _ = waiter.send(status);
                    } else {
                        tracing::warn!(id, "response without a pending request");
                    }
                }
                Some(ProtocolMessage::Update { payload }) => {
                    let _ = self.updates.send(payload);
                }
                Some(ProtocolMessage::Request { id, .. }) => {
                    tracing::warn!(id, "unexpected request from the remote side");
                }
                None => {
                    tracing::warn!("skipping undecodable frame");
                }
            }
        }

        // Transport gone: mark the client closed, then drop the waiters so
        // every in-flight request fails. The flag must be set first, see
        // the double-check in `request`.
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().await.clear();
    }

    /// Send a request and await the response with the same correlation id.
    ///
    /// # Errors
    /// Returns [`ChannelError::Closed`] when the transport has died, before
    /// or while the response is awaited, or the transport's own send
    /// failure.
    pub async fn request(&self, value: Vec<Value>) -> Result<Status, ChannelError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChannelError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (waiter_tx, waiter_rx) = oneshot::channel();
        self.pending.lock().await.insert(id, waiter_tx);

        // The read loop may have exited between the check above and the
        // insert; its final sweep would then miss this waiter.
        if self.closed.load(Ordering::SeqCst) {
            self.pending.lock().await.remove(&id);
            return Err(ChannelError::Closed);
        }

        let frame = ProtocolMessage::Request { id, value }.encode_frame();
        if let Err(e) = self.transport.send(frame).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        waiter_rx.await.map_err(|_| ChannelError::Closed)
    }

    /// Subscribe to update payloads pushed by the remote side.
    #[must_use]
    pub fn updates(&self) -> broadcast::Receiver<Value> {
        self.updates.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    /// Loopback transport: outgoing frames land in an mpsc receiver, the
    /// test pushes incoming frames through a buffered mpsc sender so
    /// nothing is lost before the read loop attaches.
    struct Loopback {
        outgoing: mpsc::UnboundedSender<String>,
        incoming: StdMutex<Option<mpsc::UnboundedReceiver<String>>>,
    }

    fn loopback() -> (
        Arc<Loopback>,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Loopback {
            outgoing: out_tx,
            incoming: StdMutex::new(Some(in_rx)),
        });
        (transport, out_rx, in_tx)
    }

    #[async_trait]
    impl FrameTransport for Loopback {
        async fn send(&self, frame: String) -> Result<(), ChannelError> {
            self.outgoing.send(frame).map_err(|_| ChannelError::Closed)
        }

        fn frames(&self) -> BoxStream<'static, String> {
            let receiver = self
                .incoming
                .lock()
                .unwrap()
                .take()
                .expect("frames() called twice");
            UnboundedReceiverStream::new(receiver).boxed()
        }
    }

    #[tokio::test]
    async fn response_resolves_matching_request() {
        let (transport, mut sent, push) = loopback();
        let client = WireClient::connect(transport);

        let pending = tokio::spawn({
            let client = Arc::clone(&client);
            async move { client.request(vec![json!({"category": "heart_rate"})]).await }
        });

        let frame = sent.recv().await.expect("request frame");
        let Some(ProtocolMessage::Request { id, value }) = ProtocolMessage::decode_frame(&frame)
        else {
            panic!("sent frame is not a request");
        };
        assert_eq!(value, vec![json!({"category": "heart_rate"})]);

        // Echo the correlation id back verbatim.
        let response = ProtocolMessage::Response {
            id,
            status: Status::ok(vec!["n1".to_string()]),
        };
        push.send(response.encode_frame()).unwrap();

        let status = pending.await.unwrap().unwrap();
        assert_eq!(status, Status::ok(vec!["n1".to_string()]));
    }

    #[tokio::test]
    async fn updates_are_fanned_out_and_bad_frames_skipped() {
        let (transport, _sent, push) = loopback();
        let client = WireClient::connect(transport);
        let mut updates = client.updates();

        push.send("not even json".to_string()).unwrap();
        // Status-shaped payload: reserved for responses, must not fan out.
        push.send(json!({"updated": {"status": "ok", "id": []}}).to_string())
            .unwrap();
        push.send(json!({"updated": {"category": "heart_rate", "value": 80}}).to_string())
            .unwrap();

        let payload = tokio::time::timeout(std::time::Duration::from_secs(1), updates.recv())
            .await
            .expect("update within deadline")
            .unwrap();
        assert_eq!(payload, json!({"category": "heart_rate", "value": 80}));
    }

    #[tokio::test]
    async fn request_after_transport_close_fails_fast() {
        let (transport, _sent, push) = loopback();
        let client = WireClient::connect(transport);

        // Closing the incoming side ends the frame stream and the read loop.
        drop(push);
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
        while !client.closed.load(Ordering::SeqCst) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "read loop never observed the closed transport"
            );
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // Must fail immediately rather than parking a waiter nobody sweeps.
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            client.request(vec![json!({"category": "heart_rate"})]),
        )
        .await
        .expect("request resolved within deadline");
        assert!(matches!(result, Err(ChannelError::Closed)));
        assert!(client.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn consecutive_requests_use_distinct_ids() {
        let (transport, mut sent, push) = loopback();
        let client = WireClient::connect(transport);

        for _ in 0..2 {
            let pending = tokio::spawn({
                let client = Arc::clone(&client);
                async move { client.request(vec![]).await }
            });
            let frame = sent.recv().await.expect("request frame");
            let Some(ProtocolMessage::Request { id, .. }) =
                ProtocolMessage::decode_frame(&frame)
            else {
                panic!("sent frame is not a request");
            };
            push.send(
                ProtocolMessage::Response {
                    id,
                    status: Status::ok(vec![]),
                }
                .encode_frame(),
            )
            .unwrap();
            pending.await.unwrap().unwrap();
        }

        assert_eq!(client.next_id.load(Ordering::Relaxed), 3);
    }
}
