/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{instrument, trace, warn};

use crate::common::{TransitError, TransportError, TransportHandler};
use crate::endpoint::Address;
use crate::traits::{Transport, TransportFactory, TransportMessage, TransportSettings};
use crate::transport::TransportSubscription;

/// An in-process transport backed by a bounded Tokio channel.
///
/// Sends wait while the queue is full. Messages queue up until a handler subscribes.
/// The handler is called in queue order and each future it returns runs on its own
/// task, so one slow handler does not hold up the queue.
///
/// Disposing stops the receive loop and discards queued messages, but does not wait
/// for handler tasks that are already running.
#[derive(Debug)]
pub struct LoopbackTransport {
    address: Address,
    capacity: usize,
    sender: Mutex<Option<Sender<TransportMessage>>>,
    receiver: Arc<Mutex<Option<Receiver<TransportMessage>>>>,
    cancellation_token: CancellationToken,
    tracker: TaskTracker,
}

impl LoopbackTransport {
    /// Creates a transport for `address` with room for `capacity` queued messages.
    #[must_use]
    pub fn new(address: Address, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            address,
            capacity: capacity.max(1),
            sender: Mutex::new(Some(sender)),
            receiver: Arc::new(Mutex::new(Some(receiver))),
            cancellation_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Number of messages waiting in the queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.sender
            .lock()
            .as_ref()
            .map_or(0, |sender| sender.max_capacity() - sender.capacity())
    }

    /// Queue capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the transport has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

#[async_trait::async_trait]
impl Transport for LoopbackTransport {
    fn address(&self) -> &Address {
        &self.address
    }

    fn kind(&self) -> &'static str {
        "loopback"
    }

    #[instrument(skip(self, message), fields(address = %self.address, message_id = %message.message_id))]
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| TransportError::Closed(self.address.to_string()))?;
        sender
            .send(message)
            .await
            .map_err(|_| TransportError::Closed(self.address.to_string()))?;
        trace!("Message queued");
        Ok(())
    }

    fn subscribe(&self, handler: TransportHandler) -> Result<TransportSubscription, TransportError> {
        if self.is_disposed() {
            return Err(TransportError::Closed(self.address.to_string()));
        }
        let mut receiver = self
            .receiver
            .lock()
            .take()
            .ok_or_else(|| TransportError::AlreadySubscribed(self.address.to_string()))?;

        let subscription_token = self.cancellation_token.child_token();
        let cancel = subscription_token.clone();
        let slot = Arc::clone(&self.receiver);
        let tracker = self.tracker.clone();
        let address = self.address.clone();

        let handle = tokio::spawn(async move {
            trace!(%address, "Receive loop started");
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    incoming = receiver.recv() => {
                        let Some(message) = incoming else { break; };
                        tracker.spawn(handler(message));
                    }
                }
            }
            if cancel.is_cancelled() && !tracker.is_closed() {
                *slot.lock() = Some(receiver);
            }
            trace!(%address, "Receive loop stopped");
        });

        Ok(TransportSubscription::new(subscription_token, handle))
    }

    fn dispose(&self) {
        if self.cancellation_token.is_cancelled() {
            return;
        }
        trace!(address = %self.address, "Disposing loopback transport");
        self.tracker.close();
        self.cancellation_token.cancel();
        self.sender.lock().take();
        if let Some(mut receiver) = self.receiver.lock().take() {
            receiver.close();
            let dropped = std::iter::from_fn(|| receiver.try_recv().ok()).count();
            if dropped > 0 {
                warn!(address = %self.address, dropped, "Discarded queued messages on dispose");
            }
        }
    }
}

/// Builds [`LoopbackTransport`]s for `loopback://` addresses.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoopbackTransportFactory;

impl LoopbackTransportFactory {
    /// The scheme this factory handles.
    pub const SCHEME: &'static str = "loopback";
}

impl TransportFactory for LoopbackTransportFactory {
    fn scheme(&self) -> &str {
        Self::SCHEME
    }

    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>, TransitError> {
        trace!(address = %settings.address, capacity = settings.capacity, "Building loopback transport");
        Ok(Arc::new(LoopbackTransport::new(settings.address.clone(), settings.capacity)))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc::unbounded_channel;

    use super::*;
    use crate::common::FutureBox;
    use crate::message::MessageId;

    fn message(body: &[u8]) -> TransportMessage {
        TransportMessage {
            message_id: MessageId::new(),
            content_type: "application/octet-stream".to_string(),
            body: body.to_vec(),
        }
    }

    fn forwarding_handler(tx: tokio::sync::mpsc::UnboundedSender<Vec<u8>>) -> TransportHandler {
        Arc::new(move |message: TransportMessage| -> FutureBox {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(message.body);
            })
        })
    }

    #[tokio::test]
    async fn queued_messages_are_delivered_once_subscribed() {
        let transport = LoopbackTransport::new(Address::parse("loopback://localhost/q").unwrap(), 8);
        transport.send(message(b"one")).await.unwrap();
        transport.send(message(b"two")).await.unwrap();
        assert_eq!(transport.pending(), 2);

        let (tx, mut rx) = unbounded_channel();
        let _subscription = transport.subscribe(forwarding_handler(tx)).unwrap();
        let mut received = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        received.sort();
        assert_eq!(received, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[tokio::test]
    async fn handler_is_called_in_queue_order() {
        let transport = LoopbackTransport::new(Address::parse("loopback://localhost/q").unwrap(), 64);
        for i in 0..32u8 {
            transport.send(message(&[i])).await.unwrap();
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = unbounded_channel();
        let handler: TransportHandler = {
            let seen = Arc::clone(&seen);
            Arc::new(move |message: TransportMessage| -> FutureBox {
                seen.lock().push(message.body[0]);
                let tx = tx.clone();
                Box::pin(async move {
                    let _ = tx.send(());
                })
            })
        };
        let _subscription = transport.subscribe(handler).unwrap();
        for _ in 0..32 {
            rx.recv().await.unwrap();
        }
        assert_eq!(*seen.lock(), (0..32u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn only_one_subscription_at_a_time() {
        let transport = LoopbackTransport::new(Address::parse("loopback://localhost/q").unwrap(), 8);
        let (tx, _rx) = unbounded_channel();
        let first = transport.subscribe(forwarding_handler(tx.clone())).unwrap();
        assert!(matches!(
            transport.subscribe(forwarding_handler(tx.clone())),
            Err(TransportError::AlreadySubscribed(_))
        ));
        first.unsubscribe().await;
        assert!(transport.subscribe(forwarding_handler(tx)).is_ok());
    }

    #[tokio::test]
    async fn disposed_transport_rejects_sends() {
        let transport = LoopbackTransport::new(Address::parse("loopback://localhost/q").unwrap(), 8);
        transport.dispose();
        transport.dispose();
        assert!(matches!(transport.send(message(b"late")).await, Err(TransportError::Closed(_))));
        let (tx, _rx) = unbounded_channel();
        assert!(matches!(transport.subscribe(forwarding_handler(tx)), Err(TransportError::Closed(_))));
    }

    #[tokio::test]
    async fn full_queue_applies_backpressure() {
        let transport = LoopbackTransport::new(Address::parse("loopback://localhost/q").unwrap(), 1);
        transport.send(message(b"first")).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), transport.send(message(b"second"))).await;
        assert!(blocked.is_err());
    }
}
