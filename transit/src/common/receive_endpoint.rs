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

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, error, trace, trace_span, warn, Instrument};

use crate::common::service_bus::BusInner;
use crate::common::{ErasedHandler, FutureBox, HandlerFuture, HandlerId, ServiceBus, TransitResult, TransportHandler};
use crate::endpoint::{Address, Endpoint};
use crate::message::{ConsumeContext, CorrelationId, Envelope, Fault, MessageId, Pipe, PipeConfigurator};
use crate::traits::{BusMessage, TransportMessage};
use crate::transport::TransportSubscription;

/// Wraps a typed handler so it can be stored next to handlers of other message types.
pub(crate) fn erase_handler<T, F, Fut>(handler: F) -> ErasedHandler
where
    T: BusMessage,
    F: Fn(ConsumeContext<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |envelope: Arc<Envelope>, retry_count: u32, bus: ServiceBus| -> HandlerFuture {
        match ConsumeContext::<T>::from_envelope(&envelope, retry_count, bus) {
            Ok(context) => Box::pin(handler(context)),
            Err(e) => Box::pin(async move { Err(anyhow::Error::new(e)) }),
        }
    })
}

/// Collects the handlers attached by [`ServiceBus::receive_endpoint`].
#[derive(Default)]
pub struct ReceiveEndpointConfigurator {
    handlers: Vec<(&'static str, ErasedHandler)>,
}

impl fmt::Debug for ReceiveEndpointConfigurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.handlers.iter().map(|(message_type, _)| message_type)).finish()
    }
}

impl ReceiveEndpointConfigurator {
    /// Handles every `T` received on the endpoint.
    ///
    /// A handler that returns an error causes the message to be retried, and moved to
    /// the error transport once the endpoint's retry limit is exceeded.
    pub fn handler<T, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        T: BusMessage,
        F: Fn(ConsumeContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers.push((T::MESSAGE_TYPE, erase_handler(handler)));
        self
    }

    pub(crate) fn into_handlers(self) -> Vec<(&'static str, ErasedHandler)> {
        self.handlers
    }
}

/// A registered handler. Call [`HandlerSubscription::unsubscribe`] to remove it.
///
/// Dropping the subscription leaves the handler in place.
#[derive(Debug)]
pub struct HandlerSubscription {
    receive_endpoint: Weak<ReceiveEndpoint>,
    message_type: &'static str,
    id: HandlerId,
}

impl HandlerSubscription {
    /// The message type the handler receives.
    #[must_use]
    pub const fn message_type(&self) -> &'static str {
        self.message_type
    }

    /// Removes the handler. Messages already being dispatched still reach it.
    pub fn unsubscribe(self) {
        if let Some(receive_endpoint) = self.receive_endpoint.upgrade() {
            receive_endpoint.remove_handler(self.message_type, self.id);
        }
    }
}

/// Crate-internal: an endpoint the bus consumes from, with its handlers.
pub(crate) struct ReceiveEndpoint {
    endpoint: Arc<Endpoint>,
    handlers: DashMap<&'static str, HashMap<HandlerId, ErasedHandler>>,
    subscription: Mutex<Option<TransportSubscription>>,
    bus: Weak<BusInner>,
}

impl fmt::Debug for ReceiveEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveEndpoint")
            .field("address", self.endpoint.address())
            .field("message_types", &self.handlers.iter().map(|entry| *entry.key()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ReceiveEndpoint {
    /// Creates the receive endpoint and starts consuming from its transport.
    pub(crate) fn start(endpoint: Arc<Endpoint>, bus: Weak<BusInner>) -> TransitResult<Arc<Self>> {
        let receive_endpoint = Arc::new(Self {
            endpoint,
            handlers: DashMap::new(),
            subscription: Mutex::new(None),
            bus,
        });

        let weak = Arc::downgrade(&receive_endpoint);
        let handler: TransportHandler = Arc::new(move |message: TransportMessage| -> FutureBox {
            match weak.upgrade() {
                Some(receive_endpoint) => receive_endpoint.dispatch(message),
                None => Box::pin(async {}),
            }
        });
        let subscription = receive_endpoint.endpoint.transport().subscribe(handler)?;
        *receive_endpoint.subscription.lock() = Some(subscription);
        debug!(address = %receive_endpoint.address(), "Receive endpoint started");
        Ok(receive_endpoint)
    }

    pub(crate) fn address(&self) -> &Address {
        self.endpoint.address()
    }

    pub(crate) fn add_handler(self: &Arc<Self>, message_type: &'static str, id: HandlerId, handler: ErasedHandler) -> HandlerSubscription {
        self.handlers.entry(message_type).or_default().insert(id, handler);
        trace!(address = %self.address(), message_type, id, "Handler added");
        HandlerSubscription {
            receive_endpoint: Arc::downgrade(self),
            message_type,
            id,
        }
    }

    fn remove_handler(&self, message_type: &'static str, id: HandlerId) {
        let now_empty = self.handlers.get_mut(message_type).is_some_and(|mut handlers| {
            handlers.remove(&id);
            handlers.is_empty()
        });
        if now_empty {
            self.handlers.remove_if(message_type, |_, handlers| handlers.is_empty());
        }
        trace!(address = %self.address(), message_type, id, "Handler removed");
    }

    /// Number of handlers registered for `message_type`.
    pub(crate) fn handler_count(&self, message_type: &str) -> usize {
        self.handlers.get(message_type).map_or(0, |handlers| handlers.len())
    }

    /// Stops consuming and waits for the receive loop to exit.
    pub(crate) async fn stop(&self) {
        let subscription = self.subscription.lock().take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe().await;
            debug!(address = %self.address(), "Receive endpoint stopped");
        }
    }

    /// Dispatches one received message to every handler of its type.
    ///
    /// The handlers are invoked right away, so messages reach them in the order the
    /// transport delivered them. The returned future runs the handler futures
    /// concurrently, each on its own task, so a failing or panicking handler does not
    /// stop its siblings, and then settles the message.
    fn dispatch(self: &Arc<Self>, message: TransportMessage) -> FutureBox {
        let span = trace_span!("receive", address = %self.endpoint.address(), message_id = %message.message_id);
        let _entered = span.enter();

        let Some(bus) = self.bus.upgrade().map(ServiceBus) else {
            trace!("Bus is gone; dropping message");
            return Box::pin(async {});
        };

        let envelope = match self.endpoint.serializer().deserialize(&message.body) {
            Ok(envelope) => Arc::new(envelope),
            Err(e) => {
                error!("Failed to deserialize message: {}", e);
                let endpoint = Arc::clone(&self.endpoint);
                return Box::pin(
                    async move {
                        if let Err(e) = endpoint.move_to_error(message, &e.to_string()).await {
                            error!("Failed to move message to error transport: {}", e);
                        }
                    }
                    .instrument(span.clone()),
                );
            }
        };

        let handlers: Vec<ErasedHandler> = self
            .handlers
            .get(envelope.message_type.as_str())
            .map(|handlers| handlers.values().cloned().collect())
            .unwrap_or_default();
        if handlers.is_empty() {
            trace!(message_type = %envelope.message_type, "No handler registered; skipping message");
            return Box::pin(async {});
        }

        let retry_count = self.endpoint.tracker().retry_count(envelope.message_id);
        let pending: Vec<HandlerFuture> = handlers
            .into_iter()
            .map(|handler| {
                let invoke = AssertUnwindSafe(|| handler(Arc::clone(&envelope), retry_count, bus.clone()));
                catch_unwind(invoke).unwrap_or_else(|_| -> HandlerFuture {
                    Box::pin(async { Err(anyhow::anyhow!("handler panicked while starting")) })
                })
            })
            .collect();

        let receive_endpoint = Arc::clone(self);
        Box::pin(
            async move {
                let results = join_all(pending.into_iter().map(tokio::spawn)).await;
                let reasons: Vec<String> = results
                    .into_iter()
                    .filter_map(|result| match result {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(format!("{e:#}")),
                        Err(e) => Some(format!("handler panicked: {e}")),
                    })
                    .collect();
                receive_endpoint.settle(message, &envelope, reasons, &bus).await;
            }
            .instrument(span.clone()),
        )
    }

    /// Completes, redelivers, or dead-letters a message once its handlers have run.
    async fn settle(&self, message: TransportMessage, envelope: &Envelope, reasons: Vec<String>, bus: &ServiceBus) {
        let tracker = self.endpoint.tracker();
        let message_id = envelope.message_id;
        if reasons.is_empty() {
            tracker.message_completed(message_id);
            return;
        }

        let retries = tracker.increment_retry_count(message_id);
        warn!(message_type = %envelope.message_type, retries, failures = reasons.len(), "Handler failed: {}", reasons.join("; "));
        if !tracker.is_retry_limit_exceeded(message_id) {
            if let Err(e) = self.endpoint.redeliver(message).await {
                error!("Failed to redeliver message: {}", e);
            }
            return;
        }

        if let Err(e) = self.endpoint.move_to_error(message, &reasons.join("; ")).await {
            error!("Failed to move message to error transport: {}", e);
        }
        if let Some(fault_address) = &envelope.fault_address {
            let fault = Fault {
                fault_id: MessageId::new(),
                faulted_message_id: message_id,
                faulted_message_type: envelope.message_type.clone(),
                reasons,
                retry_count: retries.saturating_sub(1),
            };
            if let Err(e) = publish_fault(bus, fault_address, envelope.correlation_id, fault).await {
                error!(%fault_address, "Failed to send fault: {}", e);
            }
        }
    }
}

async fn publish_fault(
    bus: &ServiceBus,
    fault_address: &Address,
    correlation_id: Option<CorrelationId>,
    fault: Fault,
) -> TransitResult<()> {
    let pipe = Pipe::new(|x: &mut PipeConfigurator<Fault>| {
        if let Some(id) = correlation_id {
            x.set_correlation_id(id);
        }
    });
    bus.get_send_endpoint(fault_address)?.send_with(fault, &pipe).await
}
