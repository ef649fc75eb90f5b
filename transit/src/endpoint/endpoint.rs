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

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use crate::common::{TransitError, TransitResult, TransportError};
use crate::endpoint::{Address, EndpointCacheInner};
use crate::message::{Envelope, Pipe, PipeFlow, SendContext};
use crate::traits::{BusMessage, InboundMessageTracker, MessageSerializer, Transport, TransportMessage};
use crate::transport::NullTransport;

/// An address bound to a transport, a serializer and error routing.
///
/// Endpoints are created by the [`EndpointCache`](crate::endpoint::EndpointCache), at
/// most once per address, and shared as `Arc<Endpoint>`. Serializer and retry limit
/// are fixed at creation. The error transport is resolved from the cache on first use.
pub struct Endpoint {
    address: Address,
    transport: Arc<dyn Transport>,
    serializer: Arc<dyn MessageSerializer>,
    error_address: Address,
    error_transport: OnceLock<Arc<dyn Transport>>,
    discard_faulting_messages: bool,
    retry_limit: u32,
    error_transport_timeout: Duration,
    tracker: Arc<dyn InboundMessageTracker>,
    cache: Weak<EndpointCacheInner>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("address", &self.address)
            .field("transport", &self.transport.kind())
            .field("serializer", &self.serializer.content_type())
            .field("error_address", &self.error_address)
            .field("discard_faulting_messages", &self.discard_faulting_messages)
            .field("retry_limit", &self.retry_limit)
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        address: Address,
        transport: Arc<dyn Transport>,
        serializer: Arc<dyn MessageSerializer>,
        error_address: Address,
        discard_faulting_messages: bool,
        retry_limit: u32,
        error_transport_timeout: Duration,
        tracker: Arc<dyn InboundMessageTracker>,
        cache: Weak<EndpointCacheInner>,
    ) -> Self {
        Self {
            address,
            transport,
            serializer,
            error_address,
            error_transport: OnceLock::new(),
            discard_faulting_messages,
            retry_limit,
            error_transport_timeout,
            tracker,
            cache,
        }
    }

    /// The address this endpoint is bound to.
    #[inline]
    #[must_use]
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// The transport.
    #[inline]
    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The serializer.
    #[inline]
    #[must_use]
    pub fn serializer(&self) -> &Arc<dyn MessageSerializer> {
        &self.serializer
    }

    /// Where faulting messages go.
    #[inline]
    #[must_use]
    pub const fn error_address(&self) -> &Address {
        &self.error_address
    }

    /// Whether faulting messages are dropped rather than kept in an error queue.
    #[inline]
    #[must_use]
    pub const fn discards_faulting_messages(&self) -> bool {
        self.discard_faulting_messages
    }

    /// The number of redeliveries allowed before a message is moved to the error transport.
    #[inline]
    #[must_use]
    pub const fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// The inbound tracker.
    #[inline]
    #[must_use]
    pub fn tracker(&self) -> &Arc<dyn InboundMessageTracker> {
        &self.tracker
    }

    /// Resolves the error transport, creating the error endpoint on first use.
    ///
    /// # Errors
    ///
    /// [`TransitError::Disposed`] once the owning cache is gone, or any error from
    /// resolving the error address.
    pub fn error_transport(&self) -> TransitResult<Arc<dyn Transport>> {
        if let Some(transport) = self.error_transport.get() {
            return Ok(Arc::clone(transport));
        }
        let transport: Arc<dyn Transport> = if self.discard_faulting_messages {
            Arc::new(NullTransport::new(self.error_address.clone()))
        } else {
            let cache = self.cache.upgrade().ok_or(TransitError::Disposed("endpoint cache"))?;
            let endpoint = cache.get_endpoint(&self.error_address)?;
            Arc::clone(endpoint.transport())
        };
        trace!(address = %self.address, error_address = %self.error_address, kind = transport.kind(), "Error transport resolved");
        Ok(Arc::clone(self.error_transport.get_or_init(|| transport)))
    }

    /// Sends `message` with no extra pipe steps.
    ///
    /// # Errors
    ///
    /// See [`Endpoint::send_with`].
    pub async fn send<T: BusMessage>(&self, source_address: Option<&Address>, message: T) -> TransitResult<()> {
        self.send_with(source_address, message, &Pipe::empty()).await
    }

    /// Builds a fresh send context, runs `pipe` against it, serializes it and hands it
    /// to the transport.
    ///
    /// A pipe that stops early skips the send without error. Nothing is retried here.
    ///
    /// # Errors
    ///
    /// [`TransitError::PipeStep`], [`TransitError::Serialization`] or
    /// [`TransitError::Transport`].
    #[instrument(skip(self, source_address, message, pipe), fields(destination = %self.address, message_type = T::MESSAGE_TYPE))]
    pub async fn send_with<T: BusMessage>(
        &self,
        source_address: Option<&Address>,
        message: T,
        pipe: &Pipe<T>,
    ) -> TransitResult<()> {
        let mut context = SendContext::new(message, source_address.cloned(), self.address.clone());
        if pipe.execute(&mut context)? == PipeFlow::Stop {
            debug!(message_id = %context.message_id(), "Send skipped by pipe");
            return Ok(());
        }
        let envelope = Envelope::from_context(&context)?;
        let body = self.serializer.serialize(&envelope)?;
        self.transport
            .send(TransportMessage {
                message_id: envelope.message_id,
                content_type: self.serializer.content_type().to_string(),
                body,
            })
            .await?;
        trace!(message_id = %envelope.message_id, "Message sent");
        Ok(())
    }

    /// Puts an already serialized message back on this endpoint's own transport.
    pub(crate) async fn redeliver(&self, message: TransportMessage) -> TransitResult<()> {
        trace!(address = %self.address, message_id = %message.message_id, "Redelivering message");
        self.transport.send(message).await?;
        Ok(())
    }

    /// Moves a message to the error transport.
    ///
    /// Waits at most the error transport timeout for room. The message is settled
    /// either way, so a full error queue loses the message instead of stalling the
    /// endpoint.
    pub(crate) async fn move_to_error(&self, message: TransportMessage, reason: &str) -> TransitResult<()> {
        let message_id = message.message_id;
        let error_transport = self.error_transport()?;
        warn!(address = %self.address, error_address = %self.error_address, %message_id, reason, "Moving message to error transport");
        let sent = tokio::time::timeout(self.error_transport_timeout, error_transport.send(message)).await;
        self.tracker.message_completed(message_id);
        match sent {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::Failed {
                address: self.error_address.to_string(),
                reason: format!("error transport still full after {:?}", self.error_transport_timeout),
            }
            .into()),
        }
    }

    pub(crate) fn release(&self) {
        trace!(address = %self.address, "Releasing endpoint transport");
        self.transport.dispose();
    }
}
