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

use tracing::{instrument, trace};

use crate::common::{ServiceBus, SerializationError, TransitError, TransitResult, CONFIG};
use crate::endpoint::Address;
use crate::message::{CorrelationId, Envelope, Headers, MessageId, Pipe, PipeConfigurator};
use crate::traits::BusMessage;

/// The read-only view a handler gets of a received message.
///
/// Everything the sender's pipe put on the [`SendContext`](crate::message::SendContext)
/// is visible here: headers, correlation id and the four addresses. The context also
/// carries the bus that received the message, so handlers can reply with
/// [`ConsumeContext::respond`].
#[derive(Clone)]
pub struct ConsumeContext<T> {
    message: T,
    message_id: MessageId,
    correlation_id: Option<CorrelationId>,
    source_address: Option<Address>,
    destination_address: Option<Address>,
    response_address: Option<Address>,
    fault_address: Option<Address>,
    headers: Headers,
    retry_count: u32,
    bus: ServiceBus,
}

impl<T: fmt::Debug> fmt::Debug for ConsumeContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumeContext")
            .field("message", &self.message)
            .field("message_id", &self.message_id)
            .field("correlation_id", &self.correlation_id)
            .field("source_address", &self.source_address)
            .field("destination_address", &self.destination_address)
            .field("response_address", &self.response_address)
            .field("fault_address", &self.fault_address)
            .field("headers", &self.headers)
            .field("retry_count", &self.retry_count)
            .finish_non_exhaustive()
    }
}

impl<T: BusMessage> ConsumeContext<T> {
    /// Builds the context for one delivery of `envelope`.
    pub(crate) fn from_envelope(envelope: &Envelope, retry_count: u32, bus: ServiceBus) -> Result<Self, SerializationError> {
        let message = envelope.read_message::<T>()?;
        Ok(Self {
            message,
            message_id: envelope.message_id,
            correlation_id: envelope.correlation_id,
            source_address: envelope.source_address.clone(),
            destination_address: envelope.destination_address.clone(),
            response_address: envelope.response_address.clone(),
            fault_address: envelope.fault_address.clone(),
            headers: envelope
                .headers
                .clone()
                .with_case_insensitive_keys(CONFIG.behavior.case_insensitive_headers),
            retry_count,
            bus,
        })
    }

    /// The message-type URN of the payload.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        T::MESSAGE_TYPE
    }

    /// Sends `response` back to the requester.
    ///
    /// The response goes to the response address, or to the source address when no
    /// response address was set, and carries this message's correlation id.
    ///
    /// # Errors
    ///
    /// [`TransitError::Configuration`] when the message carries neither address, or any
    /// error from resolving the endpoint or sending.
    #[instrument(skip(self, response), fields(request = %self.message_id, response_type = R::MESSAGE_TYPE))]
    pub async fn respond<R: BusMessage>(&self, response: R) -> TransitResult<()> {
        let target = self
            .response_address
            .as_ref()
            .or(self.source_address.as_ref())
            .cloned()
            .ok_or_else(|| {
                TransitError::Configuration(format!(
                    "message {} has no response or source address to respond to",
                    self.message_id
                ))
            })?;
        let correlation_id = self.correlation_id;
        let pipe = Pipe::new(|x: &mut PipeConfigurator<R>| {
            if let Some(id) = correlation_id {
                x.set_correlation_id(id);
            }
        });
        trace!(%target, "Responding");
        self.bus.get_send_endpoint(&target)?.send_with(response, &pipe).await
    }
}

impl<T> ConsumeContext<T> {
    /// The message payload.
    #[inline]
    pub const fn message(&self) -> &T {
        &self.message
    }

    /// Consumes the context, returning the payload.
    pub fn into_message(self) -> T {
        self.message
    }

    /// The id assigned by the sender.
    #[inline]
    #[must_use]
    pub const fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// The correlation id, if the sender set one.
    #[inline]
    #[must_use]
    pub const fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// The sending bus's address.
    #[inline]
    #[must_use]
    pub const fn source_address(&self) -> Option<&Address> {
        self.source_address.as_ref()
    }

    /// The endpoint address the message was sent to.
    #[inline]
    #[must_use]
    pub const fn destination_address(&self) -> Option<&Address> {
        self.destination_address.as_ref()
    }

    /// Where responses should be sent.
    #[inline]
    #[must_use]
    pub const fn response_address(&self) -> Option<&Address> {
        self.response_address.as_ref()
    }

    /// Where faults should be reported.
    #[inline]
    #[must_use]
    pub const fn fault_address(&self) -> Option<&Address> {
        self.fault_address.as_ref()
    }

    /// The headers set by the sender.
    #[inline]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// How many times this message has been redelivered after a handler failure.
    #[inline]
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// The bus that received the message.
    #[inline]
    pub const fn bus(&self) -> &ServiceBus {
        &self.bus
    }
}
