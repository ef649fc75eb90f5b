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

use static_assertions::assert_impl_all;
use tracing::trace;

use crate::common::CONFIG;
use crate::endpoint::Address;
use crate::message::{CorrelationId, Headers, MessageId};
use crate::traits::BusMessage;

/// The mutable envelope of an outgoing message, seen by [`Pipe`](crate::message::Pipe) steps.
///
/// A fresh `SendContext` is created for every send: destination is the endpoint's
/// address, source is the sending bus's address, and the correlation id, response
/// address, fault address and headers all start empty. Once the pipe has run, the
/// context is converted into an [`Envelope`](crate::message::Envelope) and handed to
/// the transport; it is never reused.
#[derive(Clone, Debug)]
pub struct SendContext<T> {
    pub(crate) message: T,
    pub(crate) message_id: MessageId,
    pub(crate) correlation_id: Option<CorrelationId>,
    pub(crate) source_address: Option<Address>,
    pub(crate) destination_address: Address,
    pub(crate) response_address: Option<Address>,
    pub(crate) fault_address: Option<Address>,
    pub(crate) headers: Headers,
}

impl<T: BusMessage> SendContext<T> {
    /// Crate-internal: creates the default context for a send.
    pub(crate) fn new(message: T, source_address: Option<Address>, destination_address: Address) -> Self {
        let message_id = MessageId::new();
        trace!(%message_id, destination = %destination_address, message_type = T::MESSAGE_TYPE, "Creating SendContext");
        Self {
            message,
            message_id,
            correlation_id: None,
            source_address,
            destination_address,
            response_address: None,
            fault_address: None,
            headers: Headers::new().with_case_insensitive_keys(CONFIG.behavior.case_insensitive_headers),
        }
    }

    /// The message-type URN of the payload.
    #[inline]
    #[must_use]
    pub fn message_type(&self) -> &'static str {
        T::MESSAGE_TYPE
    }
}

impl<T> SendContext<T> {
    /// The message payload.
    #[inline]
    pub const fn message(&self) -> &T {
        &self.message
    }

    /// Mutable access to the payload.
    #[inline]
    pub fn message_mut(&mut self) -> &mut T {
        &mut self.message
    }

    /// The id assigned to this message.
    #[inline]
    #[must_use]
    pub const fn message_id(&self) -> MessageId {
        self.message_id
    }

    /// The correlation id, if one has been set.
    #[inline]
    #[must_use]
    pub const fn correlation_id(&self) -> Option<CorrelationId> {
        self.correlation_id
    }

    /// Sets the correlation id.
    pub fn set_correlation_id(&mut self, correlation_id: CorrelationId) {
        self.correlation_id = Some(correlation_id);
    }

    /// The sending bus's address.
    #[inline]
    #[must_use]
    pub const fn source_address(&self) -> Option<&Address> {
        self.source_address.as_ref()
    }

    /// The endpoint address the message is being sent to.
    #[inline]
    #[must_use]
    pub const fn destination_address(&self) -> &Address {
        &self.destination_address
    }

    /// Where responses should go, if anywhere.
    #[inline]
    #[must_use]
    pub const fn response_address(&self) -> Option<&Address> {
        self.response_address.as_ref()
    }

    /// Sets or clears the response address.
    pub fn set_response_address(&mut self, address: Option<Address>) {
        self.response_address = address;
    }

    /// Where faults should be reported, if anywhere.
    #[inline]
    #[must_use]
    pub const fn fault_address(&self) -> Option<&Address> {
        self.fault_address.as_ref()
    }

    /// Sets or clears the fault address.
    pub fn set_fault_address(&mut self, address: Option<Address>) {
        self.fault_address = address;
    }

    /// The headers.
    #[inline]
    pub const fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the headers.
    #[inline]
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }
}

assert_impl_all!(SendContext<u32>: Send, Sync);
