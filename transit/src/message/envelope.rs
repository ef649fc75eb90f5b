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

//! The serializer-facing form of a message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::SerializationError;
use crate::endpoint::Address;
use crate::message::{CorrelationId, Headers, MessageId, SendContext};
use crate::traits::BusMessage;

/// A message plus its routing metadata, as handed to a [`MessageSerializer`](crate::traits::MessageSerializer).
///
/// The body is held as a format-neutral [`serde_json::Value`]; each serializer decides
/// how the whole envelope is laid out on the wire.
///
/// # Wire Format
///
/// With the JSON serializer:
///
/// ```json
/// {
///   "messageId": "01920a5e-...",
///   "correlationId": "01920a5e-...",
///   "sourceAddress": "loopback://localhost/bus",
///   "destinationAddress": "loopback://localhost/input_queue",
///   "responseAddress": null,
///   "faultAddress": null,
///   "messageType": "urn:message:tests:PingMessage",
///   "headers": { "One": "1" },
///   "message": { }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Unique id of this message.
    pub message_id: MessageId,
    /// Correlation id, if the sender assigned one.
    #[serde(default)]
    pub correlation_id: Option<CorrelationId>,
    /// Bus address of the sender.
    #[serde(default)]
    pub source_address: Option<Address>,
    /// Endpoint address the message was sent to.
    #[serde(default)]
    pub destination_address: Option<Address>,
    /// Where responses should be sent.
    #[serde(default)]
    pub response_address: Option<Address>,
    /// Where faults should be reported.
    #[serde(default)]
    pub fault_address: Option<Address>,
    /// The message-type URN used for dispatch.
    pub message_type: String,
    /// Application headers.
    #[serde(default)]
    pub headers: Headers,
    /// The message body.
    pub message: Value,
}

impl Envelope {
    /// Builds the envelope for a prepared send context.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Encode`] if the message cannot be represented as a
    /// serde value (for example a map with non-string keys).
    pub fn from_context<T: BusMessage>(context: &SendContext<T>) -> Result<Self, SerializationError> {
        let message = serde_json::to_value(context.message()).map_err(|e| SerializationError::Encode {
            message_type: T::MESSAGE_TYPE.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            message_id: context.message_id(),
            correlation_id: context.correlation_id(),
            source_address: context.source_address().cloned(),
            destination_address: Some(context.destination_address().clone()),
            response_address: context.response_address().cloned(),
            fault_address: context.fault_address().cloned(),
            message_type: T::MESSAGE_TYPE.to_string(),
            headers: context.headers().clone(),
            message,
        })
    }

    /// Reads the body as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`SerializationError::Body`] if the body does not match `T`.
    pub fn read_message<T: BusMessage>(&self) -> Result<T, SerializationError> {
        T::deserialize(&self.message).map_err(|e| SerializationError::Body {
            message_type: T::MESSAGE_TYPE.to_string(),
            reason: e.to_string(),
        })
    }

    /// Whether the envelope carries a message of type `T`.
    #[must_use]
    pub fn is<T: BusMessage>(&self) -> bool {
        self.message_type == T::MESSAGE_TYPE
    }
}
