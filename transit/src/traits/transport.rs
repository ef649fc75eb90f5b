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

use std::fmt::Debug;

use async_trait::async_trait;

use crate::common::{TransportError, TransportHandler};
use crate::endpoint::Address;
use crate::message::MessageId;
use crate::transport::TransportSubscription;

/// Serialized bytes plus the metadata a transport needs to move them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportMessage {
    /// The id of the enclosed message.
    pub message_id: MessageId,
    /// Content type of the serializer that produced `body`.
    pub content_type: String,
    /// The serialized envelope.
    pub body: Vec<u8>,
}

/// A pluggable one-way send/receive primitive bound to one address.
///
/// Transports are exclusively owned by their [`Endpoint`](crate::endpoint::Endpoint).
/// Implementations decide how `send` suspends (a bounded queue, a socket write) and
/// how received messages are scheduled onto the handler.
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// The address this transport sends to and receives from.
    fn address(&self) -> &Address;

    /// Short, human-readable transport kind, e.g. `"loopback"`.
    fn kind(&self) -> &'static str;

    /// Hands `message` to the transport. Returns once the transport has accepted it.
    async fn send(&self, message: TransportMessage) -> Result<(), TransportError>;

    /// Starts delivering received messages to `handler`.
    ///
    /// A transport has at most one active subscription; dropping or unsubscribing the
    /// returned [`TransportSubscription`] stops delivery. `handler` is called once per
    /// message in the order messages were received; the futures it returns may run
    /// concurrently.
    fn subscribe(&self, handler: TransportHandler) -> Result<TransportSubscription, TransportError>;

    /// Releases the transport. Later sends fail with [`TransportError::Closed`].
    fn dispose(&self);
}
