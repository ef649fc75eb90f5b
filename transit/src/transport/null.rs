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

use async_trait::async_trait;
use tracing::trace;

use crate::common::{TransportError, TransportHandler};
use crate::endpoint::Address;
use crate::traits::{Transport, TransportMessage};
use crate::transport::TransportSubscription;

/// A transport that accepts and drops every message. Used as the error transport of
/// endpoints configured to discard faulting messages.
#[derive(Debug)]
pub struct NullTransport {
    address: Address,
}

impl NullTransport {
    /// Creates a null transport nominally bound to `address`.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self { address }
    }
}

#[async_trait]
impl Transport for NullTransport {
    fn address(&self) -> &Address {
        &self.address
    }

    fn kind(&self) -> &'static str {
        "null"
    }

    async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        trace!(address = %self.address, message_id = %message.message_id, "Discarding message");
        Ok(())
    }

    fn subscribe(&self, _handler: TransportHandler) -> Result<TransportSubscription, TransportError> {
        Ok(TransportSubscription::inert())
    }

    fn dispose(&self) {}
}
