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

use crate::common::TransitResult;
use crate::endpoint::{Address, Endpoint};
use crate::message::Pipe;
use crate::traits::BusMessage;

/// An [`Endpoint`] seen from a bus: sends carry the bus's address as their source.
#[derive(Clone, Debug)]
pub struct SendEndpoint {
    endpoint: Arc<Endpoint>,
    source_address: Address,
}

impl SendEndpoint {
    pub(crate) const fn new(endpoint: Arc<Endpoint>, source_address: Address) -> Self {
        Self {
            endpoint,
            source_address,
        }
    }

    /// The destination address.
    #[must_use]
    pub fn address(&self) -> &Address {
        self.endpoint.address()
    }

    /// The address stamped as source on every send.
    #[must_use]
    pub const fn source_address(&self) -> &Address {
        &self.source_address
    }

    /// The underlying endpoint.
    #[must_use]
    pub const fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }

    /// Sends `message`.
    ///
    /// # Errors
    ///
    /// See [`Endpoint::send_with`].
    pub async fn send<T: BusMessage>(&self, message: T) -> TransitResult<()> {
        self.endpoint.send(Some(&self.source_address), message).await
    }

    /// Sends `message` after running `pipe` against its context.
    ///
    /// # Errors
    ///
    /// See [`Endpoint::send_with`].
    pub async fn send_with<T: BusMessage>(&self, message: T, pipe: &Pipe<T>) -> TransitResult<()> {
        self.endpoint.send_with(Some(&self.source_address), message, pipe).await
    }
}
