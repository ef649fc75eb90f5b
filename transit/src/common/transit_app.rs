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

use tracing::trace;

use crate::common::{ServiceBus, TransitResult};
use crate::endpoint::{EndpointCache, ToAddress};

/// Entry point for starting a [`ServiceBus`].
///
/// ```rust,ignore
/// let cache = EndpointCache::new(|x| {
///     x.add_transport_factory(LoopbackTransportFactory);
/// })?;
/// let bus = TransitApp::launch_async(cache.clone(), "loopback://localhost/mt_client").await?;
/// // ...
/// bus.shutdown().await?;
/// cache.dispose();
/// ```
#[derive(Default, Debug, Clone)]
pub struct TransitApp;

impl TransitApp {
    /// Starts a bus at `address` that resolves endpoints through `endpoint_cache`.
    ///
    /// Must be called from within a Tokio runtime: the bus immediately starts
    /// receiving on its own address.
    ///
    /// # Errors
    ///
    /// Address, resolution or transport errors for the bus's own address.
    pub async fn launch_async(endpoint_cache: EndpointCache, address: impl ToAddress) -> TransitResult<ServiceBus> {
        let address = address.to_address()?;
        trace!(%address, "Starting service bus");
        let bus = ServiceBus::start(endpoint_cache, address)?;
        trace!("Service bus started");
        Ok(bus)
    }
}
