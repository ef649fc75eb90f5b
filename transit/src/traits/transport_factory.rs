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
use std::sync::Arc;

use derive_new::new;

use crate::common::TransitError;
use crate::endpoint::Address;
use crate::traits::Transport;

/// What a [`TransportFactory`] is given to build one transport.
#[derive(new, Clone, Debug)]
pub struct TransportSettings {
    /// The address the transport is for.
    pub address: Address,
    /// Queue capacity, for transports that buffer.
    pub capacity: usize,
}

/// Builds transports for one address scheme.
///
/// Factories are registered on the [`EndpointCache`](crate::endpoint::EndpointCache)
/// by scheme; building a transport may perform I/O such as opening a local queue.
pub trait TransportFactory: Debug + Send + Sync + 'static {
    /// The address scheme this factory handles, e.g. `"loopback"`.
    fn scheme(&self) -> &str;

    /// Builds a new transport for `settings.address`.
    ///
    /// # Errors
    ///
    /// Any transport-defined failure to open the resource.
    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>, TransitError>;
}
