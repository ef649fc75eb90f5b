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
use std::sync::Arc;
use std::time::Duration;

use tracing::trace;

use crate::common::{TransitError, CONFIG};
use crate::endpoint::Address;
use crate::serialization::JsonMessageSerializer;
use crate::tracking::InMemoryInboundMessageTracker;
use crate::traits::{InboundMessageTracker, MessageSerializer, TransportFactory};

/// Builds the inbound tracker of an endpoint from its retry limit.
pub type TrackerFactory = Arc<dyn Fn(u32) -> Arc<dyn InboundMessageTracker> + Send + Sync + 'static>;

/// Collects the options of an [`EndpointCache`](crate::endpoint::EndpointCache).
///
/// Defaults come from [`CONFIG`]: retry limit, transport capacity and error-queue
/// suffix. The default serializer is [`JsonMessageSerializer`] and the default tracker
/// is [`InMemoryInboundMessageTracker`].
///
/// ```rust,ignore
/// let cache = EndpointCache::new(|x| {
///     x.set_default_retry_limit(5);
///     x.set_default_inbound_message_tracker_factory(InMemoryInboundMessageTracker::new);
///     x.add_transport_factory(LoopbackTransportFactory);
///     x.configure_endpoint("loopback://localhost/mt_client", |y| {
///         y.use_serializer::<MessagePackMessageSerializer>();
///     });
///     x.configure_endpoint("loopback://localhost/mt_other", |y| {
///         y.set_error_address("loopback://localhost/mt_error");
///     });
/// })?;
/// ```
pub struct EndpointCacheConfigurator {
    retry_limit: u32,
    tracker_factory: TrackerFactory,
    default_serializer: Arc<dyn MessageSerializer>,
    transport_factories: Vec<Arc<dyn TransportFactory>>,
    endpoints: Vec<(String, EndpointConfigurator)>,
    transport_capacity: usize,
    error_queue_suffix: String,
    error_transport_timeout: Duration,
}

impl fmt::Debug for EndpointCacheConfigurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCacheConfigurator")
            .field("retry_limit", &self.retry_limit)
            .field("default_serializer", &self.default_serializer)
            .field("transport_factories", &self.transport_factories)
            .field("endpoints", &self.endpoints)
            .field("transport_capacity", &self.transport_capacity)
            .field("error_transport_timeout", &self.error_transport_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for EndpointCacheConfigurator {
    fn default() -> Self {
        Self {
            retry_limit: CONFIG.defaults.retry_limit,
            tracker_factory: Arc::new(|limit| Arc::new(InMemoryInboundMessageTracker::new(limit))),
            default_serializer: Arc::new(JsonMessageSerializer),
            transport_factories: Vec::new(),
            endpoints: Vec::new(),
            transport_capacity: CONFIG.limits.loopback_capacity,
            error_queue_suffix: CONFIG.defaults.error_queue_suffix.clone(),
            error_transport_timeout: CONFIG.error_transport_timeout(),
        }
    }
}

impl EndpointCacheConfigurator {
    /// Sets the retry limit of endpoints without their own.
    pub fn set_default_retry_limit(&mut self, retry_limit: u32) -> &mut Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Sets how each endpoint's inbound tracker is built from its retry limit.
    pub fn set_default_inbound_message_tracker_factory<F, K>(&mut self, factory: F) -> &mut Self
    where
        F: Fn(u32) -> K + Send + Sync + 'static,
        K: InboundMessageTracker,
    {
        self.tracker_factory = Arc::new(move |limit| Arc::new(factory(limit)));
        self
    }

    /// Sets the serializer of endpoints without their own.
    pub fn set_default_serializer<S: MessageSerializer + Default>(&mut self) -> &mut Self {
        self.default_serializer = Arc::new(S::default());
        self
    }

    /// Registers a transport factory for its scheme.
    pub fn add_transport_factory(&mut self, factory: impl TransportFactory) -> &mut Self {
        self.transport_factories.push(Arc::new(factory));
        self
    }

    /// Queue capacity handed to transport factories.
    pub fn set_transport_capacity(&mut self, capacity: usize) -> &mut Self {
        self.transport_capacity = capacity;
        self
    }

    /// Suffix used to derive error addresses by convention.
    pub fn set_error_queue_suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.error_queue_suffix = suffix.into();
        self
    }

    /// How long moving a faulting message to its error transport may wait for room.
    pub fn set_error_transport_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.error_transport_timeout = timeout;
        self
    }

    /// Overrides the configuration of one address.
    pub fn configure_endpoint(
        &mut self,
        address: impl Into<String>,
        configure: impl FnOnce(&mut EndpointConfigurator),
    ) -> &mut Self {
        let mut endpoint = EndpointConfigurator::default();
        configure(&mut endpoint);
        self.endpoints.push((address.into(), endpoint));
        self
    }

    /// Validates everything and produces the resolved settings.
    pub(crate) fn build(self) -> Result<EndpointCacheSettings, TransitError> {
        if self.transport_factories.is_empty() {
            return Err(TransitError::Configuration("no transport factory is registered".to_string()));
        }
        if self.error_queue_suffix.is_empty() {
            return Err(TransitError::Configuration("the error queue suffix must not be empty".to_string()));
        }

        let mut transport_factories = HashMap::new();
        for factory in self.transport_factories {
            let scheme = factory.scheme().to_ascii_lowercase();
            if transport_factories.insert(scheme.clone(), factory).is_some() {
                return Err(TransitError::Configuration(format!(
                    "more than one transport factory is registered for scheme `{scheme}`"
                )));
            }
        }

        let known_scheme = |address: &Address, role: &str| {
            if transport_factories.contains_key(address.scheme()) {
                Ok(())
            } else {
                Err(TransitError::Configuration(format!(
                    "{role} {address} uses scheme `{}`, which has no transport factory",
                    address.scheme()
                )))
            }
        };

        let mut endpoints = HashMap::new();
        for (raw, endpoint) in self.endpoints {
            let address = Address::parse(&raw)
                .map_err(|e| TransitError::Configuration(format!("configured endpoint: {e}")))?;
            known_scheme(&address, "configured endpoint")?;
            let error_address = endpoint
                .error_address
                .as_deref()
                .map(Address::parse)
                .transpose()
                .map_err(|e| TransitError::Configuration(format!("error address of {address}: {e}")))?;
            if let Some(error_address) = &error_address {
                known_scheme(error_address, "error address")?;
                if *error_address == address {
                    return Err(TransitError::Configuration(format!(
                        "endpoint {address} cannot be its own error address"
                    )));
                }
            }
            let settings = EndpointSettings {
                serializer: endpoint.serializer,
                error_address,
                discard_faulting_messages: endpoint.discard_faulting_messages,
                retry_limit: endpoint.retry_limit,
            };
            trace!(%address, ?settings, "Endpoint configured");
            if endpoints.insert(address.clone(), settings).is_some() {
                return Err(TransitError::Configuration(format!("endpoint {address} is configured more than once")));
            }
        }

        Ok(EndpointCacheSettings {
            transport_factories,
            endpoints,
            default_serializer: self.default_serializer,
            default_retry_limit: self.retry_limit,
            tracker_factory: self.tracker_factory,
            transport_capacity: self.transport_capacity,
            error_queue_suffix: self.error_queue_suffix,
            error_transport_timeout: self.error_transport_timeout,
        })
    }
}

/// Per-address overrides collected by [`EndpointCacheConfigurator::configure_endpoint`].
#[derive(Debug, Default)]
pub struct EndpointConfigurator {
    serializer: Option<Arc<dyn MessageSerializer>>,
    error_address: Option<String>,
    discard_faulting_messages: bool,
    retry_limit: Option<u32>,
}

impl EndpointConfigurator {
    /// Uses `S` instead of the cache-wide default serializer.
    pub fn use_serializer<S: MessageSerializer + Default>(&mut self) -> &mut Self {
        self.serializer = Some(Arc::new(S::default()));
        self
    }

    /// Routes faulting messages to `address` instead of the conventional error queue.
    pub fn set_error_address(&mut self, address: impl Into<String>) -> &mut Self {
        self.error_address = Some(address.into());
        self
    }

    /// Drops faulting messages instead of moving them to an error queue.
    pub fn discard_faulting_messages(&mut self) -> &mut Self {
        self.discard_faulting_messages = true;
        self
    }

    /// Uses `retry_limit` instead of the cache-wide default.
    pub fn set_retry_limit(&mut self, retry_limit: u32) -> &mut Self {
        self.retry_limit = Some(retry_limit);
        self
    }
}

/// Crate-internal: validated overrides for one address.
#[derive(Debug, Clone, Default)]
pub(crate) struct EndpointSettings {
    pub(crate) serializer: Option<Arc<dyn MessageSerializer>>,
    pub(crate) error_address: Option<Address>,
    pub(crate) discard_faulting_messages: bool,
    pub(crate) retry_limit: Option<u32>,
}

/// Crate-internal: validated cache configuration.
pub(crate) struct EndpointCacheSettings {
    pub(crate) transport_factories: HashMap<String, Arc<dyn TransportFactory>>,
    pub(crate) endpoints: HashMap<Address, EndpointSettings>,
    pub(crate) default_serializer: Arc<dyn MessageSerializer>,
    pub(crate) default_retry_limit: u32,
    pub(crate) tracker_factory: TrackerFactory,
    pub(crate) transport_capacity: usize,
    pub(crate) error_queue_suffix: String,
    pub(crate) error_transport_timeout: Duration,
}

impl fmt::Debug for EndpointCacheSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCacheSettings")
            .field("schemes", &self.transport_factories.keys().collect::<Vec<_>>())
            .field("endpoints", &self.endpoints)
            .field("default_serializer", &self.default_serializer)
            .field("default_retry_limit", &self.default_retry_limit)
            .field("transport_capacity", &self.transport_capacity)
            .field("error_queue_suffix", &self.error_queue_suffix)
            .field("error_transport_timeout", &self.error_transport_timeout)
            .finish_non_exhaustive()
    }
}
