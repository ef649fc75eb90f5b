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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use static_assertions::assert_impl_all;
use tracing::{debug, instrument, trace};

use crate::common::{TransitError, TransitResult};
use crate::endpoint::configurator::{EndpointCacheSettings, EndpointSettings};
use crate::endpoint::{Address, Endpoint, EndpointCacheConfigurator, ToAddress};
use crate::traits::{MessageSerializer, TransportSettings};

/// Owns every live [`Endpoint`] and creates them on first access.
///
/// `EndpointCache` is a cheap handle; clones share the same endpoints. Resolving the
/// same address twice, from any number of tasks, yields the same `Arc<Endpoint>`, and
/// the transport factory runs once per address.
///
/// # Lifecycle
///
/// [`EndpointCache::dispose`] releases every transport. It runs at most once, and
/// also runs when the last handle is dropped. After disposal, resolution fails with
/// [`TransitError::Disposed`].
#[derive(Clone)]
pub struct EndpointCache(pub(crate) Arc<EndpointCacheInner>);

impl fmt::Debug for EndpointCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointCache")
            .field("endpoints", &self.0.endpoints.len())
            .field("disposed", &self.0.disposed.load(Ordering::Acquire))
            .finish()
    }
}

/// Crate-internal: shared state behind an [`EndpointCache`].
pub(crate) struct EndpointCacheInner {
    settings: EndpointCacheSettings,
    endpoints: DashMap<Address, Arc<Endpoint>>,
    construction_gates: DashMap<Address, Arc<Mutex<()>>>,
    disposed: AtomicBool,
    this: Weak<EndpointCacheInner>,
}

impl EndpointCache {
    /// Configures and creates a cache.
    ///
    /// # Errors
    ///
    /// [`TransitError::Configuration`] when no transport factory is registered, a
    /// scheme is registered twice, or an endpoint override is invalid or uses a
    /// scheme without a factory.
    pub fn new(configure: impl FnOnce(&mut EndpointCacheConfigurator)) -> TransitResult<Self> {
        let mut configurator = EndpointCacheConfigurator::default();
        configure(&mut configurator);
        let settings = configurator.build()?;
        debug!(?settings, "Endpoint cache configured");
        Ok(Self(Arc::new_cyclic(|this| EndpointCacheInner {
            settings,
            endpoints: DashMap::new(),
            construction_gates: DashMap::new(),
            disposed: AtomicBool::new(false),
            this: this.clone(),
        })))
    }

    /// Returns the endpoint for `address`, creating it on first access.
    ///
    /// # Errors
    ///
    /// [`TransitError::InvalidAddress`] for an unparseable address,
    /// [`TransitError::EndpointNotConfigurable`] when no factory handles its scheme,
    /// [`TransitError::Disposed`] after disposal, or any error the factory returns.
    pub fn get_endpoint(&self, address: impl ToAddress) -> TransitResult<Arc<Endpoint>> {
        let address = address.to_address()?;
        self.0.get_endpoint(&address)
    }

    /// Whether an endpoint for `address` has been created.
    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.0.endpoints.contains_key(address)
    }

    /// Number of live endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.0.endpoints.len()
    }

    /// The serializer used by endpoints without an override.
    #[must_use]
    pub fn default_serializer(&self) -> &Arc<dyn MessageSerializer> {
        &self.0.settings.default_serializer
    }

    /// The retry limit used by endpoints without an override.
    #[must_use]
    pub fn default_retry_limit(&self) -> u32 {
        self.0.settings.default_retry_limit
    }

    /// Whether [`EndpointCache::dispose`] has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.0.disposed.load(Ordering::Acquire)
    }

    /// Releases every endpoint's transport. Later calls do nothing.
    pub fn dispose(&self) {
        self.0.dispose();
    }
}

impl EndpointCacheInner {
    #[instrument(skip(self), fields(%address))]
    pub(crate) fn get_endpoint(&self, address: &Address) -> TransitResult<Arc<Endpoint>> {
        if let Some(endpoint) = self.endpoints.get(address) {
            return Ok(Arc::clone(endpoint.value()));
        }
        if self.disposed.load(Ordering::Acquire) {
            return Err(TransitError::Disposed("endpoint cache"));
        }

        let gate = Arc::clone(
            self.construction_gates
                .entry(address.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let _guard = gate.lock();

        // Another caller may have finished while we waited on the gate.
        if let Some(endpoint) = self.endpoints.get(address) {
            return Ok(Arc::clone(endpoint.value()));
        }

        // On failure the gate stays, so callers queued behind it and callers arriving
        // later keep serializing on the same gate.
        let created = self.create_endpoint(address)?;
        let endpoint = match self.endpoints.entry(address.clone()) {
            Entry::Occupied(entry) => {
                created.release();
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(created).value()),
        };
        self.construction_gates
            .remove_if(address, |_, current| Arc::ptr_eq(current, &gate));

        if self.disposed.load(Ordering::Acquire) {
            if let Some((_, endpoint)) = self.endpoints.remove(address) {
                endpoint.release();
            }
            return Err(TransitError::Disposed("endpoint cache"));
        }
        Ok(endpoint)
    }

    fn create_endpoint(&self, address: &Address) -> TransitResult<Arc<Endpoint>> {
        let settings = &self.settings;
        let factory = settings
            .transport_factories
            .get(address.scheme())
            .ok_or_else(|| TransitError::EndpointNotConfigurable {
                address: address.to_string(),
                scheme: address.scheme().to_string(),
            })?;

        let overrides = settings.endpoints.get(address).cloned().unwrap_or_else(EndpointSettings::default);
        let serializer = overrides
            .serializer
            .unwrap_or_else(|| Arc::clone(&settings.default_serializer));
        let retry_limit = overrides.retry_limit.unwrap_or(settings.default_retry_limit);
        let error_address = overrides
            .error_address
            .unwrap_or_else(|| address.with_path_suffix(&settings.error_queue_suffix));

        let transport = factory.build(&TransportSettings::new(address.clone(), settings.transport_capacity))?;
        let tracker = (settings.tracker_factory)(retry_limit);

        trace!(
            %address,
            kind = transport.kind(),
            serializer = serializer.content_type(),
            %error_address,
            retry_limit,
            "Endpoint created"
        );
        Ok(Arc::new(Endpoint::new(
            address.clone(),
            transport,
            serializer,
            error_address,
            overrides.discard_faulting_messages,
            retry_limit,
            settings.error_transport_timeout,
            tracker,
            self.this.clone(),
        )))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let addresses: Vec<Address> = self.endpoints.iter().map(|entry| entry.key().clone()).collect();
        debug!(endpoints = addresses.len(), "Disposing endpoint cache");
        for address in addresses {
            if let Some((_, endpoint)) = self.endpoints.remove(&address) {
                endpoint.release();
            }
        }
    }
}

impl Drop for EndpointCacheInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

assert_impl_all!(EndpointCache: Send, Sync, Clone);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::{JsonMessageSerializer, MessagePackMessageSerializer};
    use crate::transport::LoopbackTransportFactory;

    fn cache() -> EndpointCache {
        EndpointCache::new(|x| {
            x.add_transport_factory(LoopbackTransportFactory);
            x.configure_endpoint("loopback://localhost/mt_client", |y| {
                y.use_serializer::<MessagePackMessageSerializer>();
            });
        })
        .unwrap()
    }

    #[test]
    fn same_address_same_instance() {
        let cache = cache();
        let a = cache.get_endpoint("loopback://localhost/mt_server").unwrap();
        let b = cache.get_endpoint("LOOPBACK://localhost/mt_server/").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.endpoint_count(), 1);
    }

    #[test]
    fn unknown_scheme_is_not_configurable() {
        let error = cache().get_endpoint("rabbitmq://localhost/orders").unwrap_err();
        assert!(matches!(error, TransitError::EndpointNotConfigurable { ref scheme, .. } if scheme == "rabbitmq"));
    }

    #[test]
    fn override_and_default_serializers() {
        let cache = cache();
        let client = cache.get_endpoint("loopback://localhost/mt_client").unwrap();
        let server = cache.get_endpoint("loopback://localhost/mt_server").unwrap();
        assert_eq!(client.serializer().content_type(), MessagePackMessageSerializer::CONTENT_TYPE);
        assert_eq!(server.serializer().content_type(), JsonMessageSerializer::CONTENT_TYPE);
        assert_eq!(server.error_address().to_string(), "loopback://localhost/mt_server_error");
    }

    #[test]
    fn disposed_cache_refuses_resolution() {
        let cache = cache();
        cache.get_endpoint("loopback://localhost/mt_server").unwrap();
        cache.dispose();
        cache.dispose();
        assert!(cache.is_disposed());
        assert_eq!(cache.endpoint_count(), 0);
        assert!(matches!(
            cache.get_endpoint("loopback://localhost/mt_server"),
            Err(TransitError::Disposed(_))
        ));
    }
}
