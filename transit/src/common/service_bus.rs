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
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use static_assertions::assert_impl_all;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, instrument, trace, warn};

use crate::common::receive_endpoint::{erase_handler, ReceiveEndpoint};
use crate::common::{ErasedHandler, HandlerSubscription, ReceiveEndpointConfigurator, TransitError, TransitResult, CONFIG};
use crate::endpoint::{Address, EndpointCache, SendEndpoint, ToAddress};
use crate::message::{ConsumeContext, Pipe};
use crate::traits::BusMessage;

/// A running bus: sends messages, consumes from receive endpoints, and issues requests.
///
/// `ServiceBus` is a cheap handle; clones share the same bus. The bus has its own
/// address, which it stamps as the source of everything it sends and on which it
/// receives responses to its requests.
#[derive(Clone)]
pub struct ServiceBus(pub(crate) Arc<BusInner>);

/// Crate-internal: shared state behind a [`ServiceBus`].
pub(crate) struct BusInner {
    pub(crate) address: Address,
    pub(crate) endpoint_cache: EndpointCache,
    pub(crate) receive_endpoints: DashMap<Address, Arc<ReceiveEndpoint>>,
    pub(crate) request_timeout: Duration,
    pub(crate) shutdown_timeout: Duration,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) tracker: TaskTracker,
    next_handler_id: AtomicU64,
}

impl fmt::Debug for ServiceBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBus")
            .field("address", &self.0.address)
            .field("receive_endpoints", &self.0.receive_endpoints.len())
            .field("request_timeout", &self.0.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ServiceBus {
    /// Creates a bus bound to `address` and starts receiving on it.
    pub(crate) fn start(endpoint_cache: EndpointCache, address: Address) -> TransitResult<Self> {
        let bus = Self(Arc::new(BusInner {
            address: address.clone(),
            endpoint_cache,
            receive_endpoints: DashMap::new(),
            request_timeout: CONFIG.request_timeout(),
            shutdown_timeout: CONFIG.shutdown_timeout(),
            cancellation_token: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_handler_id: AtomicU64::new(1),
        }));
        bus.receive_endpoint_for(&address)?;
        Ok(bus)
    }

    /// The bus's own address.
    #[inline]
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.0.address
    }

    /// The endpoint cache the bus resolves addresses with.
    #[inline]
    #[must_use]
    pub fn endpoint_cache(&self) -> &EndpointCache {
        &self.0.endpoint_cache
    }

    /// The timeout applied to requests that do not set their own.
    #[inline]
    #[must_use]
    pub fn default_request_timeout(&self) -> Duration {
        self.0.request_timeout
    }

    /// Whether [`ServiceBus::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.0.cancellation_token.is_cancelled()
    }

    fn ensure_running(&self) -> TransitResult<()> {
        if self.is_shut_down() {
            Err(TransitError::Disposed("service bus"))
        } else {
            Ok(())
        }
    }

    /// Resolves `address` to an endpoint that sends with this bus as source.
    ///
    /// # Errors
    ///
    /// [`TransitError::Disposed`] after shutdown, or any resolution error of the cache.
    pub fn get_send_endpoint(&self, address: impl ToAddress) -> TransitResult<SendEndpoint> {
        self.ensure_running()?;
        let endpoint = self.0.endpoint_cache.get_endpoint(address)?;
        Ok(SendEndpoint::new(endpoint, self.0.address.clone()))
    }

    /// Sends `message` to `address`.
    ///
    /// # Errors
    ///
    /// Resolution, serialization or transport errors.
    pub async fn send<T: BusMessage>(&self, address: impl ToAddress, message: T) -> TransitResult<()> {
        self.get_send_endpoint(address)?.send(message).await
    }

    /// Sends `message` to `address` after running `pipe` against its context.
    ///
    /// # Errors
    ///
    /// Resolution, pipe, serialization or transport errors.
    pub async fn send_with<T: BusMessage>(&self, address: impl ToAddress, message: T, pipe: &Pipe<T>) -> TransitResult<()> {
        self.get_send_endpoint(address)?.send_with(message, pipe).await
    }

    /// Starts consuming from `address` (if not already) and attaches the handlers
    /// configured by `configure`.
    ///
    /// ```rust,ignore
    /// bus.receive_endpoint("loopback://localhost/input_queue", |x| {
    ///     x.handler::<PingMessage, _, _>(|context| async move {
    ///         context.respond(PongMessage::new(context.message().correlation_id)).await?;
    ///         Ok(())
    ///     });
    /// })?;
    /// ```
    ///
    /// # Errors
    ///
    /// Resolution errors, or a transport error if the transport cannot be subscribed.
    pub fn receive_endpoint(
        &self,
        address: impl ToAddress,
        configure: impl FnOnce(&mut ReceiveEndpointConfigurator),
    ) -> TransitResult<Vec<HandlerSubscription>> {
        let address = address.to_address()?;
        let mut configurator = ReceiveEndpointConfigurator::default();
        configure(&mut configurator);
        let receive_endpoint = self.receive_endpoint_for(&address)?;
        Ok(configurator
            .into_handlers()
            .into_iter()
            .map(|(message_type, handler)| receive_endpoint.add_handler(message_type, self.next_handler_id(), handler))
            .collect())
    }

    /// Handles `T` messages arriving at `address`.
    ///
    /// # Errors
    ///
    /// See [`ServiceBus::receive_endpoint`].
    pub fn connect_handler<T, F, Fut>(&self, address: impl ToAddress, handler: F) -> TransitResult<HandlerSubscription>
    where
        T: BusMessage,
        F: Fn(ConsumeContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let address = address.to_address()?;
        self.connect_erased(&address, T::MESSAGE_TYPE, erase_handler(handler))
    }

    /// Handles `T` messages arriving at the bus's own address.
    ///
    /// # Errors
    ///
    /// [`TransitError::Disposed`] after shutdown.
    pub fn subscribe_handler<T, F, Fut>(&self, handler: F) -> TransitResult<HandlerSubscription>
    where
        T: BusMessage,
        F: Fn(ConsumeContext<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let address = self.0.address.clone();
        self.connect_handler(&address, handler)
    }

    pub(crate) fn connect_erased(
        &self,
        address: &Address,
        message_type: &'static str,
        handler: ErasedHandler,
    ) -> TransitResult<HandlerSubscription> {
        let receive_endpoint = self.receive_endpoint_for(address)?;
        Ok(receive_endpoint.add_handler(message_type, self.next_handler_id(), handler))
    }

    /// Number of handlers for `T` at `address`.
    #[must_use]
    pub fn handler_count<T: BusMessage>(&self, address: &Address) -> usize {
        self.0
            .receive_endpoints
            .get(address)
            .map_or(0, |receive_endpoint| receive_endpoint.handler_count(T::MESSAGE_TYPE))
    }

    fn next_handler_id(&self) -> u64 {
        self.0.next_handler_id.fetch_add(1, Ordering::Relaxed)
    }

    fn receive_endpoint_for(&self, address: &Address) -> TransitResult<Arc<ReceiveEndpoint>> {
        self.ensure_running()?;
        if let Some(receive_endpoint) = self.0.receive_endpoints.get(address) {
            return Ok(Arc::clone(receive_endpoint.value()));
        }
        let endpoint = self.0.endpoint_cache.get_endpoint(address)?;
        match self.0.receive_endpoints.entry(address.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let receive_endpoint = ReceiveEndpoint::start(endpoint, Arc::downgrade(&self.0))?;
                entry.insert(Arc::clone(&receive_endpoint));
                Ok(receive_endpoint)
            }
        }
    }

    /// Stops every receive endpoint, cancels pending requests and waits for in-flight
    /// work, bounded by the configured shutdown timeout.
    ///
    /// The endpoint cache is left alone; dispose it separately when it is no longer needed.
    #[instrument(skip(self), fields(address = %self.0.address))]
    pub async fn shutdown(&self) -> TransitResult<()> {
        if self.0.cancellation_token.is_cancelled() {
            return Ok(());
        }
        debug!("Shutting down service bus");
        self.0.cancellation_token.cancel();
        self.0.tracker.close();

        let receive_endpoints: Vec<Arc<ReceiveEndpoint>> =
            self.0.receive_endpoints.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.0.receive_endpoints.clear();

        let stopping = async {
            join_all(receive_endpoints.iter().map(|receive_endpoint| receive_endpoint.stop())).await;
            self.0.tracker.wait().await;
        };
        if tokio::time::timeout(self.0.shutdown_timeout, stopping).await.is_err() {
            warn!(timeout = ?self.0.shutdown_timeout, "Shutdown timed out waiting for receive endpoints");
        }
        trace!("Service bus stopped");
        Ok(())
    }
}

assert_impl_all!(ServiceBus: Send, Sync, Clone);
