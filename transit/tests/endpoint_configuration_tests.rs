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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use transit::prelude::*;
use transit_test::prelude::*;

use crate::setup::*;

mod setup;

/// Loopback factory that counts how many transports it has built.
#[derive(Debug, Default)]
struct CountingLoopbackFactory {
    builds: Arc<AtomicUsize>,
}

impl TransportFactory for CountingLoopbackFactory {
    fn scheme(&self) -> &str {
        LoopbackTransportFactory::SCHEME
    }

    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>, TransitError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        // Widen the window in which concurrent first accesses overlap
        std::thread::sleep(Duration::from_millis(20));
        LoopbackTransportFactory.build(settings)
    }
}

/// Loopback factory whose first build fails; every build is slow.
#[derive(Debug, Default)]
struct FlakyLoopbackFactory {
    builds: Arc<AtomicUsize>,
}

impl TransportFactory for FlakyLoopbackFactory {
    fn scheme(&self) -> &str {
        LoopbackTransportFactory::SCHEME
    }

    fn build(&self, settings: &TransportSettings) -> Result<Arc<dyn Transport>, TransitError> {
        let attempt = self.builds.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        if attempt == 0 {
            return Err(TransitError::Transport(TransportError::Failed {
                address: settings.address.to_string(),
                reason: "queue not ready".to_string(),
            }));
        }
        LoopbackTransportFactory.build(settings)
    }
}

fn configured_cache() -> TransitResult<EndpointCache> {
    EndpointCache::new(|x| {
        x.set_default_retry_limit(5)
            .set_default_inbound_message_tracker_factory(InMemoryInboundMessageTracker::new)
            .add_transport_factory(LoopbackTransportFactory)
            .configure_endpoint("loopback://localhost/mt_client", |y| {
                y.use_serializer::<MessagePackMessageSerializer>();
            })
            .configure_endpoint("loopback://localhost/mt_other", |y| {
                y.set_error_address("loopback://localhost/mt_error");
            });
    })
}

fn same_transport(a: &Arc<dyn Transport>, b: &Arc<dyn Transport>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

#[transit_test]
async fn test_overridden_serializer_differs_from_default() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = configured_cache()?;

    let client = cache.get_endpoint("loopback://localhost/mt_client")?;
    assert_eq!(client.serializer().content_type(), MessagePackMessageSerializer::CONTENT_TYPE);
    assert_ne!(client.serializer().content_type(), cache.default_serializer().content_type());
    assert_eq!(cache.default_serializer().content_type(), JsonMessageSerializer::CONTENT_TYPE);

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_unconfigured_endpoint_uses_defaults() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = configured_cache()?;

    let server = cache.get_endpoint("loopback://localhost/mt_server")?;
    assert_eq!(server.serializer().content_type(), cache.default_serializer().content_type());
    assert_eq!(server.retry_limit(), 5);
    assert_eq!(server.tracker().retry_limit(), 5);
    assert_eq!(server.transport().kind(), "loopback");
    assert!(!server.discards_faulting_messages());

    let error_transport = server.error_transport()?;
    assert_eq!(error_transport.address().to_string(), "loopback://localhost/mt_server_error");
    assert_eq!(error_transport.kind(), "loopback");

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_explicit_error_address_is_used() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = configured_cache()?;

    let other = cache.get_endpoint("loopback://localhost/mt_other")?;
    assert_eq!(other.error_address().to_string(), "loopback://localhost/mt_error");

    // The error transport is the error endpoint's own transport, not a second one
    let error_transport = other.error_transport()?;
    let error_endpoint = cache.get_endpoint("loopback://localhost/mt_error")?;
    assert!(same_transport(&error_transport, error_endpoint.transport()));
    assert!(same_transport(&error_transport, &other.error_transport()?));

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_endpoints_are_single_instance() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = configured_cache()?;

    let first = cache.get_endpoint("loopback://localhost/mt_server")?;
    let parsed: Address = "loopback://localhost/mt_server".parse()?;
    let second = cache.get_endpoint(&parsed)?;
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cache.contains(&parsed));

    // Resolving the error transport adds the error endpoint and nothing else
    let before = cache.endpoint_count();
    first.error_transport()?;
    assert_eq!(cache.endpoint_count(), before + 1);

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_concurrent_first_access_builds_one_transport() -> anyhow::Result<()> {
    initialize_tracing();
    let builds = Arc::new(AtomicUsize::new(0));
    let factory = CountingLoopbackFactory {
        builds: Arc::clone(&builds),
    };
    let cache = EndpointCache::new(|x| {
        x.add_transport_factory(factory);
    })?;

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_endpoint("loopback://localhost/contended") })
        })
        .collect();

    let mut endpoints = Vec::new();
    for task in tasks {
        endpoints.push(task.await??);
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1, "exactly one transport should be built");
    assert!(endpoints.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(cache.endpoint_count(), 1);

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_per_endpoint_retry_limit_and_discard() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = EndpointCache::new(|x| {
        x.set_default_retry_limit(3)
            .add_transport_factory(LoopbackTransportFactory)
            .configure_endpoint("loopback://localhost/fragile", |y| {
                y.set_retry_limit(0).discard_faulting_messages();
            });
    })?;

    let fragile = cache.get_endpoint("loopback://localhost/fragile")?;
    assert_eq!(fragile.retry_limit(), 0);
    assert!(fragile.discards_faulting_messages());
    assert_eq!(fragile.error_transport()?.kind(), "null");
    assert!(!cache.contains(fragile.error_address()), "discarding endpoints never create an error endpoint");

    let sturdy = cache.get_endpoint("loopback://localhost/sturdy")?;
    assert_eq!(sturdy.retry_limit(), 3);

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_custom_error_queue_suffix() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = EndpointCache::new(|x| {
        x.add_transport_factory(LoopbackTransportFactory)
            .set_error_queue_suffix("_dead");
    })?;

    let endpoint = cache.get_endpoint("loopback://localhost/orders")?;
    assert_eq!(endpoint.error_address().to_string(), "loopback://localhost/orders_dead");

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_unknown_scheme_is_not_configurable() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = configured_cache()?;

    let result = cache.get_endpoint("rabbitmq://localhost/orders");
    assert!(
        matches!(&result, Err(TransitError::EndpointNotConfigurable { scheme, .. }) if scheme == "rabbitmq"),
        "unexpected result: {result:?}"
    );
    assert_eq!(cache.endpoint_count(), 0);

    assert!(matches!(
        cache.get_endpoint("not an address"),
        Err(TransitError::InvalidAddress { .. })
    ));

    cache.dispose();
    Ok(())
}

#[transit_test]
async fn test_invalid_configuration_is_rejected() -> anyhow::Result<()> {
    initialize_tracing();

    let no_factories = EndpointCache::new(|_| {});
    assert!(matches!(no_factories, Err(TransitError::Configuration(_))));

    let unknown_override = EndpointCache::new(|x| {
        x.add_transport_factory(LoopbackTransportFactory)
            .configure_endpoint("msmq://localhost/orders", |_| {});
    });
    assert!(matches!(unknown_override, Err(TransitError::Configuration(_))));

    let own_error_address = EndpointCache::new(|x| {
        x.add_transport_factory(LoopbackTransportFactory)
            .configure_endpoint("loopback://localhost/orders", |y| {
                y.set_error_address("loopback://localhost/orders");
            });
    });
    assert!(matches!(own_error_address, Err(TransitError::Configuration(_))));

    Ok(())
}

#[transit_test]
async fn test_dispose_releases_transports() -> anyhow::Result<()> {
    initialize_tracing();
    let cache = configured_cache()?;
    let server = cache.get_endpoint("loopback://localhost/mt_server")?;

    cache.dispose();
    cache.dispose();
    assert!(cache.is_disposed());
    assert_eq!(cache.endpoint_count(), 0);

    assert!(matches!(
        cache.get_endpoint("loopback://localhost/mt_server"),
        Err(TransitError::Disposed(_))
    ));

    let sent = server.send(None, PingMessage::default()).await;
    assert!(
        matches!(sent, Err(TransitError::Transport(TransportError::Closed(_)))),
        "unexpected result: {sent:?}"
    );
    Ok(())
}

#[test]
fn test_failed_construction_still_yields_one_endpoint() -> anyhow::Result<()> {
    initialize_tracing();
    let builds = Arc::new(AtomicUsize::new(0));
    let factory = FlakyLoopbackFactory {
        builds: Arc::clone(&builds),
    };
    let cache = EndpointCache::new(|x| {
        x.add_transport_factory(factory);
    })?;
    let resolve = |delay: u64| {
        let cache = cache.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay));
            cache.get_endpoint("loopback://localhost/flaky")
        })
    };

    // The first caller fails, the second is queued behind it, the third arrives
    // while the second is still building.
    let first = resolve(0);
    let second = resolve(30);
    let third = resolve(130);

    let first = first.join().map_err(|_| anyhow::anyhow!("first caller panicked"))?;
    let second = second.join().map_err(|_| anyhow::anyhow!("second caller panicked"))??;
    let third = third.join().map_err(|_| anyhow::anyhow!("third caller panicked"))??;

    assert!(matches!(first, Err(TransitError::Transport(TransportError::Failed { .. }))));
    assert!(Arc::ptr_eq(&second, &third));
    assert!(Arc::ptr_eq(&second, &cache.get_endpoint("loopback://localhost/flaky")?));
    assert_eq!(builds.load(Ordering::SeqCst), 2, "one failed build and one successful build");
    assert_eq!(cache.endpoint_count(), 1);

    cache.dispose();
    Ok(())
}
