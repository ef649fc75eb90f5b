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
#![allow(unused)]

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use transit::prelude::*;

use super::messages::*;

/// How long tests wait for something that is expected to happen.
pub const EXPECTED: Duration = Duration::from_secs(5);

/// How long tests wait to be reasonably sure something does not happen.
pub const UNEXPECTED: Duration = Duration::from_millis(250);

pub const BUS_ADDRESS: &str = "loopback://localhost/mt_client";
pub const INPUT_QUEUE: &str = "loopback://localhost/input_queue";

/// A loopback-only cache, a bus at [`BUS_ADDRESS`] and a send endpoint for [`INPUT_QUEUE`].
pub struct BusFixture {
    pub cache: EndpointCache,
    pub bus: ServiceBus,
    pub input_queue: SendEndpoint,
}

impl BusFixture {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(|_| {}).await
    }

    /// Starts with extra cache configuration on top of the loopback factory.
    pub async fn start_with(configure: impl FnOnce(&mut EndpointCacheConfigurator)) -> anyhow::Result<Self> {
        let cache = EndpointCache::new(|x| {
            x.add_transport_factory(LoopbackTransportFactory);
            configure(x);
        })?;
        let bus = TransitApp::launch_async(cache.clone(), BUS_ADDRESS).await?;
        let input_queue = bus.get_send_endpoint(INPUT_QUEUE)?;
        Ok(Self { cache, bus, input_queue })
    }

    pub fn input_queue_address(&self) -> Address {
        self.input_queue.address().clone()
    }

    /// Forwards every `T` received at `address` into a channel.
    pub fn handled<T: BusMessage>(&self, address: &str) -> anyhow::Result<UnboundedReceiver<ConsumeContext<T>>> {
        let (tx, rx) = unbounded_channel();
        self.bus.connect_handler::<T, _, _>(address, move |context| {
            let tx = tx.clone();
            async move {
                tx.send(context)?;
                Ok(())
            }
        })?;
        Ok(rx)
    }

    /// Answers every ping on the input queue with a pong carrying the same text.
    pub fn respond_with_pong(&self) -> anyhow::Result<()> {
        self.bus.receive_endpoint(INPUT_QUEUE, |x| {
            x.handler::<PingMessage, _, _>(|context| async move {
                let text = context.message().text.clone();
                context.respond(PongMessage { text }).await?;
                Ok(())
            });
        })?;
        Ok(())
    }

    pub async fn stop(self) -> anyhow::Result<()> {
        self.bus.shutdown().await?;
        self.cache.dispose();
        Ok(())
    }
}

/// Awaits `future`, failing if it takes longer than [`EXPECTED`].
pub async fn within<F: Future>(future: F) -> anyhow::Result<F::Output> {
    Ok(tokio::time::timeout(EXPECTED, future).await?)
}

/// Receives the next item, failing if none arrives in time.
pub async fn next<T>(receiver: &mut UnboundedReceiver<T>) -> anyhow::Result<T> {
    within(receiver.recv())
        .await?
        .ok_or_else(|| anyhow::anyhow!("channel closed"))
}

/// Asserts that nothing arrives for a short while. A closed channel counts as silent.
pub async fn assert_silent<T>(receiver: &mut UnboundedReceiver<T>) {
    assert!(
        !matches!(tokio::time::timeout(UNEXPECTED, receiver.recv()).await, Ok(Some(_))),
        "nothing should have been received"
    );
}
