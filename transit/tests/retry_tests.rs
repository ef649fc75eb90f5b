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

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::unbounded_channel;
use transit::common::{FutureBox, TransportHandler};
use transit::prelude::*;
use transit_test::prelude::*;

use crate::setup::*;

mod setup;

const ERROR_QUEUE: &str = "loopback://localhost/input_queue_error";

/// Fails every attempt, reporting each attempt's retry count.
fn always_failing(fixture: &BusFixture) -> anyhow::Result<tokio::sync::mpsc::UnboundedReceiver<u32>> {
    let (tx, rx) = unbounded_channel();
    fixture.bus.connect_handler::<PingMessage, _, _>(INPUT_QUEUE, move |context| {
        let tx = tx.clone();
        async move {
            tx.send(context.retry_count())?;
            anyhow::bail!("attempt {} failed", context.retry_count())
        }
    })?;
    Ok(rx)
}

#[transit_test]
async fn test_message_moves_to_error_queue_after_retry_limit() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start_with(|x| {
        x.set_default_retry_limit(2);
    })
    .await?;
    let mut attempts = always_failing(&fixture)?;
    let mut dead_letters = fixture.handled::<PingMessage>(ERROR_QUEUE)?;
    let mut faults = fixture.handled::<Fault>(BUS_ADDRESS)?;

    fixture
        .input_queue
        .send(PingMessage {
            text: "poison".to_string(),
        })
        .await?;

    let dead = next(&mut dead_letters).await?;
    assert_eq!(dead.message().text, "poison");
    assert_eq!(dead.destination_address(), Some(&fixture.input_queue_address()));

    let mut seen = Vec::new();
    while let Ok(retry_count) = attempts.try_recv() {
        seen.push(retry_count);
    }
    assert_eq!(seen, vec![0, 1, 2]);

    // No fault address was set, so nobody is told
    assert_silent(&mut faults).await;

    fixture.stop().await
}

#[transit_test]
async fn test_transient_failure_is_retried() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let (tx, mut handled) = unbounded_channel();
    fixture.bus.connect_handler::<PingMessage, _, _>(INPUT_QUEUE, move |context| {
        let tx = tx.clone();
        async move {
            if context.retry_count() == 0 {
                anyhow::bail!("not yet");
            }
            tx.send(context.retry_count())?;
            Ok(())
        }
    })?;
    let mut dead_letters = fixture.handled::<PingMessage>(ERROR_QUEUE)?;

    fixture.input_queue.send(PingMessage::default()).await?;

    assert_eq!(next(&mut handled).await?, 1);
    assert_silent(&mut dead_letters).await;

    fixture.stop().await
}

#[transit_test]
async fn test_sibling_handlers_run_on_every_attempt() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let (tx, mut calls) = unbounded_channel();
    fixture.bus.receive_endpoint(INPUT_QUEUE, |x| {
        x.handler::<PingMessage, _, _>(|context| async move {
            if context.retry_count() == 0 {
                anyhow::bail!("first attempt fails");
            }
            Ok(())
        })
        .handler::<PingMessage, _, _>(move |context| {
            let tx = tx.clone();
            async move {
                tx.send(context.retry_count())?;
                Ok(())
            }
        });
    })?;

    fixture.input_queue.send(PingMessage::default()).await?;

    assert_eq!(next(&mut calls).await?, 0);
    assert_eq!(next(&mut calls).await?, 1);
    assert_silent(&mut calls).await;

    fixture.stop().await
}

#[transit_test]
async fn test_discarded_message_still_reports_fault() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start_with(|x| {
        x.configure_endpoint(INPUT_QUEUE, |y| {
            y.set_retry_limit(0).discard_faulting_messages();
        });
    })
    .await?;
    let mut attempts = always_failing(&fixture)?;
    let mut faults = fixture.handled::<Fault>(BUS_ADDRESS)?;

    let correlation_id = CorrelationId::new();
    let bus_address = fixture.bus.address().clone();
    let pipe = Pipe::new(|x| {
        x.set_correlation_id(correlation_id).set_fault_address(bus_address);
    });
    fixture.input_queue.send_with(PingMessage::default(), &pipe).await?;

    let fault = next(&mut faults).await?;
    assert_eq!(fault.correlation_id(), Some(correlation_id));
    assert_eq!(fault.message().faulted_message_type, PingMessage::MESSAGE_TYPE);
    assert_eq!(fault.message().retry_count, 0);
    assert_eq!(fault.message().reasons, vec!["attempt 0 failed".to_string()]);

    assert_eq!(next(&mut attempts).await?, 0);
    assert_silent(&mut attempts).await;
    let error_address: Address = ERROR_QUEUE.parse()?;
    assert!(!fixture.cache.contains(&error_address), "discarded messages never reach an error queue");

    fixture.stop().await
}

#[transit_test]
async fn test_full_error_queue_does_not_stall_faults() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start_with(|x| {
        x.set_transport_capacity(1)
            .set_error_transport_timeout(Duration::from_millis(100))
            .configure_endpoint(INPUT_QUEUE, |y| {
                y.set_retry_limit(0);
            });
    })
    .await?;
    let _attempts = always_failing(&fixture)?;
    let mut faults = fixture.handled::<Fault>(BUS_ADDRESS)?;

    // Nobody consumes the error queue, so only the first message fits.
    let bus_address = fixture.bus.address().clone();
    let pipe = Pipe::new(|x| {
        x.set_fault_address(bus_address);
    });
    for _ in 0..3 {
        fixture.input_queue.send_with(PingMessage::default(), &pipe).await?;
    }

    let mut faulted = HashSet::new();
    for _ in 0..3 {
        faulted.insert(next(&mut faults).await?.message().faulted_message_id);
    }
    assert_eq!(faulted.len(), 3);

    fixture.stop().await
}

#[transit_test]
async fn test_undecodable_message_goes_straight_to_error_queue() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let mut attempts = always_failing(&fixture)?;

    let (tx, mut dead_letters) = unbounded_channel();
    let forward: TransportHandler = Arc::new(move |message: TransportMessage| -> FutureBox {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(message.body);
        })
    });
    let error_endpoint = fixture.cache.get_endpoint(ERROR_QUEUE)?;
    let _subscription = error_endpoint.transport().subscribe(forward)?;

    fixture
        .input_queue
        .endpoint()
        .transport()
        .send(TransportMessage {
            message_id: MessageId::new(),
            content_type: JsonMessageSerializer::CONTENT_TYPE.to_string(),
            body: b"definitely not an envelope".to_vec(),
        })
        .await?;

    assert_eq!(next(&mut dead_letters).await?, b"definitely not an envelope".to_vec());
    assert_silent(&mut attempts).await;

    fixture.stop().await
}
