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

use transit::prelude::*;
use transit_test::prelude::*;

use crate::setup::*;

mod setup;

#[transit_test]
async fn test_pipe_values_reach_the_consume_context() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let mut received = fixture.handled::<PingMessage>(INPUT_QUEUE)?;

    let correlation_id = CorrelationId::new();
    let pipe = Pipe::new(|x| {
        x.set_header("One", "1").set_correlation_id(correlation_id);
    });
    fixture
        .input_queue
        .send_with(
            PingMessage {
                text: "with headers".to_string(),
            },
            &pipe,
        )
        .await?;

    let context = next(&mut received).await?;
    assert_eq!(context.message().text, "with headers");
    assert_eq!(context.headers().get_str("One"), Some("1"));
    assert!(context.headers().get("Two").is_none(), "unset headers are absent");
    assert_eq!(context.correlation_id(), Some(correlation_id));
    assert_eq!(context.source_address(), Some(fixture.bus.address()));
    assert_eq!(context.destination_address(), Some(&fixture.input_queue_address()));
    assert_eq!(context.response_address(), None);
    assert_eq!(context.fault_address(), None);
    assert_eq!(context.retry_count(), 0);

    fixture.stop().await
}

#[transit_test]
async fn test_plain_send_has_default_context() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let mut received = fixture.handled::<PingMessage>(INPUT_QUEUE)?;

    fixture.bus.send(INPUT_QUEUE, PingMessage::default()).await?;

    let context = next(&mut received).await?;
    assert_eq!(context.correlation_id(), None);
    assert!(context.headers().is_empty());
    assert_eq!(context.source_address(), Some(fixture.bus.address()));
    assert_eq!(context.message_type(), PingMessage::MESSAGE_TYPE);

    fixture.stop().await
}

#[transit_test]
async fn test_addresses_can_be_set_and_cleared_by_the_pipe() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let mut received = fixture.handled::<PingMessage>(INPUT_QUEUE)?;
    let replies: Address = "loopback://localhost/replies".parse()?;

    let pipe = Pipe::new(|x| {
        x.set_response_address(replies.clone())
            .set_fault_address(replies.clone())
            .clear_fault_address()
            .execute(|context: &mut SendContext<PingMessage>| {
                context.message_mut().text = "rewritten".to_string();
                context.headers_mut().set("attempt", 1);
            });
    });
    fixture.input_queue.send_with(PingMessage::default(), &pipe).await?;

    let context = next(&mut received).await?;
    assert_eq!(context.response_address(), Some(&replies));
    assert_eq!(context.fault_address(), None);
    assert_eq!(context.message().text, "rewritten");
    assert_eq!(context.headers().get("attempt"), Some(&serde_json::Value::from(1)));

    fixture.stop().await
}

#[transit_test]
async fn test_filtered_send_is_not_delivered() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let mut received = fixture.handled::<PingMessage>(INPUT_QUEUE)?;

    let pipe = Pipe::new(|x| {
        x.filter(|context: &SendContext<PingMessage>| context.message().text != "drop me");
    });
    fixture
        .input_queue
        .send_with(
            PingMessage {
                text: "drop me".to_string(),
            },
            &pipe,
        )
        .await?;
    assert_silent(&mut received).await;

    fixture
        .input_queue
        .send_with(
            PingMessage {
                text: "keep me".to_string(),
            },
            &pipe,
        )
        .await?;
    assert_eq!(next(&mut received).await?.message().text, "keep me");

    fixture.stop().await
}

#[transit_test]
async fn test_failing_pipe_step_fails_the_send() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let mut received = fixture.handled::<PingMessage>(INPUT_QUEUE)?;

    let pipe = Pipe::new(|x| {
        x.set_header("One", "1")
            .try_execute(|_: &mut SendContext<PingMessage>| Err(anyhow::anyhow!("no route")));
    });
    let result = fixture.input_queue.send_with(PingMessage::default(), &pipe).await;
    assert!(
        matches!(&result, Err(TransitError::PipeStep(reason)) if reason.contains("no route")),
        "unexpected result: {result:?}"
    );
    assert_silent(&mut received).await;

    fixture.stop().await
}

#[transit_test]
async fn test_respond_falls_back_to_source_address() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    fixture.respond_with_pong()?;
    let mut pongs = fixture.handled::<PongMessage>(BUS_ADDRESS)?;

    let correlation_id = CorrelationId::new();
    let pipe = Pipe::new(|x| {
        x.set_correlation_id(correlation_id);
    });
    fixture
        .input_queue
        .send_with(
            PingMessage {
                text: "echo".to_string(),
            },
            &pipe,
        )
        .await?;

    let pong = next(&mut pongs).await?;
    assert_eq!(pong.message().text, "echo");
    assert_eq!(pong.correlation_id(), Some(correlation_id));
    assert_eq!(pong.source_address(), Some(fixture.bus.address()));

    fixture.stop().await
}

#[transit_test]
async fn test_overridden_serializer_round_trips() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start_with(|x| {
        x.configure_endpoint("loopback://localhost/packed", |y| {
            y.use_serializer::<MessagePackMessageSerializer>();
        });
    })
    .await?;
    let mut received = fixture.handled::<Tally>("loopback://localhost/packed")?;

    let pipe = Pipe::new(|x| {
        x.set_header("One", "1");
    });
    fixture
        .bus
        .send_with("loopback://localhost/packed", Tally::Add(7), &pipe)
        .await?;
    fixture.bus.send("loopback://localhost/packed", Tally::Reset).await?;

    // Handlers of different messages run concurrently, so either may finish first.
    let both = [next(&mut received).await?, next(&mut received).await?];
    let add = both
        .iter()
        .find(|context| matches!(context.message(), Tally::Add(7)))
        .ok_or_else(|| anyhow::anyhow!("Add(7) was not received"))?;
    assert_eq!(add.headers().get_str("One"), Some("1"));
    assert!(both.iter().any(|context| matches!(context.message(), Tally::Reset)));

    fixture.stop().await
}

#[transit_test]
async fn test_unsubscribed_handler_stops_receiving() -> anyhow::Result<()> {
    initialize_tracing();
    let fixture = BusFixture::start().await?;
    let (tx, mut received) = tokio::sync::mpsc::unbounded_channel();
    let subscription = fixture.bus.connect_handler::<PingMessage, _, _>(INPUT_QUEUE, move |context| {
        let tx = tx.clone();
        async move {
            tx.send(context.into_message())?;
            Ok(())
        }
    })?;
    let input_queue = fixture.input_queue_address();
    assert_eq!(fixture.bus.handler_count::<PingMessage>(&input_queue), 1);

    fixture.bus.send(INPUT_QUEUE, PingMessage::default()).await?;
    next(&mut received).await?;

    subscription.unsubscribe();
    assert_eq!(fixture.bus.handler_count::<PingMessage>(&input_queue), 0);
    fixture.bus.send(INPUT_QUEUE, PingMessage::default()).await?;
    assert_silent(&mut received).await;

    fixture.stop().await
}
