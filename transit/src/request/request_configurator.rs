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
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

use crate::common::{ErasedHandler, HandlerFuture, TransitError, TransitResult};
use crate::message::{ConsumeContext, CorrelationId, Envelope, Fault, Pipe, PipeConfigurator};
use crate::request::{RequestCompleted, RequestCore, RequestState, ResponseHandle};
use crate::traits::BusMessage;

/// Configures one request: its timeout, extra pipe steps, and the response types it
/// waits for.
///
/// ```rust,ignore
/// let (request, (pong, not_supported)) = bus
///     .request("loopback://localhost/input_queue", PingMessage::default(), |x| {
///         x.set_timeout(Duration::from_secs(1));
///         let pong = x.handle::<PongMessage, _, _>(|_context| async { Ok(()) });
///         let not_supported = x.response::<PingNotSupported>();
///         (pong, not_supported)
///     })
///     .await?;
/// ```
pub struct RequestConfigurator<T> {
    core: Arc<RequestCore>,
    pipe: Pipe<T>,
    handlers: Vec<(&'static str, ErasedHandler)>,
    errors: Vec<String>,
}

impl<T> fmt::Debug for RequestConfigurator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfigurator")
            .field("request_id", &self.core.request_id())
            .field("timeout", &self.core.timeout())
            .field("pipe", &self.pipe)
            .field("response_types", &self.handlers.iter().map(|(t, _)| *t).collect::<Vec<_>>())
            .finish()
    }
}

impl<T> RequestConfigurator<T> {
    pub(crate) fn new(core: Arc<RequestCore>) -> Self {
        Self {
            core,
            pipe: Pipe::empty(),
            handlers: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// The id the request will be sent with.
    #[must_use]
    pub fn request_id(&self) -> CorrelationId {
        self.core.request_id()
    }

    /// The timeout currently in effect.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.core.timeout()
    }

    /// Overrides the bus's default request timeout.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.core.set_timeout(timeout);
        self
    }

    /// Adds steps run after the request stamp (correlation id, response and fault
    /// address), so they can override the addresses. Changing the correlation id here
    /// means responses no longer match the request.
    pub fn pipe(&mut self, configure: impl FnOnce(&mut PipeConfigurator<T>)) -> &mut Self {
        let steps = Pipe::new(configure);
        self.pipe = std::mem::take(&mut self.pipe).then(steps);
        self
    }

    /// Waits for a `R` response and runs `continuation` on it if it wins.
    ///
    /// The returned handle resolves with the response once the continuation has
    /// finished, or with the error that ended the request. Each response type may be
    /// registered once.
    pub fn handle<R, F, Fut>(&mut self, continuation: F) -> ResponseHandle<R>
    where
        R: BusMessage,
        F: FnOnce(ConsumeContext<R>) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel::<TransitResult<R>>();
        let sender = Arc::new(Mutex::new(Some(sender)));

        let fail_slot = Arc::clone(&sender);
        let registered = R::MESSAGE_TYPE != Fault::MESSAGE_TYPE
            && self.core.add_branch(
                R::MESSAGE_TYPE,
                Box::new(move |error| {
                    if let Some(sender) = fail_slot.lock().take() {
                        let _ = sender.send(Err(error));
                    }
                }),
            );
        if !registered {
            self.errors
                .push(format!("response type {} cannot be registered more than once", R::MESSAGE_TYPE));
            return ResponseHandle::new(receiver);
        }

        let request_id = self.core.request_id();
        let core = Arc::downgrade(&self.core);
        let continuation = Arc::new(Mutex::new(Some(continuation)));
        // The claim runs when the handler is invoked, which receive endpoints do in
        // arrival order; only the continuation runs on its own task.
        let handler: ErasedHandler = Arc::new(move |envelope: Arc<Envelope>, retry_count, bus| -> HandlerFuture {
            if envelope.correlation_id != Some(request_id) {
                return Box::pin(async { Ok(()) });
            }
            let Some(core) = core.upgrade() else {
                return Box::pin(async { Ok(()) });
            };
            let won = RequestState::Completed {
                message_type: R::MESSAGE_TYPE.to_string(),
            };
            if !core.claim(won, Some(R::MESSAGE_TYPE), &TransitError::Cancelled) {
                trace!(%request_id, message_type = R::MESSAGE_TYPE, "Ignoring late response");
                return Box::pin(async { Ok(()) });
            }
            trace!(%request_id, message_type = R::MESSAGE_TYPE, "Response won");

            let sender = Arc::clone(&sender);
            let continuation = continuation.lock().take();
            Box::pin(async move {
                let completed = RequestCompleted::from_envelope(request_id, &envelope);
                let result = match ConsumeContext::<R>::from_envelope(&envelope, retry_count, bus) {
                    Ok(context) => {
                        let message = context.message().clone();
                        match continuation {
                            Some(continuation) => continuation(context).await.map(|()| message).map_err(|e| {
                                TransitError::ResponseHandler {
                                    message_type: R::MESSAGE_TYPE.to_string(),
                                    reason: format!("{e:#}"),
                                }
                            }),
                            None => Ok(message),
                        }
                    }
                    Err(e) => Err(TransitError::from(e)),
                };

                let overall = result.as_ref().map(|_| completed).map_err(Clone::clone);
                if let Some(sender) = sender.lock().take() {
                    let _ = sender.send(result);
                }
                core.publish(overall);
                Ok(())
            })
        });
        self.handlers.push((R::MESSAGE_TYPE, handler));
        ResponseHandle::new(receiver)
    }

    /// Waits for a `R` response without a continuation.
    pub fn response<R: BusMessage>(&mut self) -> ResponseHandle<R> {
        self.handle::<R, _, _>(|_| async { Ok(()) })
    }

    /// Validates the configuration and hands over the pipe and the response handlers.
    pub(crate) fn finish(self) -> TransitResult<(Pipe<T>, Vec<(&'static str, ErasedHandler)>)> {
        if self.errors.is_empty() {
            Ok((self.pipe, self.handlers))
        } else {
            Err(TransitError::Configuration(self.errors.join("; ")))
        }
    }
}

/// Builds the transient consumer that ends a request when its consumer faults.
pub(crate) fn fault_handler(core: &Arc<RequestCore>) -> ErasedHandler {
    let request_id = core.request_id();
    let core = Arc::downgrade(core);
    Arc::new(move |envelope: Arc<Envelope>, _retry_count, _bus| -> HandlerFuture {
        if envelope.correlation_id == Some(request_id) {
            if let Some(core) = core.upgrade() {
                let error = match envelope.read_message::<Fault>() {
                    Ok(fault) => TransitError::RequestFault {
                        request_id,
                        message_type: fault.faulted_message_type,
                        reasons: fault.reasons,
                    },
                    Err(e) => TransitError::from(e),
                };
                core.fail(RequestState::Faulted, error);
            }
        }
        Box::pin(async { Ok(()) })
    })
}
