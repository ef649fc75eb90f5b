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
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::common::{HandlerSubscription, SerializationError, TransitError, TransitResult};
use crate::endpoint::Address;
use crate::message::{CorrelationId, Envelope, MessageId};
use crate::request::RequestState;
use crate::traits::BusMessage;

/// Fails one pending response branch with the given error.
pub(crate) type BranchFailure = Box<dyn FnOnce(TransitError) + Send + 'static>;

/// The winning response of a completed request.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestCompleted {
    /// The request's correlation id.
    pub request_id: CorrelationId,
    /// URN of the winning response type.
    pub message_type: String,
    /// Id of the response message.
    pub message_id: MessageId,
    /// Address the response came from.
    pub source_address: Option<Address>,
    /// The response body.
    pub message: Value,
}

impl RequestCompleted {
    pub(crate) fn from_envelope(request_id: CorrelationId, envelope: &Envelope) -> Self {
        Self {
            request_id,
            message_type: envelope.message_type.clone(),
            message_id: envelope.message_id,
            source_address: envelope.source_address.clone(),
            message: envelope.message.clone(),
        }
    }

    /// Whether the winning response is a `R`.
    #[must_use]
    pub fn is<R: BusMessage>(&self) -> bool {
        self.message_type == R::MESSAGE_TYPE
    }

    /// Reads the response body as `R`.
    ///
    /// # Errors
    ///
    /// [`SerializationError::Body`] if the body is not a valid `R`.
    pub fn read_message<R: BusMessage>(&self) -> Result<R, SerializationError> {
        R::deserialize(&self.message).map_err(|e| SerializationError::Body {
            message_type: R::MESSAGE_TYPE.to_string(),
            reason: e.to_string(),
        })
    }
}

type Outcome = Option<TransitResult<RequestCompleted>>;

/// Crate-internal: the state shared by a request, its response branches and its timer.
pub(crate) struct RequestCore {
    request_id: CorrelationId,
    timeout: Mutex<Duration>,
    state: Mutex<RequestState>,
    branches: Mutex<HashMap<&'static str, BranchFailure>>,
    subscriptions: Mutex<Vec<HandlerSubscription>>,
    outcome: watch::Sender<Outcome>,
    timer: CancellationToken,
}

impl fmt::Debug for RequestCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestCore")
            .field("request_id", &self.request_id)
            .field("timeout", &*self.timeout.lock())
            .field("state", &*self.state.lock())
            .field("branches", &self.branches.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl RequestCore {
    pub(crate) fn new(request_id: CorrelationId, timeout: Duration) -> Arc<Self> {
        let (outcome, _) = watch::channel(None);
        Arc::new(Self {
            request_id,
            timeout: Mutex::new(timeout),
            state: Mutex::new(RequestState::Pending),
            branches: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Vec::new()),
            outcome,
            timer: CancellationToken::new(),
        })
    }

    pub(crate) const fn request_id(&self) -> CorrelationId {
        self.request_id
    }

    pub(crate) fn timeout(&self) -> Duration {
        *self.timeout.lock()
    }

    pub(crate) fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock() = timeout;
    }

    pub(crate) fn state(&self) -> RequestState {
        self.state.lock().clone()
    }

    /// Registers a branch. Returns `false` if the message type already has one.
    pub(crate) fn add_branch(&self, message_type: &'static str, fail: BranchFailure) -> bool {
        let mut branches = self.branches.lock();
        if branches.contains_key(message_type) {
            return false;
        }
        branches.insert(message_type, fail);
        true
    }

    pub(crate) fn add_subscription(&self, subscription: HandlerSubscription) {
        let state = self.state.lock();
        if state.is_terminal() {
            drop(state);
            subscription.unsubscribe();
        } else {
            self.subscriptions.lock().push(subscription);
        }
    }

    /// Leaves `Pending` for `next`, if nothing else got there first.
    ///
    /// On success the timer is stopped, every transient subscription is removed and
    /// every branch other than `winner` fails with `loser_error`, all before returning.
    pub(crate) fn claim(&self, next: RequestState, winner: Option<&'static str>, loser_error: &TransitError) -> bool {
        if !self.state.lock().transition(next) {
            return false;
        }
        self.timer.cancel();
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        let branches = std::mem::take(&mut *self.branches.lock());
        for (message_type, fail) in branches {
            if Some(message_type) != winner {
                trace!(request_id = %self.request_id, message_type, "Failing response branch");
                fail(loser_error.clone());
            }
        }
        true
    }

    /// Publishes the overall result to everyone awaiting the request.
    pub(crate) fn publish(&self, outcome: TransitResult<RequestCompleted>) {
        self.outcome.send_replace(Some(outcome));
    }

    /// Ends the request with `error` on every branch and on the overall result.
    pub(crate) fn fail(&self, next: RequestState, error: TransitError) -> bool {
        if !self.claim(next, None, &error) {
            return false;
        }
        debug!(request_id = %self.request_id, %error, "Request failed");
        self.publish(Err(error));
        true
    }

    pub(crate) fn time_out(&self) -> bool {
        let error = TransitError::RequestTimeout {
            request_id: self.request_id,
            timeout: self.timeout(),
        };
        self.fail(RequestState::TimedOut, error)
    }

    pub(crate) fn cancel(&self) -> bool {
        self.fail(RequestState::Cancelled, TransitError::Cancelled)
    }

    /// Starts the timeout timer. It also cancels the request when `shutdown` fires.
    pub(crate) fn start_timer(self: &Arc<Self>, tracker: &TaskTracker, shutdown: CancellationToken) {
        let core = Arc::clone(self);
        let timeout = self.timeout();
        tracker.spawn(async move {
            tokio::select! {
                () = core.timer.cancelled() => {}
                () = tokio::time::sleep(timeout) => {
                    if core.time_out() {
                        debug!(request_id = %core.request_id, ?timeout, "Request timed out");
                    }
                }
                () = shutdown.cancelled() => {
                    core.cancel();
                }
            }
        });
    }

    async fn completion(&self) -> TransitResult<RequestCompleted> {
        let mut receiver = self.outcome.subscribe();
        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| TransitError::Cancelled)?;
        outcome.clone().unwrap_or(Err(TransitError::Cancelled))
    }
}

/// An in-flight request.
///
/// Completes exactly once: with the first registered response to arrive, with a
/// fault, with [`TransitError::RequestTimeout`], or with [`TransitError::Cancelled`].
/// Await [`Request::completion`] (or the request itself) for the overall outcome;
/// the [`ResponseHandle`](crate::request::ResponseHandle)s returned while configuring
/// the request resolve per response type.
pub struct Request<T> {
    core: Arc<RequestCore>,
    message: T,
    destination: Address,
}

impl<T: fmt::Debug> fmt::Debug for Request<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("request_id", &self.core.request_id())
            .field("message", &self.message)
            .field("destination", &self.destination)
            .field("state", &self.core.state())
            .finish()
    }
}

impl<T> Request<T> {
    pub(crate) const fn new(core: Arc<RequestCore>, message: T, destination: Address) -> Self {
        Self {
            core,
            message,
            destination,
        }
    }

    /// The request id, which is also the correlation id of the request message.
    #[inline]
    #[must_use]
    pub fn request_id(&self) -> CorrelationId {
        self.core.request_id()
    }

    /// The request message as sent.
    #[inline]
    pub const fn message(&self) -> &T {
        &self.message
    }

    /// Where the request was sent.
    #[inline]
    #[must_use]
    pub const fn destination(&self) -> &Address {
        &self.destination
    }

    /// The timeout in effect.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.core.timeout()
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> RequestState {
        self.core.state()
    }

    /// Cancels the request if it is still pending. Returns whether it was.
    ///
    /// Every pending response handle and the overall result fail with
    /// [`TransitError::Cancelled`].
    pub fn cancel(&self) -> bool {
        self.core.cancel()
    }

    /// Waits for the request to finish.
    ///
    /// # Errors
    ///
    /// [`TransitError::RequestTimeout`], [`TransitError::RequestFault`],
    /// [`TransitError::Cancelled`], or [`TransitError::ResponseHandler`] if the winning
    /// continuation failed.
    pub async fn completion(&self) -> TransitResult<RequestCompleted> {
        self.core.completion().await
    }
}

impl<T: Send + Sync + 'static> IntoFuture for Request<T> {
    type Output = TransitResult<RequestCompleted>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move { self.core.completion().await })
    }
}
