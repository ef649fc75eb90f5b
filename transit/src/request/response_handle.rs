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

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::common::{TransitError, TransitResult};

/// Resolves with the response of one registered type, once its continuation has run.
///
/// Resolves with [`TransitError::Cancelled`] when another response type won or the
/// request was cancelled, with [`TransitError::RequestTimeout`] when the request timed
/// out, and with [`TransitError::RequestFault`] when the consumer faulted.
#[derive(Debug)]
#[must_use = "a response handle does nothing unless awaited"]
pub struct ResponseHandle<R> {
    receiver: oneshot::Receiver<TransitResult<R>>,
}

impl<R> ResponseHandle<R> {
    pub(crate) const fn new(receiver: oneshot::Receiver<TransitResult<R>>) -> Self {
        Self { receiver }
    }
}

impl<R> Future for ResponseHandle<R> {
    type Output = TransitResult<R>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(TransitError::Cancelled)))
    }
}
