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

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Keeps a transport delivering to a handler. Dropping it stops delivery.
#[derive(Debug)]
pub struct TransportSubscription {
    cancellation_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl TransportSubscription {
    /// Wraps a running receive loop. The loop must exit once `cancellation_token` is cancelled.
    #[must_use]
    pub fn new(cancellation_token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            cancellation_token,
            handle: Some(handle),
        }
    }

    /// A subscription with no receive loop behind it, for transports that never deliver.
    #[must_use]
    pub fn inert() -> Self {
        Self {
            cancellation_token: CancellationToken::new(),
            handle: None,
        }
    }

    /// Whether delivery is still running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.cancellation_token.is_cancelled() && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops delivery and waits for the receive loop to exit.
    pub async fn unsubscribe(mut self) {
        self.cancellation_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                trace!("Receive loop ended abnormally: {:?}", e);
            }
        }
    }
}

impl Drop for TransportSubscription {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
