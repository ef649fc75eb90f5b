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

use std::fmt::Debug;

use crate::message::MessageId;

/// Tracks delivery attempts of inbound messages for one endpoint.
///
/// Receive endpoints ask the tracker how often a message has already failed and
/// whether it should be redelivered or moved to the error transport.
pub trait InboundMessageTracker: Debug + Send + Sync + 'static {
    /// The number of retries allowed before a message is given up on.
    fn retry_limit(&self) -> u32;

    /// How many times `message_id` has failed so far.
    fn retry_count(&self, message_id: MessageId) -> u32;

    /// Records one more failure of `message_id`, returning the new count.
    fn increment_retry_count(&self, message_id: MessageId) -> u32;

    /// Whether `message_id` has failed more often than the retry limit allows.
    fn is_retry_limit_exceeded(&self, message_id: MessageId) -> bool {
        self.retry_count(message_id) > self.retry_limit()
    }

    /// Forgets `message_id` after it was consumed or moved to the error transport.
    fn message_completed(&self, message_id: MessageId);
}
