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

use dashmap::DashMap;
use tracing::trace;

use crate::message::MessageId;
use crate::traits::InboundMessageTracker;

/// Keeps retry counts in a process-local concurrent map.
///
/// Counts are lost on restart; redelivered messages start from zero again.
#[derive(Debug, Default)]
pub struct InMemoryInboundMessageTracker {
    retry_limit: u32,
    counts: DashMap<MessageId, u32>,
}

impl InMemoryInboundMessageTracker {
    /// Creates a tracker allowing `retry_limit` retries per message.
    #[must_use]
    pub fn new(retry_limit: u32) -> Self {
        Self {
            retry_limit,
            counts: DashMap::new(),
        }
    }

    /// Number of messages currently being tracked.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.counts.len()
    }
}

impl InboundMessageTracker for InMemoryInboundMessageTracker {
    fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    fn retry_count(&self, message_id: MessageId) -> u32 {
        self.counts.get(&message_id).map_or(0, |count| *count)
    }

    fn increment_retry_count(&self, message_id: MessageId) -> u32 {
        let mut entry = self.counts.entry(message_id).or_insert(0);
        *entry += 1;
        trace!(%message_id, retry_count = *entry, "Incremented retry count");
        *entry
    }

    fn message_completed(&self, message_id: MessageId) {
        self.counts.remove(&message_id);
    }
}
