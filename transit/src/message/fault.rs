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

use serde::{Deserialize, Serialize};

use crate::message::MessageId;
use crate::traits::BusMessage;

/// Published to a message's fault address when its handlers keep failing and the
/// message is moved to the error transport.
///
/// The fault is correlated with the faulted message's correlation id, so a pending
/// request fails with [`TransitError::RequestFault`](crate::common::TransitError::RequestFault)
/// instead of waiting for its timeout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fault {
    /// Id of this fault.
    pub fault_id: MessageId,
    /// Id of the message that faulted.
    pub faulted_message_id: MessageId,
    /// Message-type URN of the message that faulted.
    pub faulted_message_type: String,
    /// One entry per failed handler on the final attempt.
    pub reasons: Vec<String>,
    /// How many times the message was retried before it was given up on.
    pub retry_count: u32,
}

impl BusMessage for Fault {
    const MESSAGE_TYPE: &'static str = "urn:message:transit:Fault";
}
