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

/// Where a [`Request`](crate::request::Request) is in its lifecycle.
///
/// `Pending` is the only non-terminal state. A request leaves it exactly once, on
/// whichever happens first: a registered response arrives, a fault arrives, the
/// timer fires, or the request is cancelled.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for a response.
    #[default]
    Pending,
    /// A response of `message_type` won.
    Completed {
        /// URN of the winning response type.
        message_type: String,
    },
    /// The consumer faulted, or the request could not be sent.
    Faulted,
    /// No response arrived in time.
    TimedOut,
    /// Cancelled explicitly or by bus shutdown.
    Cancelled,
}

impl RequestState {
    /// Whether the request has finished.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Moves to `next` if still pending. Returns whether the transition happened.
    pub(crate) fn transition(&mut self, next: Self) -> bool {
        if self.is_terminal() || !next.is_terminal() {
            return false;
        }
        *self = next;
        true
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Completed { message_type } => write!(f, "completed ({message_type})"),
            Self::Faulted => f.write_str("faulted"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}
