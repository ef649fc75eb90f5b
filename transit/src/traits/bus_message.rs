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

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A type that can travel over the bus.
///
/// Messages are serde-serializable values with a stable message-type URN. The URN is
/// written into every envelope and is what receive endpoints dispatch on, so two
/// processes agree on a message type by agreeing on its URN rather than on a Rust path.
///
/// The [`transit_message`](crate::prelude::transit_message) attribute derives the
/// required traits and fills in `urn:message:<module path>:<TypeName>`:
///
/// ```rust,ignore
/// #[transit_message]
/// pub struct PingMessage {
///     pub correlation_id: Uuid,
/// }
///
/// #[transit_message(urn = "urn:message:billing:InvoiceIssued")]
/// pub struct InvoiceIssued {
///     pub number: u64,
/// }
/// ```
pub trait BusMessage: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// The message-type URN written to, and matched against, envelopes.
    const MESSAGE_TYPE: &'static str;
}
