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

//! Type aliases shared across the crate.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::common::ServiceBus;
use crate::message::Envelope;
use crate::traits::TransportMessage;

/// A pinned, boxed, `Send` future with no output.
pub type FutureBox = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// The future returned by a type-erased message handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Callback a transport invokes for every message it receives.
pub type TransportHandler = Arc<dyn Fn(TransportMessage) -> FutureBox + Send + Sync + 'static>;

/// Crate-internal: a handler with its message type erased.
///
/// Receives the decoded envelope, the delivery's retry count and the receiving bus.
pub(crate) type ErasedHandler = Arc<dyn Fn(Arc<Envelope>, u32, ServiceBus) -> HandlerFuture + Send + Sync + 'static>;

/// Crate-internal: identifies one handler registration on a receive endpoint.
pub(crate) type HandlerId = u64;
