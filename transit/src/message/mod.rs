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

//! Message contexts, envelopes and pipes.

pub use consume_context::ConsumeContext;
pub use envelope::Envelope;
pub use fault::Fault;
pub use headers::Headers;
pub use ids::{CorrelationId, MessageId};
pub use pipe::{ContextField, Pipe, PipeConfigurator, PipeFlow, PipeStep, StepAction};
pub use send_context::SendContext;

mod consume_context;
mod envelope;
mod fault;
mod headers;
mod ids;
mod pipe;
mod send_context;
