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

//! Declarative, ordered chains of send-context steps.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use crate::common::TransitError;
use crate::endpoint::Address;
use crate::message::{CorrelationId, SendContext};

/// Whether a pipe should keep running after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipeFlow {
    /// Run the next step.
    Continue,
    /// Skip the remaining steps and do not send the message.
    Stop,
}

/// A routing field a step can assign.
#[derive(Clone, Debug, PartialEq)]
pub enum ContextField {
    /// Sets the correlation id.
    CorrelationId(CorrelationId),
    /// Sets (`Some`) or clears (`None`) the response address.
    ResponseAddress(Option<Address>),
    /// Sets (`Some`) or clears (`None`) the fault address.
    FaultAddress(Option<Address>),
}

/// A user-supplied step. Returning an error fails the send.
pub type StepAction<T> = Arc<dyn Fn(&mut SendContext<T>) -> anyhow::Result<PipeFlow> + Send + Sync>;

/// One step of a [`Pipe`].
pub enum PipeStep<T> {
    /// Sets a header.
    SetHeader {
        /// Header key.
        key: String,
        /// Header value.
        value: Value,
    },
    /// Assigns a routing field.
    SetField(ContextField),
    /// Runs arbitrary code against the context.
    Execute(StepAction<T>),
}

impl<T> Clone for PipeStep<T> {
    fn clone(&self) -> Self {
        match self {
            Self::SetHeader { key, value } => Self::SetHeader {
                key: key.clone(),
                value: value.clone(),
            },
            Self::SetField(field) => Self::SetField(field.clone()),
            Self::Execute(action) => Self::Execute(Arc::clone(action)),
        }
    }
}

impl<T> fmt::Debug for PipeStep<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetHeader { key, value } => f.debug_struct("SetHeader").field("key", key).field("value", value).finish(),
            Self::SetField(field) => f.debug_tuple("SetField").field(field).finish(),
            Self::Execute(_) => f.write_str("Execute(..)"),
        }
    }
}

impl<T> PipeStep<T> {
    fn apply(&self, context: &mut SendContext<T>) -> anyhow::Result<PipeFlow> {
        match self {
            Self::SetHeader { key, value } => {
                context.headers_mut().set(key.clone(), value.clone());
                Ok(PipeFlow::Continue)
            }
            Self::SetField(ContextField::CorrelationId(id)) => {
                context.set_correlation_id(*id);
                Ok(PipeFlow::Continue)
            }
            Self::SetField(ContextField::ResponseAddress(address)) => {
                context.set_response_address(address.clone());
                Ok(PipeFlow::Continue)
            }
            Self::SetField(ContextField::FaultAddress(address)) => {
                context.set_fault_address(address.clone());
                Ok(PipeFlow::Continue)
            }
            Self::Execute(action) => action(context),
        }
    }
}

/// An ordered, reusable chain of steps run against a [`SendContext`] before it is sent.
///
/// Steps execute in the order they were added. The first failing step aborts the pipe
/// and its error is returned; earlier mutations are not rolled back, since the context
/// is discarded after a failed send. A step returning [`PipeFlow::Stop`] ends the pipe
/// early and the message is not sent.
///
/// ```rust,ignore
/// let correlation_id = CorrelationId::new();
/// let pipe = Pipe::new(|x| {
///     x.execute(move |context| {
///         context.set_correlation_id(correlation_id);
///         context.headers_mut().set("One", "1");
///     });
/// });
/// input_queue.send_with(PingMessage::default(), &pipe).await?;
/// ```
pub struct Pipe<T> {
    steps: Vec<PipeStep<T>>,
}

impl<T> Clone for Pipe<T> {
    fn clone(&self) -> Self {
        Self {
            steps: self.steps.clone(),
        }
    }
}

impl<T> fmt::Debug for Pipe<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe").field("steps", &self.steps).finish()
    }
}

impl<T> Default for Pipe<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> Pipe<T> {
    /// Builds a pipe from a configuration callback.
    pub fn new(configure: impl FnOnce(&mut PipeConfigurator<T>)) -> Self {
        let mut configurator = PipeConfigurator::default();
        configure(&mut configurator);
        configurator.build()
    }

    /// A pipe with no steps.
    #[must_use]
    pub const fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Builds a pipe from an explicit list of steps.
    #[must_use]
    pub fn from_steps(steps: Vec<PipeStep<T>>) -> Self {
        Self { steps }
    }

    /// Returns a pipe that runs `self`'s steps, then `next`'s.
    #[must_use]
    pub fn then(mut self, next: Self) -> Self {
        self.steps.extend(next.steps);
        self
    }

    /// The steps, in execution order.
    #[must_use]
    pub fn steps(&self) -> &[PipeStep<T>] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipe has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step against `context`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::PipeStep`] from the first failing step; later steps do not run.
    pub fn execute(&self, context: &mut SendContext<T>) -> Result<PipeFlow, TransitError> {
        for (index, step) in self.steps.iter().enumerate() {
            match step.apply(context) {
                Ok(PipeFlow::Continue) => {}
                Ok(PipeFlow::Stop) => {
                    trace!(step = index, "Pipe stopped early");
                    return Ok(PipeFlow::Stop);
                }
                Err(e) => return Err(TransitError::PipeStep(format!("step {index}: {e:#}"))),
            }
        }
        Ok(PipeFlow::Continue)
    }
}

/// Fluent builder for a [`Pipe`].
pub struct PipeConfigurator<T> {
    steps: Vec<PipeStep<T>>,
}

impl<T> Default for PipeConfigurator<T> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<T> PipeConfigurator<T> {
    /// Sets a header.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.steps.push(PipeStep::SetHeader {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Sets the correlation id.
    pub fn set_correlation_id(&mut self, correlation_id: CorrelationId) -> &mut Self {
        self.steps.push(PipeStep::SetField(ContextField::CorrelationId(correlation_id)));
        self
    }

    /// Sets the response address.
    pub fn set_response_address(&mut self, address: Address) -> &mut Self {
        self.steps.push(PipeStep::SetField(ContextField::ResponseAddress(Some(address))));
        self
    }

    /// Clears the response address.
    pub fn clear_response_address(&mut self) -> &mut Self {
        self.steps.push(PipeStep::SetField(ContextField::ResponseAddress(None)));
        self
    }

    /// Sets the fault address.
    pub fn set_fault_address(&mut self, address: Address) -> &mut Self {
        self.steps.push(PipeStep::SetField(ContextField::FaultAddress(Some(address))));
        self
    }

    /// Clears the fault address.
    pub fn clear_fault_address(&mut self) -> &mut Self {
        self.steps.push(PipeStep::SetField(ContextField::FaultAddress(None)));
        self
    }

    /// Runs an infallible closure against the context.
    pub fn execute<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&mut SendContext<T>) + Send + Sync + 'static,
    {
        self.steps.push(PipeStep::Execute(Arc::new(move |context| {
            action(context);
            Ok(PipeFlow::Continue)
        })));
        self
    }

    /// Runs a fallible closure against the context; an error fails the send.
    pub fn try_execute<F>(&mut self, action: F) -> &mut Self
    where
        F: Fn(&mut SendContext<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.steps.push(PipeStep::Execute(Arc::new(move |context| {
            action(context)?;
            Ok(PipeFlow::Continue)
        })));
        self
    }

    /// Stops the pipe, and the send, when `predicate` returns `false`.
    pub fn filter<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&SendContext<T>) -> bool + Send + Sync + 'static,
    {
        self.steps.push(PipeStep::Execute(Arc::new(move |context| {
            Ok(if predicate(context) { PipeFlow::Continue } else { PipeFlow::Stop })
        })));
        self
    }

    /// Appends a prebuilt step.
    pub fn add_step(&mut self, step: PipeStep<T>) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Finishes the pipe.
    #[must_use]
    pub fn build(self) -> Pipe<T> {
        Pipe { steps: self.steps }
    }
}
