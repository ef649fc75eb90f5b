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

//! Error types surfaced by the Transit runtime.
//!
//! Every error is `Clone`: a request reaches exactly one terminal outcome, and that
//! outcome is observed by the request awaitable and by every response handle.

use std::time::Duration;

use thiserror::Error;

use crate::message::CorrelationId;

/// Failures raised while encoding or decoding message envelopes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    /// The envelope or its message body could not be encoded.
    #[error("failed to encode {message_type}: {reason}")]
    Encode {
        /// The message type URN being encoded.
        message_type: String,
        /// The underlying codec error.
        reason: String,
    },
    /// Raw transport bytes could not be decoded into an envelope.
    #[error("failed to decode envelope ({content_type}): {reason}")]
    Decode {
        /// The content type of the serializer that attempted the decode.
        content_type: String,
        /// The underlying codec error.
        reason: String,
    },
    /// The envelope decoded, but its body is not a valid instance of the expected type.
    #[error("message body is not a valid {message_type}: {reason}")]
    Body {
        /// The message type URN the body was read as.
        message_type: String,
        /// The underlying codec error.
        reason: String,
    },
}

/// Failures raised by transport implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has been disposed or its queue is gone.
    #[error("transport for {0} is closed")]
    Closed(String),
    /// The transport already has an active consumer.
    #[error("transport for {0} already has an active subscription")]
    AlreadySubscribed(String),
    /// Any other transport-defined failure.
    #[error("transport failure on {address}: {reason}")]
    Failed {
        /// Address of the failing transport.
        address: String,
        /// Transport-defined cause.
        reason: String,
    },
}

/// The crate-wide error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitError {
    /// Bad or incomplete setup, detected while building an endpoint cache or a request.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No registered transport factory handles the address scheme.
    #[error("no transport factory is registered for scheme `{scheme}` (address {address})")]
    EndpointNotConfigurable {
        /// The address being resolved.
        address: String,
        /// Its scheme.
        scheme: String,
    },

    /// A string could not be parsed as an [`Address`](crate::endpoint::Address).
    #[error("invalid address `{address}`: {reason}")]
    InvalidAddress {
        /// The rejected input.
        address: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Encoding or decoding failed.
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// The transport rejected an operation.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A pipe step failed while preparing a send context.
    #[error("pipe step failed: {0}")]
    PipeStep(String),

    /// No registered response type arrived within the request timeout.
    #[error("request {request_id} timed out after {timeout:?}")]
    RequestTimeout {
        /// The correlation id of the timed-out request.
        request_id: CorrelationId,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The consumer of the request faulted and reported it to the fault address.
    #[error("request {request_id} faulted in {message_type}: {}", .reasons.join("; "))]
    RequestFault {
        /// The correlation id of the faulted request.
        request_id: CorrelationId,
        /// The message type URN that faulted on the remote side.
        message_type: String,
        /// Failure descriptions reported by the remote consumer.
        reasons: Vec<String>,
    },

    /// The awaited operation was cancelled, typically because another branch won.
    #[error("the operation was cancelled")]
    Cancelled,

    /// The winning response continuation itself failed.
    #[error("response continuation for {message_type} failed: {reason}")]
    ResponseHandler {
        /// The response message type URN.
        message_type: String,
        /// The continuation's error.
        reason: String,
    },

    /// The endpoint cache or bus has been disposed.
    #[error("the {0} has been disposed")]
    Disposed(&'static str),
}

/// Convenience alias used throughout the crate.
pub type TransitResult<T> = Result<T, TransitError>;
