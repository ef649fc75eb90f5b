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

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Transit
//!
//! A message-bus runtime on Tokio. Transit routes messages to named endpoints over
//! pluggable transports, serializes them with a per-endpoint serializer, and layers
//! request/response with correlation, timeouts and multi-type response races on top
//! of one-way sends.
//!
//! ## Key Concepts
//!
//! - **Addresses (`Address`)**: `scheme://host/path` names of endpoints.
//! - **Endpoint cache (`EndpointCache`)**: creates each `Endpoint` once, on first
//!   access, from the transport factory registered for the address scheme and any
//!   per-address overrides.
//! - **Contexts and pipes**: a `SendContext` carries routing metadata and headers
//!   through a `Pipe` of steps before the message is sent; handlers see the same data
//!   through a `ConsumeContext`.
//! - **Bus (`ServiceBus`)**: sends, consumes from receive endpoints with retry and
//!   error routing, and issues `Request`s whose response handles race each other
//!   against a timeout.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use transit::prelude::*;
//!
//! #[transit_message]
//! struct PingMessage {
//!     text: String,
//! }
//!
//! let cache = EndpointCache::new(|x| {
//!     x.add_transport_factory(LoopbackTransportFactory);
//! })?;
//! let bus = TransitApp::launch_async(cache.clone(), "loopback://localhost/bus").await?;
//! bus.send("loopback://localhost/input_queue", PingMessage { text: "hi".into() }).await?;
//! ```

/// Bus runtime, configuration, errors and shared type aliases.
pub mod common;

/// Addresses, endpoints and the endpoint cache.
pub mod endpoint;

/// Message contexts, envelopes and pipes.
pub mod message;

/// Request/response correlation.
pub mod request;

/// Built-in serializers.
pub mod serialization;

/// Inbound delivery tracking.
pub mod tracking;

/// Contracts at the crate's seams.
pub mod traits;

/// Built-in transports.
pub mod transport;

#[doc(hidden)]
pub use serde;

/// A prelude module for conveniently importing the most commonly used items.
///
/// # Re-exports
///
/// ## Macros (from `transit-macro`)
/// *   [`transit_macro::transit_message`]: Attribute macro for defining bus messages.
///
/// ## External Crates
/// *   [`async_trait::async_trait`]: For implementing [`Transport`](crate::traits::Transport).
///
/// ## Core Types
/// *   [`crate::common::TransitApp`], [`crate::common::ServiceBus`], [`crate::common::TransitError`]
/// *   [`crate::endpoint::EndpointCache`], [`crate::endpoint::Endpoint`], [`crate::endpoint::Address`]
/// *   [`crate::message::Pipe`], [`crate::message::SendContext`], [`crate::message::ConsumeContext`]
/// *   [`crate::request::Request`], [`crate::request::ResponseHandle`]
pub mod prelude {
    // Macros from transit-macro
    pub use transit_macro::transit_message;

    // External crate re-exports
    pub use async_trait::async_trait;

    // Core types
    pub use crate::common::{
        HandlerSubscription, ReceiveEndpointConfigurator, SerializationError, ServiceBus, TransitApp, TransitConfig,
        TransitError, TransitResult, TransportError, CONFIG,
    };
    pub use crate::endpoint::{
        Address, Endpoint, EndpointCache, EndpointCacheConfigurator, EndpointConfigurator, SendEndpoint, ToAddress,
    };
    pub use crate::message::{
        ConsumeContext, CorrelationId, Envelope, Fault, Headers, MessageId, Pipe, PipeConfigurator, PipeFlow,
        SendContext,
    };
    pub use crate::request::{Request, RequestCompleted, RequestConfigurator, RequestState, ResponseHandle};
    pub use crate::serialization::{JsonMessageSerializer, MessagePackMessageSerializer};
    pub use crate::tracking::InMemoryInboundMessageTracker;
    pub use crate::traits::{
        BusMessage, InboundMessageTracker, MessageSerializer, Transport, TransportFactory, TransportMessage,
        TransportSettings,
    };
    pub use crate::transport::{LoopbackTransport, LoopbackTransportFactory, NullTransport, TransportSubscription};
}
