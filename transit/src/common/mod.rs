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

//! Provides the bus runtime, configuration, errors and shared type aliases.
//!
//! # Key Re-exported Components:
//!
//! *   [`TransitApp`]: Starts a [`ServiceBus`].
//! *   [`ServiceBus`]: Sends messages, consumes from receive endpoints and issues requests.
//! *   [`TransitConfig`] and the global [`CONFIG`].
//! *   [`TransitError`] and its component error types.

// --- Public Re-exports ---
pub use config::{TransitConfig, CONFIG};
pub use error::{SerializationError, TransitError, TransitResult, TransportError};
pub use receive_endpoint::{HandlerSubscription, ReceiveEndpointConfigurator};
pub use service_bus::ServiceBus;
pub use transit_app::TransitApp;
pub use types::{FutureBox, HandlerFuture, TransportHandler};

// --- Crate-Internal Re-exports ---
pub(crate) use types::{ErasedHandler, HandlerId};

/// Defines the configuration system.
pub mod config;
mod error;
mod receive_endpoint;
mod service_bus;
mod transit_app;
mod types;
