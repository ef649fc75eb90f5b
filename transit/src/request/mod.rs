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

//! Request/response on top of one-way sends.

pub use request::{Request, RequestCompleted};
pub(crate) use request::RequestCore;
pub use request_configurator::RequestConfigurator;
pub use request_state::RequestState;
pub use response_handle::ResponseHandle;

#[allow(clippy::module_inception)]
mod request;
mod request_client;
mod request_configurator;
mod request_state;
mod response_handle;
