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

use tracing::{debug, instrument};

use crate::common::{ServiceBus, TransitResult};
use crate::endpoint::ToAddress;
use crate::message::{CorrelationId, Fault, Pipe, PipeConfigurator};
use crate::request::request_configurator::fault_handler;
use crate::request::{Request, RequestConfigurator, RequestCore, RequestState};
use crate::traits::BusMessage;

impl ServiceBus {
    /// Sends `message` to `destination` as a request and returns without waiting for
    /// the response.
    ///
    /// The message carries a fresh correlation id (the request id), and the bus's own
    /// address as response and fault address. `configure` registers the response types
    /// to wait for, optionally with continuations, and may change the timeout or add
    /// pipe steps; whatever it returns (typically the response handles) is handed back
    /// next to the [`Request`].
    ///
    /// Response consumers are subscribed before the message is sent and the timer
    /// starts right before the send. If the send fails, the request is abandoned and
    /// the error returned.
    ///
    /// # Errors
    ///
    /// [`TransitError::Configuration`](crate::common::TransitError::Configuration) when a
    /// response type is registered twice, or any resolution, pipe, serialization or
    /// transport error of the send.
    #[instrument(skip(self, destination, message, configure), fields(message_type = T::MESSAGE_TYPE))]
    pub async fn request<T, H>(
        &self,
        destination: impl ToAddress,
        message: T,
        configure: impl FnOnce(&mut RequestConfigurator<T>) -> H,
    ) -> TransitResult<(Request<T>, H)>
    where
        T: BusMessage,
    {
        let endpoint = self.get_send_endpoint(destination)?;
        let core = RequestCore::new(CorrelationId::new(), self.default_request_timeout());
        let request_id = core.request_id();

        let mut configurator = RequestConfigurator::new(core.clone());
        let handles = configure(&mut configurator);
        let (caller_pipe, handlers) = configurator.finish()?;

        let bus_address = self.address().clone();
        let subscribed = handlers
            .into_iter()
            .chain(std::iter::once((Fault::MESSAGE_TYPE, fault_handler(&core))))
            .try_for_each(|(message_type, handler)| -> TransitResult<()> {
                core.add_subscription(self.connect_erased(&bus_address, message_type, handler)?);
                Ok(())
            });
        if let Err(e) = subscribed {
            core.fail(RequestState::Faulted, e.clone());
            return Err(e);
        }

        let stamp = Pipe::new(|x: &mut PipeConfigurator<T>| {
            x.set_correlation_id(request_id)
                .set_response_address(bus_address.clone())
                .set_fault_address(bus_address.clone());
        });
        let pipe = stamp.then(caller_pipe);

        core.start_timer(&self.0.tracker, self.0.cancellation_token.clone());
        debug!(%request_id, destination = %endpoint.address(), timeout = ?core.timeout(), "Sending request");
        if let Err(e) = endpoint.send_with(message.clone(), &pipe).await {
            core.fail(RequestState::Faulted, e.clone());
            return Err(e);
        }

        Ok((Request::new(core, message, endpoint.address().clone()), handles))
    }
}
