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

use crate::common::SerializationError;
use crate::message::Envelope;
use crate::traits::MessageSerializer;

/// A compact binary serializer using `MessagePack` with named fields.
#[derive(Clone, Copy, Debug, Default)]
pub struct MessagePackMessageSerializer;

impl MessagePackMessageSerializer {
    /// Content type written by this serializer.
    pub const CONTENT_TYPE: &'static str = "application/vnd.transit+msgpack";
}

impl MessageSerializer for MessagePackMessageSerializer {
    fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }

    fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>, SerializationError> {
        rmp_serde::to_vec_named(envelope).map_err(|e| SerializationError::Encode {
            message_type: envelope.message_type.clone(),
            reason: e.to_string(),
        })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Envelope, SerializationError> {
        rmp_serde::from_slice(bytes).map_err(|e| SerializationError::Decode {
            content_type: Self::CONTENT_TYPE.to_string(),
            reason: e.to_string(),
        })
    }
}
