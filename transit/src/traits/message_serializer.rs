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

use crate::common::SerializationError;
use crate::message::Envelope;

/// Encodes envelopes to bytes and back.
///
/// One serializer is fixed per endpoint at creation time. Serializers must be
/// stateless so a single instance can be shared by every endpoint that uses it.
pub trait MessageSerializer: Debug + Send + Sync + 'static {
    /// The content type written alongside the bytes.
    fn content_type(&self) -> &'static str;

    /// Encodes `envelope`.
    ///
    /// # Errors
    ///
    /// [`SerializationError::Encode`] if the envelope cannot be represented.
    fn serialize(&self, envelope: &Envelope) -> Result<Vec<u8>, SerializationError>;

    /// Decodes an envelope.
    ///
    /// # Errors
    ///
    /// [`SerializationError::Decode`] if `bytes` is not a valid envelope.
    fn deserialize(&self, bytes: &[u8]) -> Result<Envelope, SerializationError>;
}
