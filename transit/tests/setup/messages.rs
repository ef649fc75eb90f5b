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
#![allow(unused)]

use transit::prelude::*;

#[transit_message]
#[derive(Default, PartialEq)]
pub struct PingMessage {
    pub text: String,
}

#[transit_message]
#[derive(Default, PartialEq)]
pub struct PongMessage {
    pub text: String,
}

#[transit_message(urn = "urn:message:transit:tests:PingNotSupported")]
#[derive(PartialEq)]
pub struct PingNotSupported {
    pub reason: String,
}

#[transit_message]
pub enum Tally {
    Add(u32),
    Reset,
}
