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

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message headers: a map from string keys to JSON values.
///
/// Keys are case-sensitive unless the headers were switched to case-insensitive
/// matching (see `behavior.case_insensitive_headers` in the configuration). In
/// case-insensitive mode the key as first written is kept, and lookups and
/// overwrites ignore ASCII case.
///
/// Unset keys are absent: [`Headers::get`] returns `None`, never a null value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers {
    entries: BTreeMap<String, Value>,
    #[serde(skip)]
    case_insensitive: bool,
}

impl Headers {
    /// Creates an empty, case-sensitive header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches key matching to ASCII case-insensitive or back.
    ///
    /// Existing entries whose keys collide under the new policy keep the
    /// lexicographically first key.
    #[must_use]
    pub fn with_case_insensitive_keys(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive = case_insensitive;
        if case_insensitive {
            let mut folded: BTreeMap<String, Value> = BTreeMap::new();
            for (key, value) in std::mem::take(&mut self.entries) {
                if !folded.keys().any(|existing| existing.eq_ignore_ascii_case(&key)) {
                    folded.insert(key, value);
                }
            }
            self.entries = folded;
        }
        self
    }

    /// Whether keys are matched ignoring ASCII case.
    #[inline]
    #[must_use]
    pub const fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    fn stored_key(&self, key: &str) -> Option<&String> {
        if self.case_insensitive {
            self.entries.keys().find(|k| k.eq_ignore_ascii_case(key))
        } else {
            self.entries.get_key_value(key).map(|(k, _)| k)
        }
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let key = self.stored_key(&key).cloned().unwrap_or(key);
        self.entries.insert(key, value.into());
    }

    /// Returns the value stored for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.stored_key(key).and_then(|k| self.entries.get(k))
    }

    /// Returns the value for `key` if it is a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.stored_key(key).is_some()
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let stored = self.stored_key(key)?.clone();
        self.entries.remove(&stored)
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
