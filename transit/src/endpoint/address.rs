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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::TransitError;

/// A structured, immutable identifier naming a transport endpoint: `scheme://host/path`.
///
/// Scheme and host are case-normalized to lowercase; the path keeps its case and
/// loses any trailing `/`. Two addresses are equal iff their normalized string forms
/// are equal, and the normalized form parses back to the same address.
///
/// ```rust,ignore
/// let address: Address = "loopback://localhost/mt_client".parse()?;
/// assert_eq!(address.scheme(), "loopback");
/// assert_eq!(address.to_string(), "loopback://localhost/mt_client");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    scheme: String,
    host: String,
    path: String,
}

impl Address {
    /// Parses and normalizes an address string.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::InvalidAddress`] when the scheme or host is missing or
    /// the scheme contains characters other than ASCII alphanumerics, `+`, `-` and `.`.
    pub fn parse(input: &str) -> Result<Self, TransitError> {
        let invalid = |reason: &str| TransitError::InvalidAddress {
            address: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        let (scheme, rest) = trimmed
            .split_once("://")
            .ok_or_else(|| invalid("expected `scheme://host/path`"))?;

        let mut scheme_chars = scheme.chars();
        match scheme_chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {}
            _ => return Err(invalid("scheme must start with a letter")),
        }
        if !scheme_chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            return Err(invalid("scheme contains invalid characters"));
        }

        let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.chars().any(char::is_whitespace) {
            return Err(invalid("host contains whitespace"));
        }

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            path: path.trim_end_matches('/').to_string(),
        })
    }

    /// The address scheme, used to select a transport factory.
    #[inline]
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The host component (may include a port).
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The path component without its leading `/`; empty for host-only addresses.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The last path segment, which names the queue on most transports.
    #[must_use]
    pub fn queue_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Returns a sibling address whose path carries `suffix`, e.g. the conventional
    /// `_error` queue of `loopback://localhost/orders` is `loopback://localhost/orders_error`.
    #[must_use]
    pub fn with_path_suffix(&self, suffix: &str) -> Self {
        Self {
            scheme: self.scheme.clone(),
            host: self.host.clone(),
            path: format!("{}{suffix}", self.path),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}://{}", self.scheme, self.host)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.host, self.path)
        }
    }
}

impl FromStr for Address {
    type Err = TransitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TransitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Address {
    type Error = TransitError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

/// Conversion into an [`Address`], accepted by every API that takes one.
///
/// Implemented for `&str`, `String`, `Address` and `&Address`, so callers can pass
/// either literals or already-parsed addresses.
pub trait ToAddress {
    /// Produces the address.
    ///
    /// # Errors
    ///
    /// Returns [`TransitError::InvalidAddress`] if the value does not parse.
    fn to_address(&self) -> Result<Address, TransitError>;
}

impl ToAddress for Address {
    fn to_address(&self) -> Result<Address, TransitError> {
        Ok(self.clone())
    }
}

impl ToAddress for &Address {
    fn to_address(&self) -> Result<Address, TransitError> {
        Ok((*self).clone())
    }
}

impl ToAddress for &str {
    fn to_address(&self) -> Result<Address, TransitError> {
        Address::parse(self)
    }
}

impl ToAddress for String {
    fn to_address(&self) -> Result<Address, TransitError> {
        Address::parse(self)
    }
}

impl ToAddress for &String {
    fn to_address(&self) -> Result<Address, TransitError> {
        Address::parse(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_round_trips() {
        let address = Address::parse("loopback://localhost/mt_client").unwrap();
        assert_eq!(address.scheme(), "loopback");
        assert_eq!(address.host(), "localhost");
        assert_eq!(address.path(), "mt_client");
        assert_eq!(address.to_string(), "loopback://localhost/mt_client");
        assert_eq!(Address::parse(&address.to_string()).unwrap(), address);
    }

    #[test]
    fn normalizes_scheme_host_and_trailing_slash() {
        let noisy = Address::parse("LoopBack://LOCALHOST/Orders/").unwrap();
        let clean = Address::parse("loopback://localhost/Orders").unwrap();
        assert_eq!(noisy, clean);
        assert_eq!(noisy.to_string(), "loopback://localhost/Orders");
    }

    #[test]
    fn path_case_is_significant() {
        let lower = Address::parse("loopback://localhost/orders").unwrap();
        let upper = Address::parse("loopback://localhost/Orders").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn host_only_addresses_format_without_slash() {
        let address = Address::parse("loopback://localhost").unwrap();
        assert_eq!(address.path(), "");
        assert_eq!(address.to_string(), "loopback://localhost");
    }

    #[test]
    fn derives_conventional_error_address() {
        let address = Address::parse("loopback://localhost/mt_server").unwrap();
        assert_eq!(
            address.with_path_suffix("_error").to_string(),
            "loopback://localhost/mt_server_error"
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["localhost/queue", "://localhost/q", "1oop://localhost/q", "loopback:///q", "lo op://h/q"] {
            assert!(
                matches!(Address::parse(input), Err(TransitError::InvalidAddress { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn serializes_as_string() {
        let address = Address::parse("loopback://localhost/mt_error").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"loopback://localhost/mt_error\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
