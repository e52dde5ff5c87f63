// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::time::Duration;

use serde::Deserialize;

use crate::record::DEFAULT_TTL;

/// Configuration for the Redis-backed zone store
#[derive(Clone, Deserialize, PartialEq, Eq, Debug)]
pub struct RedisConfig {
    /// Backend `host:port`
    pub address: String,
    /// Optional ACL user name
    #[serde(default)]
    pub username: Option<String>,
    /// Optional password
    #[serde(default)]
    pub password: Option<String>,
    /// Prefix prepended to every zone key
    #[serde(default)]
    pub prefix: String,
    /// Suffix appended to every zone key
    #[serde(default)]
    pub suffix: String,
    /// Connect timeout in milliseconds, zero for the library default
    #[serde(default)]
    pub connect_timeout: u64,
    /// Per-command read timeout in milliseconds, zero for none
    #[serde(default)]
    pub read_timeout: u64,
    /// Default TTL in seconds for records that do not carry their own
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

impl RedisConfig {
    /// Connect timeout as a duration, `None` when unset
    pub fn connect_timeout(&self) -> Option<Duration> {
        (self.connect_timeout > 0).then(|| Duration::from_millis(self.connect_timeout))
    }

    /// Read timeout as a duration, `None` when unset
    pub fn read_timeout(&self) -> Option<Duration> {
        (self.read_timeout > 0).then(|| Duration::from_millis(self.read_timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: RedisConfig =
            basic_toml::from_str(r#"address = "127.0.0.1:6379""#).expect("parse failed");
        assert_eq!(config.address, "127.0.0.1:6379");
        assert_eq!(config.prefix, "");
        assert_eq!(config.suffix, "");
        assert_eq!(config.ttl, DEFAULT_TTL);
        assert!(config.connect_timeout().is_none());
        assert!(config.read_timeout().is_none());
    }

    #[test]
    fn test_full() {
        let config: RedisConfig = basic_toml::from_str(
            r#"
            address = "10.1.2.3:6380"
            username = "dns"
            password = "secret"
            prefix = "dns:"
            suffix = ":zone"
            connect_timeout = 2000
            read_timeout = 500
            ttl = 120
            "#,
        )
        .expect("parse failed");

        assert_eq!(config.username.as_deref(), Some("dns"));
        assert_eq!(config.prefix, "dns:");
        assert_eq!(config.suffix, ":zone");
        assert_eq!(config.connect_timeout(), Some(Duration::from_millis(2000)));
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(500)));
        assert_eq!(config.ttl, 120);
    }
}
