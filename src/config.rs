// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Configuration module for the server binary, `redns`.

use std::fs::File;
use std::io::Read;
use std::net::{AddrParseError, Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use ipnet::IpNet;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::store::redis::RedisConfig;

static DEFAULT_PORT: u16 = 53;
static DEFAULT_TCP_REQUEST_TIMEOUT: u64 = 5;

/// Server configuration
#[derive(Deserialize, Debug)]
pub struct Config {
    /// The list of IPv4 addresses to listen on
    #[serde(default)]
    listen_addrs_ipv4: Vec<String>,
    /// This list of IPv6 addresses to listen on
    #[serde(default)]
    listen_addrs_ipv6: Vec<String>,
    /// Port on which to listen (associated to all IPs)
    listen_port: Option<u16>,
    /// Timeout associated to a request before it is closed
    tcp_request_timeout: Option<u64>,
    /// Level at which to log, default is INFO
    log_level: Option<String>,
    /// Networks allowed to request zone transfers; empty allows everyone
    #[serde(default)]
    axfr_allow_networks: Vec<IpNet>,
    /// The zone store to answer from
    redis: RedisConfig,
}

impl Config {
    /// Read a Config file from the file specified at path.
    pub fn read_config(path: &Path) -> ConfigResult<Self> {
        let mut file = File::open(path)?;
        let mut toml = String::new();
        file.read_to_string(&mut toml)?;
        Self::from_toml(&toml)
    }

    /// Read a [`Config`] from the given TOML string.
    pub fn from_toml(toml: &str) -> ConfigResult<Self> {
        let config: Self = basic_toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that parse but cannot be served from
    fn validate(&self) -> ConfigResult<()> {
        if self.redis.address.is_empty() {
            return Err(ConfigError::Invalid(
                "redis address must not be empty".to_string(),
            ));
        }
        if let Some((_, port)) = self.redis.address.rsplit_once(':') {
            if port.parse::<u16>().is_err() {
                return Err(ConfigError::Invalid(format!(
                    "bad backend port in '{}'",
                    self.redis.address
                )));
            }
        }
        Ok(())
    }

    /// set of listening ipv4 addresses (for TCP and UDP)
    pub fn listen_addrs_ipv4(&self) -> Result<Vec<Ipv4Addr>, AddrParseError> {
        self.listen_addrs_ipv4.iter().map(|s| s.parse()).collect()
    }

    /// set of listening ipv6 addresses (for TCP and UDP)
    pub fn listen_addrs_ipv6(&self) -> Result<Vec<Ipv6Addr>, AddrParseError> {
        self.listen_addrs_ipv6.iter().map(|s| s.parse()).collect()
    }

    /// port on which to listen for connections on specified addresses
    pub fn listen_port(&self) -> u16 {
        self.listen_port.unwrap_or(DEFAULT_PORT)
    }

    /// default timeout for all TCP connections before forcibly shutdown
    pub fn tcp_request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.tcp_request_timeout
                .unwrap_or(DEFAULT_TCP_REQUEST_TIMEOUT),
        )
    }

    /// specify the log level which should be used, ["Trace", "Debug", "Info", "Warn", "Error"]
    pub fn log_level(&self) -> tracing::Level {
        if let Some(level_str) = &self.log_level {
            tracing::Level::from_str(level_str).unwrap_or(tracing::Level::INFO)
        } else {
            tracing::Level::INFO
        }
    }

    /// the networks allowed to request zone transfers
    pub fn axfr_allow_networks(&self) -> &[IpNet] {
        &self.axfr_allow_networks
    }

    /// the zone store configuration
    pub fn redis(&self) -> &RedisConfig {
        &self.redis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config = Config::from_toml(
            r#"
            [redis]
            address = "127.0.0.1:6379"
            "#,
        )
        .expect("parse failed");

        assert_eq!(config.listen_port(), 53);
        assert_eq!(config.tcp_request_timeout(), Duration::from_secs(5));
        assert_eq!(config.log_level(), tracing::Level::INFO);
        assert!(config.axfr_allow_networks().is_empty());
        assert!(config.listen_addrs_ipv4().unwrap().is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml(
            r#"
            listen_addrs_ipv4 = ["0.0.0.0"]
            listen_addrs_ipv6 = ["::1"]
            listen_port = 10053
            tcp_request_timeout = 25
            log_level = "debug"
            axfr_allow_networks = ["10.0.0.0/8", "fd00::/8"]

            [redis]
            address = "127.0.0.1:6379"
            prefix = "dns:"
            ttl = 300
            "#,
        )
        .expect("parse failed");

        assert_eq!(
            config.listen_addrs_ipv4().unwrap(),
            vec![Ipv4Addr::new(0, 0, 0, 0)]
        );
        assert_eq!(config.listen_addrs_ipv6().unwrap().len(), 1);
        assert_eq!(config.listen_port(), 10053);
        assert_eq!(config.tcp_request_timeout(), Duration::from_secs(25));
        assert_eq!(config.log_level(), tracing::Level::DEBUG);
        assert_eq!(config.axfr_allow_networks().len(), 2);
        assert_eq!(config.redis().prefix, "dns:");
        assert_eq!(config.redis().ttl, 300);
    }

    #[test]
    fn test_missing_redis_section_fails() {
        assert!(Config::from_toml("listen_port = 53").is_err());
    }

    #[test]
    fn test_empty_backend_address_rejected() {
        let result = Config::from_toml(
            r#"
            [redis]
            address = ""
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_bad_backend_port_rejected() {
        let result = Config::from_toml(
            r#"
            [redis]
            address = "127.0.0.1:not-a-port"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_address_without_port_accepted() {
        // the client falls back to the default port
        assert!(Config::from_toml(
            r#"
            [redis]
            address = "redis.internal"
            "#,
        )
        .is_ok());
    }
}
