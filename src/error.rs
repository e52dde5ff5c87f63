// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Error types shared across the crate

use std::{io, net::AddrParseError};

use thiserror::Error;

/// An alias for results returned by backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// An error raised by the key/value store client or while decoding what it
/// returned.
///
/// Backend errors are never retried; the query that hit one either fails
/// fast with SERVFAIL or, if no zone had been matched yet, is handed to the
/// next handler in the chain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// Establishing the connection to the store failed
    #[error("failed to connect to backend: {0}")]
    Connect(#[source] redis::RedisError),

    /// A command sent on an established connection failed
    #[error("backend command failed: {0}")]
    Command(#[from] redis::RedisError),

    /// A command did not complete within the configured read timeout
    #[error("backend operation timed out")]
    Timeout,

    /// A stored record set could not be decoded
    #[error("malformed stored record: {0}")]
    Decode(#[from] serde_json::Error),

    /// The store answered with something the client could not interpret
    #[error("unexpected backend response: {0}")]
    UnexpectedResponse(String),
}

/// An alias for configuration results
pub type ConfigResult<T> = Result<T, ConfigError>;

/// An error encountered while reading or validating the server configuration
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("error reading config file: {0}")]
    Io(#[from] io::Error),

    /// The configuration file could not be parsed
    #[error("error parsing config file: {0}")]
    Toml(#[from] basic_toml::Error),

    /// A listen address could not be parsed
    #[error("error parsing listen address: {0}")]
    Addr(#[from] AddrParseError),

    /// A value was syntactically valid but unusable
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
