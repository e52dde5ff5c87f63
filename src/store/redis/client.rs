// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The Redis client used as the zone backend.

use std::future::Future;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{debug, info};

use crate::error::{BackendError, BackendResult};
use crate::store::redis::RedisConfig;
use crate::store::Backend;

/// A pooled asynchronous Redis connection.
///
/// Commands are multiplexed over a managed connection that reconnects on
/// failure; clones share the underlying connection, so one instance serves
/// the whole process.
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
    read_timeout: Option<Duration>,
}

impl RedisBackend {
    /// Connects to the configured server and verifies it answers PING.
    pub async fn connect(config: &RedisConfig) -> BackendResult<Self> {
        let client = Client::open(connection_info(config)?).map_err(BackendError::Connect)?;

        let connect = ConnectionManager::new(client);
        let manager = match config.connect_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| BackendError::Timeout)?,
            None => connect.await,
        }
        .map_err(BackendError::Connect)?;

        let backend = Self {
            manager,
            read_timeout: config.read_timeout(),
        };
        backend.ping().await?;
        info!(address = %config.address, "connected to redis backend");

        Ok(backend)
    }

    /// Applies the configured read timeout to a single command
    async fn run<T>(&self, command: impl Future<Output = redis::RedisResult<T>>) -> BackendResult<T> {
        match self.read_timeout {
            Some(timeout) => tokio::time::timeout(timeout, command)
                .await
                .map_err(|_| BackendError::Timeout)?
                .map_err(BackendError::from),
            None => command.await.map_err(BackendError::from),
        }
    }
}

fn connection_info(config: &RedisConfig) -> BackendResult<ConnectionInfo> {
    let (host, port) = match config.address.rsplit_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                BackendError::UnexpectedResponse(format!("bad backend port in {}", config.address))
            })?;
            (host.to_string(), port)
        }
        None => (config.address.clone(), 6379),
    };

    Ok(ConnectionInfo {
        addr: ConnectionAddr::Tcp(host, port),
        redis: RedisConnectionInfo {
            username: config.username.clone(),
            password: config.password.clone(),
            ..RedisConnectionInfo::default()
        },
    })
}

#[async_trait::async_trait]
impl Backend for RedisBackend {
    async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
        debug!(pattern, "KEYS");
        let mut conn = self.manager.clone();
        self.run(async move { conn.keys(pattern).await }).await
    }

    async fn hkeys(&self, key: &str) -> BackendResult<Vec<String>> {
        debug!(key, "HKEYS");
        let mut conn = self.manager.clone();
        let key = key.to_string();
        self.run(async move { conn.hkeys(key).await }).await
    }

    async fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>> {
        debug!(key, field, "HGET");
        let mut conn = self.manager.clone();
        let (key, field) = (key.to_string(), field.to_string());
        self.run(async move { conn.hget(key, field).await }).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> BackendResult<()> {
        debug!(key, field, "HSET");
        let mut conn = self.manager.clone();
        let (key, field, value) = (key.to_string(), field.to_string(), value.to_string());
        self.run(async move { conn.hset(key, field, value).await })
            .await
    }

    async fn del(&self, key: &str) -> BackendResult<()> {
        debug!(key, "DEL");
        let mut conn = self.manager.clone();
        let key = key.to_string();
        self.run(async move { conn.del(key).await }).await
    }

    async fn ping(&self) -> BackendResult<()> {
        let mut conn = self.manager.clone();
        let pong: String = self
            .run(async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        if pong != "PONG" {
            return Err(BackendError::UnexpectedResponse(format!(
                "expected 'PONG', got: {pong}"
            )));
        }
        Ok(())
    }
}
