// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Zone storage: the key/value backend abstraction and its Redis
//! implementation.

pub mod redis;

use crate::error::BackendResult;

/// The commands the resolver issues against a key/value store.
///
/// Implementations must be safe to share across concurrently served
/// queries; every method may block on I/O and no caller holds a lock across
/// these calls.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Lists keys matching a glob-style pattern
    async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>>;

    /// Lists the field names of a hash, empty when the key is absent
    async fn hkeys(&self, key: &str) -> BackendResult<Vec<String>>;

    /// Reads one hash field, `None` when the key or field is absent
    async fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>>;

    /// Writes one hash field
    async fn hset(&self, key: &str, field: &str, value: &str) -> BackendResult<()>;

    /// Removes a key and everything under it
    async fn del(&self, key: &str) -> BackendResult<()>;

    /// Verifies the store is reachable
    async fn ping(&self) -> BackendResult<()>;
}
