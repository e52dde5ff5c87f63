// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Zone access on top of a key/value [`Backend`].
//!
//! Every zone is one hash at `<prefix><apex_fqdn><suffix>`. Hash fields are
//! owner labels relative to the apex, with `@` holding the apex itself, and
//! field values are the JSON documents decoded by [`crate::record`].

use std::sync::Arc;

use hickory_proto::rr::Name;
use tracing::warn;

use crate::authority::ZoneIndex;
use crate::error::BackendResult;
use crate::record::{RecordSet, Zone, APEX_LABEL};
use crate::store::redis::RedisConfig;
use crate::store::Backend;

/// Zone discovery, loading, and persistence against a key/value backend.
///
/// Cheap to clone; clones share the backend connection. The store keeps no
/// zone state between queries, so external writes are visible on the next
/// fetch.
#[derive(Clone)]
pub struct RedisStore {
    backend: Arc<dyn Backend>,
    key_prefix: String,
    key_suffix: String,
    default_ttl: u32,
}

impl RedisStore {
    /// Creates a store over the given backend using the key schema and TTL
    /// from the configuration.
    pub fn new(backend: Arc<dyn Backend>, config: &RedisConfig) -> Self {
        Self {
            backend,
            key_prefix: config.prefix.clone(),
            key_suffix: config.suffix.clone(),
            default_ttl: config.ttl,
        }
    }

    /// The TTL applied to records that do not carry their own
    pub fn default_ttl(&self) -> u32 {
        self.default_ttl
    }

    /// The backend key for a zone apex
    pub fn key(&self, apex: &str) -> String {
        format!("{}{}{}", self.key_prefix, apex, self.key_suffix)
    }

    /// Lists every configured zone that could own the query name.
    ///
    /// The scan is restricted to keys ending in the query's two rightmost
    /// labels, which bounds the KEYS pattern walk while still finding every
    /// candidate ancestor. Zones at the root cannot be expressed by this
    /// scheme and are skipped with a warning.
    pub async fn discover_zones(&self, qname: &Name) -> BackendResult<Vec<Name>> {
        let reduced = reduce_name(qname);
        let pattern = format!("{}*{}{}", self.key_prefix, reduced, self.key_suffix);

        let keys = self.backend.keys(&pattern).await?;
        let mut zones = Vec::with_capacity(keys.len());
        for key in keys {
            let apex = key.strip_prefix(&self.key_prefix).unwrap_or(&key);
            let apex = apex.strip_suffix(&self.key_suffix).unwrap_or(apex);

            match Name::from_ascii(apex) {
                Ok(name) if name.is_root() => {
                    warn!(%key, "root zones are not servable, ignoring key");
                }
                Ok(name) => zones.push(name.to_lowercase()),
                Err(error) => {
                    warn!(%key, %error, "ignoring zone key that is not a domain name");
                }
            }
        }

        Ok(zones)
    }

    /// Loads the owner-label index of a zone without fetching any record
    /// bodies. Returns `None` when the zone key is absent or empty.
    pub async fn load_zone(&self, apex: &Name) -> BackendResult<Option<ZoneIndex>> {
        let apex = apex.to_lowercase();
        let owners = self.backend.hkeys(&self.key(&apex.to_string())).await?;
        if owners.is_empty() {
            return Ok(None);
        }

        Ok(Some(ZoneIndex::new(apex, owners)))
    }

    /// Fetches and decodes the record set stored for one owner label.
    ///
    /// Host-typed fields are defensively completed to FQDN against the apex.
    /// Returns `None` when the owner has no stored document.
    pub async fn fetch_records(&self, apex: &Name, owner: &str) -> BackendResult<Option<RecordSet>> {
        let apex = apex.to_lowercase().to_string();
        let Some(value) = self.backend.hget(&self.key(&apex), owner).await? else {
            return Ok(None);
        };

        let mut records: RecordSet = serde_json::from_str(&value)?;
        records.make_fqdn(&apex);
        Ok(Some(records))
    }

    /// Writes every owner of the zone as one hash field each
    pub async fn save_zone(&self, zone: &Zone) -> BackendResult<()> {
        let key = self.key(zone.name());
        for (label, records) in zone.owners() {
            let value = serde_json::to_string(records)?;
            self.backend.hset(&key, label, &value).await?;
        }
        Ok(())
    }

    /// Removes a zone and all its owners
    pub async fn delete_zone(&self, apex: &str) -> BackendResult<()> {
        self.backend.del(&self.key(apex)).await
    }

    /// Verifies the backend is reachable
    pub async fn ping(&self) -> BackendResult<()> {
        self.backend.ping().await
    }

    /// Fetches the apex record set of a zone
    pub async fn fetch_apex(&self, apex: &Name) -> BackendResult<Option<RecordSet>> {
        self.fetch_records(apex, APEX_LABEL).await
    }
}

/// Reduces a name to its two rightmost labels followed by a trailing dot;
/// names with fewer than two labels reduce to themselves.
fn reduce_name(name: &Name) -> String {
    let name = name.to_lowercase().to_string();
    let labels = name
        .trim_end_matches('.')
        .split('.')
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>();

    if labels.len() < 2 {
        return name;
    }

    format!("{}.{}.", labels[labels.len() - 2], labels[labels.len() - 1])
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::str::FromStr;
    use std::sync::Mutex;

    use super::*;
    use crate::error::BackendError;
    use crate::record::{ARecord, SoaRecord};

    #[test]
    fn test_reduce_name() {
        let name = Name::from_str("a.b.example.co.uk.").unwrap();
        assert_eq!(reduce_name(&name), "co.uk.");

        let name = Name::from_str("example.com.").unwrap();
        assert_eq!(reduce_name(&name), "example.com.");

        let name = Name::from_str("localhost.").unwrap();
        assert_eq!(reduce_name(&name), "localhost.");
    }

    #[test]
    fn test_key_schema() {
        let backend = Arc::new(EmptyBackend);
        let config = RedisConfig {
            address: "127.0.0.1:6379".to_string(),
            username: None,
            password: None,
            prefix: "dns:".to_string(),
            suffix: ":zone".to_string(),
            connect_timeout: 0,
            read_timeout: 0,
            ttl: 60,
        };
        let store = RedisStore::new(backend, &config);
        assert_eq!(store.key("example.com."), "dns:example.com.:zone");
        assert_eq!(store.default_ttl(), 60);
    }

    #[tokio::test]
    async fn test_discover_strips_key_decoration() {
        let keys = vec![
            "dns:example.com.:zone".to_string(),
            "dns:sub.example.com.:zone".to_string(),
            "dns:not a name:zone".to_string(),
        ];
        let backend = Arc::new(FixedKeysBackend {
            keys: Mutex::new(HashMap::from([(
                "dns:*example.com.:zone".to_string(),
                keys,
            )])),
        });
        let config = RedisConfig {
            address: "127.0.0.1:6379".to_string(),
            username: None,
            password: None,
            prefix: "dns:".to_string(),
            suffix: ":zone".to_string(),
            connect_timeout: 0,
            read_timeout: 0,
            ttl: 60,
        };
        let store = RedisStore::new(backend, &config);

        let zones = store
            .discover_zones(&Name::from_str("www.example.com.").unwrap())
            .await
            .expect("discover failed");

        assert_eq!(
            zones,
            vec![
                Name::from_str("example.com.").unwrap(),
                Name::from_str("sub.example.com.").unwrap(),
            ]
        );
    }

    fn decorated_store(backend: Arc<dyn Backend>) -> RedisStore {
        let config = RedisConfig {
            address: "127.0.0.1:6379".to_string(),
            username: None,
            password: None,
            prefix: "dns:".to_string(),
            suffix: ":zone".to_string(),
            connect_timeout: 0,
            read_timeout: 0,
            ttl: 60,
        };
        RedisStore::new(backend, &config)
    }

    fn test_zone() -> Zone {
        let mut zone = Zone::new(
            "example.com.",
            SoaRecord {
                ttl: 300,
                mname: "ns1.example.com.".to_string(),
                rname: "hostmaster.example.com.".to_string(),
                serial: 0,
                refresh: 44,
                retry: 55,
                expire: 66,
                min_ttl: 100,
            },
        );
        zone.add_a(
            "www",
            ARecord {
                ttl: 300,
                ip: Some([1, 2, 3, 4].into()),
            },
        );
        zone
    }

    #[tokio::test]
    async fn test_save_zone_writes_each_owner() {
        let backend = Arc::new(RecordingBackend::default());
        let store = decorated_store(backend.clone());

        store.save_zone(&test_zone()).await.expect("save failed");

        let writes = backend.writes.lock().unwrap().clone();
        assert_eq!(writes.len(), 2);
        // one field per owner, all on the decorated zone key
        assert!(writes
            .iter()
            .all(|(key, _, _)| key == "dns:example.com.:zone"));
        let fields: Vec<&str> = writes.iter().map(|(_, field, _)| field.as_str()).collect();
        assert_eq!(fields, vec!["@", "www"]);

        // stored values decode back to the records that were saved
        let apex: RecordSet = serde_json::from_str(&writes[0].2).expect("bad apex json");
        assert_eq!(apex.soa.as_ref().map(|soa| soa.refresh), Some(44));
        let www: RecordSet = serde_json::from_str(&writes[1].2).expect("bad owner json");
        assert_eq!(www.a.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_zone_uses_decorated_key() {
        let backend = Arc::new(RecordingBackend::default());
        let store = decorated_store(backend.clone());

        store.delete_zone("example.com.").await.expect("delete failed");

        let deletes = backend.deletes.lock().unwrap().clone();
        assert_eq!(deletes, vec!["dns:example.com.:zone".to_string()]);
    }

    #[tokio::test]
    async fn test_save_zone_round_trips_through_fetch() {
        let backend = Arc::new(RecordingBackend::default());
        let store = decorated_store(backend.clone());

        store.save_zone(&test_zone()).await.expect("save failed");

        let records = store
            .fetch_records(&Name::from_str("example.com.").unwrap(), "www")
            .await
            .expect("fetch failed")
            .expect("owner missing");
        assert_eq!(records.a.len(), 1);
        assert_eq!(records.a[0].ttl, 300);
    }

    struct EmptyBackend;

    #[async_trait::async_trait]
    impl Backend for EmptyBackend {
        async fn keys(&self, _pattern: &str) -> BackendResult<Vec<String>> {
            Ok(vec![])
        }
        async fn hkeys(&self, _key: &str) -> BackendResult<Vec<String>> {
            Ok(vec![])
        }
        async fn hget(&self, _key: &str, _field: &str) -> BackendResult<Option<String>> {
            Ok(None)
        }
        async fn hset(&self, _key: &str, _field: &str, _value: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn del(&self, _key: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn ping(&self) -> BackendResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingBackend {
        writes: Mutex<Vec<(String, String, String)>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl Backend for RecordingBackend {
        async fn keys(&self, _pattern: &str) -> BackendResult<Vec<String>> {
            Ok(vec![])
        }
        async fn hkeys(&self, key: &str) -> BackendResult<Vec<String>> {
            Ok(self
                .writes
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _, _)| k == key)
                .map(|(_, field, _)| field.clone())
                .collect())
        }
        async fn hget(&self, key: &str, field: &str) -> BackendResult<Option<String>> {
            Ok(self
                .writes
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(k, f, _)| k == key && f == field)
                .map(|(_, _, value)| value.clone()))
        }
        async fn hset(&self, key: &str, field: &str, value: &str) -> BackendResult<()> {
            self.writes.lock().unwrap().push((
                key.to_string(),
                field.to_string(),
                value.to_string(),
            ));
            Ok(())
        }
        async fn del(&self, key: &str) -> BackendResult<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn ping(&self) -> BackendResult<()> {
            Ok(())
        }
    }

    struct FixedKeysBackend {
        keys: Mutex<HashMap<String, Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Backend for FixedKeysBackend {
        async fn keys(&self, pattern: &str) -> BackendResult<Vec<String>> {
            Ok(self
                .keys
                .lock()
                .unwrap()
                .get(pattern)
                .cloned()
                .unwrap_or_default())
        }
        async fn hkeys(&self, _key: &str) -> BackendResult<Vec<String>> {
            Ok(vec![])
        }
        async fn hget(&self, _key: &str, _field: &str) -> BackendResult<Option<String>> {
            Ok(None)
        }
        async fn hset(&self, _key: &str, _field: &str, _value: &str) -> BackendResult<()> {
            Err(BackendError::UnexpectedResponse("read only".to_string()))
        }
        async fn del(&self, _key: &str) -> BackendResult<()> {
            Ok(())
        }
        async fn ping(&self) -> BackendResult<()> {
            Ok(())
        }
    }
}
