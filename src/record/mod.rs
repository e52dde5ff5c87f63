// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The stored record model: one JSON document per owner name.
//!
//! Every owner name in a zone maps to a single [`RecordSet`], a product of
//! typed per-record-type lists. The canonical JSON form uses upper-case
//! record-type keys and lower-case field names; lower-case record-type keys
//! are accepted for tolerance:
//!
//! ```text
//! {
//!   "SOA": {"ttl":300,"mname":"ns1.example.com.","rname":"hostmaster.example.com.",
//!           "serial":0,"refresh":44,"retry":55,"expire":66,"min_ttl":100},
//!   "A":   [{"ttl":300,"ip":"1.2.3.4"},{"ttl":300,"ip":"5.6.7.8"}]
//! }
//! ```
//!
//! A `ttl` below zero (or absent) means "use the resolver default".

pub mod rdata;
pub mod serial;
mod zone;

use std::net::{Ipv4Addr, Ipv6Addr};

use serde::{Deserialize, Serialize};

pub use self::zone::{Zone, APEX_LABEL};

/// TTL applied when neither the record nor the resolver configuration
/// provides one.
pub const DEFAULT_TTL: u32 = 3600;

fn unset_ttl() -> i64 {
    -1
}

/// Returns `name` in fully-qualified form, appending the zone origin when the
/// name is still relative.
pub fn fqdn(name: &str, origin: &str) -> String {
    if name.ends_with('.') {
        return name.to_string();
    }
    let origin = origin.trim_start_matches('.');
    if origin.ends_with('.') {
        format!("{name}.{origin}")
    } else {
        format!("{name}.{origin}.")
    }
}

/// The record set stored for a single owner name.
///
/// The SOA slot is only meaningful at the apex field `@`; everything else is
/// an independent ordered list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordSet {
    /// SOA for the zone, mandatory at `@` and meaningless elsewhere
    #[serde(rename = "SOA", alias = "soa", skip_serializing_if = "Option::is_none")]
    pub soa: Option<SoaRecord>,
    /// IPv4 host addresses
    #[serde(rename = "A", alias = "a", skip_serializing_if = "Vec::is_empty")]
    pub a: Vec<ARecord>,
    /// IPv6 host addresses
    #[serde(rename = "AAAA", alias = "aaaa", skip_serializing_if = "Vec::is_empty")]
    pub aaaa: Vec<AaaaRecord>,
    /// Free-form text records
    #[serde(rename = "TXT", alias = "txt", skip_serializing_if = "Vec::is_empty")]
    pub txt: Vec<TxtRecord>,
    /// Canonical-name aliases
    #[serde(rename = "CNAME", alias = "cname", skip_serializing_if = "Vec::is_empty")]
    pub cname: Vec<CnameRecord>,
    /// Delegations
    #[serde(rename = "NS", alias = "ns", skip_serializing_if = "Vec::is_empty")]
    pub ns: Vec<NsRecord>,
    /// Mail exchangers
    #[serde(rename = "MX", alias = "mx", skip_serializing_if = "Vec::is_empty")]
    pub mx: Vec<MxRecord>,
    /// Service locations
    #[serde(rename = "SRV", alias = "srv", skip_serializing_if = "Vec::is_empty")]
    pub srv: Vec<SrvRecord>,
    /// Reverse pointers
    #[serde(rename = "PTR", alias = "ptr", skip_serializing_if = "Vec::is_empty")]
    pub ptr: Vec<PtrRecord>,
    /// Certification authority authorizations
    #[serde(rename = "CAA", alias = "caa", skip_serializing_if = "Vec::is_empty")]
    pub caa: Vec<CaaRecord>,
}

impl RecordSet {
    /// Returns true if no record of any type is present
    pub fn is_empty(&self) -> bool {
        self.soa.is_none()
            && self.a.is_empty()
            && self.aaaa.is_empty()
            && self.txt.is_empty()
            && self.cname.is_empty()
            && self.ns.is_empty()
            && self.mx.is_empty()
            && self.srv.is_empty()
            && self.ptr.is_empty()
            && self.caa.is_empty()
    }

    /// Completes every host-typed field to a fully-qualified name by
    /// appending the zone origin.
    ///
    /// Applied defensively on every read, so partially-qualified data written
    /// by external tooling still materializes correctly.
    pub fn make_fqdn(&mut self, origin: &str) {
        if origin.is_empty() {
            return;
        }

        if let Some(soa) = &mut self.soa {
            soa.mname = fqdn(&soa.mname, origin);
            soa.rname = fqdn(&soa.rname, origin);
        }
        for cname in &mut self.cname {
            cname.host = fqdn(&cname.host, origin);
        }
        for ns in &mut self.ns {
            ns.host = fqdn(&ns.host, origin);
        }
        for mx in &mut self.mx {
            mx.host = fqdn(&mx.host, origin);
        }
        for srv in &mut self.srv {
            srv.target = fqdn(&srv.target, origin);
        }
    }
}

/// SOA record data, stored once per zone at the `@` field
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoaRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// Primary name server for the zone
    #[serde(default)]
    pub mname: String,
    /// Mailbox of the party responsible for the zone
    #[serde(default)]
    pub rname: String,
    /// Zone version; zero asks the resolver to generate one at response time
    #[serde(default)]
    pub serial: u32,
    /// Secondary refresh interval
    #[serde(default)]
    pub refresh: u32,
    /// Retry interval after a failed refresh
    #[serde(default)]
    pub retry: u32,
    /// Upper bound on how long secondaries serve without a refresh
    #[serde(default)]
    pub expire: u32,
    /// Minimum TTL for negative caching
    #[serde(default, rename = "min_ttl", alias = "minttl", alias = "minimum")]
    pub min_ttl: u32,
}

/// A single IPv4 address record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ARecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The address; entries without one are skipped on materialization
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
}

/// A single IPv6 address record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AaaaRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The address; entries without one are skipped on materialization
    #[serde(default)]
    pub ip: Option<Ipv6Addr>,
}

/// A single text record; long values are chunked on the wire
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxtRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The text payload
    #[serde(default)]
    pub text: String,
}

/// A canonical-name record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CnameRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The alias target, completed to FQDN on read
    #[serde(default)]
    pub host: String,
}

/// A name-server record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The name server host, completed to FQDN on read
    #[serde(default)]
    pub host: String,
}

/// A mail-exchanger record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MxRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The mail host, completed to FQDN on read
    #[serde(default)]
    pub host: String,
    /// Preference, lower wins
    #[serde(default)]
    pub preference: u16,
}

/// A service-location record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// Priority, lower wins
    #[serde(default)]
    pub priority: u16,
    /// Weight among targets of equal priority
    #[serde(default)]
    pub weight: u16,
    /// Service port
    #[serde(default)]
    pub port: u16,
    /// The service host, completed to FQDN on read
    #[serde(default)]
    pub target: String,
}

/// A reverse-pointer record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtrRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// The pointed-to name
    #[serde(default)]
    pub name: String,
}

/// A certification-authority-authorization record
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaaRecord {
    /// TTL in seconds, negative for "use default"
    #[serde(default = "unset_ttl")]
    pub ttl: i64,
    /// Critical flag octet; the high bit marks the tag as mandatory
    #[serde(default)]
    pub flag: u8,
    /// Property tag, e.g. `issue` or `iodef`
    #[serde(default)]
    pub tag: String,
    /// Property value
    #[serde(default)]
    pub value: String,
}

/// Resolves a stored TTL against the configured default.
///
/// A negative stored value means "unset"; the configured default applies
/// then, and [`DEFAULT_TTL`] backs the configuration itself.
pub(crate) fn ttl_or(stored: i64, default: u32) -> u32 {
    if stored >= 0 {
        stored as u32
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APEX_JSON: &str = r#"{
        "SOA": {"ttl":300,"mname":"ns1.example.com.",
                "rname":"hostmaster.example.com.",
                "serial":0,"refresh":44,"retry":55,"expire":66,"min_ttl":100},
        "A":   [{"ttl":300,"ip":"1.2.3.4"},{"ttl":300,"ip":"5.6.7.8"}]
    }"#;

    #[test]
    fn test_parse_apex() {
        let set: RecordSet = serde_json::from_str(APEX_JSON).expect("parse failed");

        let soa = set.soa.as_ref().expect("missing SOA");
        assert_eq!(soa.mname, "ns1.example.com.");
        assert_eq!(soa.rname, "hostmaster.example.com.");
        assert_eq!(soa.serial, 0);
        assert_eq!(soa.refresh, 44);
        assert_eq!(soa.retry, 55);
        assert_eq!(soa.expire, 66);
        assert_eq!(soa.min_ttl, 100);

        assert_eq!(set.a.len(), 2);
        assert_eq!(set.a[0].ip, Some(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(set.a[1].ip, Some(Ipv4Addr::new(5, 6, 7, 8)));
    }

    #[test]
    fn test_round_trip() {
        let set: RecordSet = serde_json::from_str(APEX_JSON).expect("parse failed");
        let json = serde_json::to_string(&set).expect("serialize failed");
        let again: RecordSet = serde_json::from_str(&json).expect("reparse failed");
        assert_eq!(set, again);
    }

    #[test]
    fn test_lower_case_keys() {
        let set: RecordSet =
            serde_json::from_str(r#"{"a":[{"ttl":60,"ip":"10.0.0.1"}],"txt":[{"text":"x"}]}"#)
                .expect("parse failed");
        assert_eq!(set.a.len(), 1);
        assert_eq!(set.txt.len(), 1);
        // unset ttl reads as negative
        assert!(set.txt[0].ttl < 0);
    }

    #[test]
    fn test_unknown_keys_rejected_records_default() {
        let set: RecordSet = serde_json::from_str("{}").expect("parse failed");
        assert!(set.is_empty());
    }

    #[test]
    fn test_make_fqdn() {
        let mut set: RecordSet = serde_json::from_str(
            r#"{"MX":[{"ttl":300,"host":"mail","preference":10}],
                "CNAME":[{"ttl":300,"host":"www.example.net."}],
                "SRV":[{"ttl":300,"priority":1,"weight":1,"port":80,"target":"svc"}],
                "NS":[{"ttl":300,"host":"ns1"}]}"#,
        )
        .expect("parse failed");

        set.make_fqdn("example.com.");

        assert_eq!(set.mx[0].host, "mail.example.com.");
        // already qualified names are left alone
        assert_eq!(set.cname[0].host, "www.example.net.");
        assert_eq!(set.srv[0].target, "svc.example.com.");
        assert_eq!(set.ns[0].host, "ns1.example.com.");
    }

    #[test]
    fn test_ttl_or() {
        assert_eq!(ttl_or(-1, 120), 120);
        assert_eq!(ttl_or(0, 120), 0);
        assert_eq!(ttl_or(300, 120), 300);
    }
}
