// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An in-memory zone under construction, used by save tooling.

use std::collections::BTreeMap;

use crate::record::serial::{increment_serial, SerialError};
use crate::record::{
    AaaaRecord, ARecord, CaaRecord, CnameRecord, MxRecord, NsRecord, PtrRecord, RecordSet,
    SoaRecord, SrvRecord, TxtRecord,
};

/// The owner label designating the zone apex
pub const APEX_LABEL: &str = "@";

/// A zone assembled in memory before being written to the store.
///
/// Owners are kept relative to the apex, with [`APEX_LABEL`] holding the
/// apex's own record set. A zone is only valid for serving once an SOA is
/// present at the apex.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Zone {
    name: String,
    owners: BTreeMap<String, RecordSet>,
}

impl Zone {
    /// Creates a zone with the given apex name and SOA.
    ///
    /// The name is completed with a trailing dot if it does not carry one.
    pub fn new(name: &str, soa: SoaRecord) -> Self {
        let name = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{name}.")
        };
        let mut zone = Self {
            name,
            owners: BTreeMap::new(),
        };
        zone.owner_mut(APEX_LABEL).soa = Some(soa);
        zone
    }

    /// Assembles a zone from pre-built owner record sets, e.g. a zone file
    /// decoded from JSON.
    ///
    /// Returns `None` unless an SOA is present at `@`; a zone without one is
    /// not servable.
    pub fn from_owners(name: &str, owners: BTreeMap<String, RecordSet>) -> Option<Self> {
        let name = if name.ends_with('.') {
            name.to_string()
        } else {
            format!("{name}.")
        };
        if !owners
            .get(APEX_LABEL)
            .map_or(false, |records| records.soa.is_some())
        {
            return None;
        }
        Some(Self { name, owners })
    }

    /// The fully-qualified apex name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Iterates owner labels and their record sets
    pub fn owners(&self) -> impl Iterator<Item = (&str, &RecordSet)> {
        self.owners.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The SOA at the apex, if one has been set
    pub fn soa(&self) -> Option<&SoaRecord> {
        self.owners.get(APEX_LABEL).and_then(|r| r.soa.as_ref())
    }

    /// Advances the zone serial according to the `YYYYMMDDcc` scheme
    pub fn increment_serial(&mut self) -> Result<u32, SerialError> {
        let soa = self
            .owners
            .get_mut(APEX_LABEL)
            .and_then(|r| r.soa.as_mut())
            .ok_or(SerialError::WrongFormat)?;
        soa.serial = increment_serial(soa.serial)?;
        Ok(soa.serial)
    }

    fn owner_mut(&mut self, label: &str) -> &mut RecordSet {
        self.owners.entry(label.to_string()).or_default()
    }

    /// Adds an A record at the given owner label
    pub fn add_a(&mut self, label: &str, record: ARecord) -> &mut Self {
        self.owner_mut(label).a.push(record);
        self
    }

    /// Adds an AAAA record at the given owner label
    pub fn add_aaaa(&mut self, label: &str, record: AaaaRecord) -> &mut Self {
        self.owner_mut(label).aaaa.push(record);
        self
    }

    /// Adds a TXT record at the given owner label
    pub fn add_txt(&mut self, label: &str, record: TxtRecord) -> &mut Self {
        self.owner_mut(label).txt.push(record);
        self
    }

    /// Adds a CNAME record at the given owner label
    pub fn add_cname(&mut self, label: &str, record: CnameRecord) -> &mut Self {
        self.owner_mut(label).cname.push(record);
        self
    }

    /// Adds an NS record at the given owner label
    pub fn add_ns(&mut self, label: &str, record: NsRecord) -> &mut Self {
        self.owner_mut(label).ns.push(record);
        self
    }

    /// Adds an MX record at the given owner label
    pub fn add_mx(&mut self, label: &str, record: MxRecord) -> &mut Self {
        self.owner_mut(label).mx.push(record);
        self
    }

    /// Adds an SRV record at the given owner label
    pub fn add_srv(&mut self, label: &str, record: SrvRecord) -> &mut Self {
        self.owner_mut(label).srv.push(record);
        self
    }

    /// Adds a PTR record at the given owner label
    pub fn add_ptr(&mut self, label: &str, record: PtrRecord) -> &mut Self {
        self.owner_mut(label).ptr.push(record);
        self
    }

    /// Adds a CAA record at the given owner label
    pub fn add_caa(&mut self, label: &str, record: CaaRecord) -> &mut Self {
        self.owner_mut(label).caa.push(record);
        self
    }
}
