// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Materialization of stored record sets into wire-format answers.
//!
//! The functions here are pure: they turn one owner's [`RecordSet`] into
//! records for a given query type and report which referenced hosts need
//! glue. Resolving that glue requires further zone lookups and is done by
//! the catalog.

use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};

use crate::record::serial::default_serial;
use crate::record::{ttl_or, RecordSet};

/// Answers for one owner and query type, plus the host names referenced by
/// them whose addresses belong in the additional section.
#[derive(Debug, Default)]
pub(crate) struct Materialized {
    pub(crate) answers: Vec<Record>,
    pub(crate) glue_hosts: Vec<String>,
}

impl Materialized {
    fn answers(answers: Vec<Record>) -> Self {
        Self {
            answers,
            glue_hosts: Vec::new(),
        }
    }
}

/// Builds the answer section for `qtype` out of the records stored at one
/// owner.
///
/// The owner header of every answer is `qname`: for wildcard synthesis the
/// queried name, never the wildcard label. Returns `None` for query types
/// the resolver does not serve.
pub(crate) fn materialize(
    qtype: RecordType,
    qname: &Name,
    origin: &Name,
    records: &RecordSet,
    default_ttl: u32,
) -> Option<Materialized> {
    let materialized = match qtype {
        RecordType::A => Materialized::answers(a_records(qname, records, default_ttl)),
        RecordType::AAAA => Materialized::answers(aaaa_records(qname, records, default_ttl)),
        RecordType::TXT => Materialized::answers(txt_records(qname, records, default_ttl)),
        RecordType::CNAME => Materialized::answers(cname_records(qname, records, default_ttl)),
        RecordType::CAA => Materialized::answers(caa_records(qname, records, default_ttl)),
        RecordType::NS => ns_records(qname, records, default_ttl),
        RecordType::MX => mx_records(qname, records, default_ttl),
        RecordType::SRV => srv_records(qname, records, default_ttl),
        RecordType::PTR => ptr_records(qname, records, default_ttl),
        RecordType::SOA => Materialized::answers(Vec::from_iter(soa_record(
            origin,
            records,
            default_ttl,
        ))),
        _ => return None,
    };

    Some(materialized)
}

fn wire(name: Name, ttl: u32, rdata: RData) -> Record {
    let mut record = Record::from_rdata(name, ttl, rdata);
    record.set_dns_class(DNSClass::IN);
    record
}

pub(crate) fn a_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Vec<Record> {
    records
        .a
        .iter()
        .filter_map(|r| Some(wire(qname.clone(), ttl_or(r.ttl, default_ttl), r.to_rdata()?)))
        .collect()
}

pub(crate) fn aaaa_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Vec<Record> {
    records
        .aaaa
        .iter()
        .filter_map(|r| Some(wire(qname.clone(), ttl_or(r.ttl, default_ttl), r.to_rdata()?)))
        .collect()
}

pub(crate) fn txt_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Vec<Record> {
    records
        .txt
        .iter()
        .filter_map(|r| Some(wire(qname.clone(), ttl_or(r.ttl, default_ttl), r.to_rdata()?)))
        .collect()
}

pub(crate) fn cname_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Vec<Record> {
    records
        .cname
        .iter()
        .filter_map(|r| Some(wire(qname.clone(), ttl_or(r.ttl, default_ttl), r.to_rdata()?)))
        .collect()
}

pub(crate) fn caa_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Vec<Record> {
    records
        .caa
        .iter()
        .filter_map(|r| Some(wire(qname.clone(), ttl_or(r.ttl, default_ttl), r.to_rdata()?)))
        .collect()
}

pub(crate) fn ns_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Materialized {
    let mut materialized = Materialized::default();
    for ns in &records.ns {
        let Some(rdata) = ns.to_rdata() else { continue };
        materialized
            .answers
            .push(wire(qname.clone(), ttl_or(ns.ttl, default_ttl), rdata));
        materialized.glue_hosts.push(ns.host.clone());
    }
    materialized
}

pub(crate) fn mx_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Materialized {
    let mut materialized = Materialized::default();
    for mx in &records.mx {
        let Some(rdata) = mx.to_rdata() else { continue };
        materialized
            .answers
            .push(wire(qname.clone(), ttl_or(mx.ttl, default_ttl), rdata));
        materialized.glue_hosts.push(mx.host.clone());
    }
    materialized
}

pub(crate) fn srv_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Materialized {
    let mut materialized = Materialized::default();
    for srv in &records.srv {
        let Some(rdata) = srv.to_rdata() else { continue };
        materialized
            .answers
            .push(wire(qname.clone(), ttl_or(srv.ttl, default_ttl), rdata));
        materialized.glue_hosts.push(srv.target.clone());
    }
    materialized
}

pub(crate) fn ptr_records(qname: &Name, records: &RecordSet, default_ttl: u32) -> Materialized {
    let mut materialized = Materialized::default();
    for ptr in &records.ptr {
        let Some(rdata) = ptr.to_rdata() else { continue };
        materialized
            .answers
            .push(wire(qname.clone(), ttl_or(ptr.ttl, default_ttl), rdata));
        materialized.glue_hosts.push(ptr.name.clone());
    }
    materialized
}

/// The zone's single SOA, owned by the apex regardless of the queried name.
///
/// A stored serial of zero is replaced with a generated `YYYYMMDDcc` serial
/// so the wire never carries serial zero.
pub(crate) fn soa_record(origin: &Name, records: &RecordSet, default_ttl: u32) -> Option<Record> {
    let soa = records.soa.as_ref()?;
    let serial = if soa.serial == 0 {
        default_serial()
    } else {
        soa.serial
    };
    Some(wire(
        origin.clone(),
        ttl_or(soa.ttl, default_ttl),
        soa.to_rdata(serial)?,
    ))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn example_records() -> RecordSet {
        serde_json::from_str(
            r#"{
                "SOA": {"ttl":300,"mname":"ns1.example.com.","rname":"hostmaster.example.com.",
                        "serial":0,"refresh":44,"retry":55,"expire":66,"min_ttl":100},
                "A":   [{"ttl":300,"ip":"1.2.3.4"},{"ttl":300,"ip":"5.6.7.8"},{"ttl":300}],
                "MX":  [{"ttl":300,"host":"mail.example.com.","preference":10},
                        {"ttl":300,"host":"","preference":20}],
                "TXT": [{"ttl":-1,"text":"hello"}]
            }"#,
        )
        .expect("parse failed")
    }

    #[test]
    fn test_a_materialization() {
        let qname = Name::from_str("x.example.com.").unwrap();
        let records = example_records();

        let answers = a_records(&qname, &records, 3600);
        // the entry without an address is skipped
        assert_eq!(answers.len(), 2);
        for answer in &answers {
            assert_eq!(*answer.name(), qname);
            assert_eq!(answer.ttl(), 300);
            assert_eq!(answer.record_type(), RecordType::A);
        }
    }

    #[test]
    fn test_default_ttl_applies() {
        let qname = Name::from_str("x.example.com.").unwrap();
        let records = example_records();

        let answers = txt_records(&qname, &records, 7200);
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].ttl(), 7200);
    }

    #[test]
    fn test_mx_glue_hosts() {
        let qname = Name::from_str("example.com.").unwrap();
        let records = example_records();

        let materialized = mx_records(&qname, &records, 3600);
        // the empty-host entry produces neither answer nor glue
        assert_eq!(materialized.answers.len(), 1);
        assert_eq!(materialized.glue_hosts, vec!["mail.example.com.".to_string()]);
    }

    #[test]
    fn test_soa_owner_is_apex_and_serial_generated() {
        let origin = Name::from_str("example.com.").unwrap();
        let records = example_records();

        let soa = soa_record(&origin, &records, 3600).expect("no SOA");
        assert_eq!(*soa.name(), origin);

        match soa.data() {
            Some(RData::SOA(data)) => {
                // stored serial zero is replaced at response time
                assert_ne!(data.serial(), 0);
                assert_eq!(data.serial().to_string().len(), 10);
                assert_eq!(data.refresh(), 44);
                assert_eq!(data.minimum(), 100);
            }
            other => panic!("wrong rdata: {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_qtype() {
        let qname = Name::from_str("x.example.com.").unwrap();
        let origin = Name::from_str("example.com.").unwrap();
        let records = example_records();

        assert!(materialize(RecordType::HTTPS, &qname, &origin, &records, 3600).is_none());
    }

    #[test]
    fn test_materialize_nodata() {
        let qname = Name::from_str("x.example.com.").unwrap();
        let origin = Name::from_str("example.com.").unwrap();
        let records = example_records();

        let materialized =
            materialize(RecordType::SRV, &qname, &origin, &records, 3600).expect("supported");
        assert!(materialized.answers.is_empty());
    }
}
