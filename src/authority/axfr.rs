// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Full zone transfer: record assembly and envelope framing.

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::{Name, Record};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use tracing::warn;

use crate::authority::catalog::resolve_extras;
use crate::authority::materializer::{
    a_records, aaaa_records, cname_records, mx_records, ns_records, ptr_records, soa_record,
    srv_records, txt_records,
};
use crate::authority::{LookupError, ZoneIndex};
use crate::record::APEX_LABEL;
use crate::store::redis::RedisStore;

/// Upper bound on the cumulative wire length of one transfer envelope
pub(crate) const MAX_TRANSFER_LENGTH: usize = 1000;

/// Assembles the complete, ordered record stream for a zone transfer.
///
/// The stream opens and closes with the apex SOA. Every owner's address,
/// alias, mail, service, pointer, and text records appear in between, with
/// referenced glue merged into the same stream rather than a separate
/// additional section. Fails when the zone has no SOA at the apex.
pub(crate) async fn assemble(
    store: &RedisStore,
    zone: &ZoneIndex,
) -> Result<Vec<Record>, LookupError> {
    let origin = zone.origin().clone();
    let default_ttl = store.default_ttl();

    let apex_records = store.fetch_apex(&origin).await?.unwrap_or_default();
    let Some(soa) = soa_record(&origin, &apex_records, default_ttl) else {
        warn!(zone = %origin, "zone has no SOA, refusing transfer");
        return Err(ResponseCode::ServFail.into());
    };

    let mut answers = Vec::new();
    let mut glue_hosts = Vec::new();

    // the apex contributes its delegation set alongside the SOA
    let apex_ns = ns_records(&origin, &apex_records, default_ttl);
    answers.extend(apex_ns.answers);
    glue_hosts.extend(apex_ns.glue_hosts);

    let mut owners: Vec<&str> = zone.owners().filter(|o| *o != APEX_LABEL).collect();
    owners.sort_unstable();

    for owner in owners {
        let qname = match Name::from_ascii(format!("{owner}.{}", zone.origin_str())) {
            Ok(name) => name,
            Err(error) => {
                warn!(owner, %error, "skipping owner with unparsable name");
                continue;
            }
        };
        let Some(records) = store.fetch_records(&origin, owner).await? else {
            continue;
        };

        answers.extend(a_records(&qname, &records, default_ttl));
        answers.extend(aaaa_records(&qname, &records, default_ttl));
        answers.extend(cname_records(&qname, &records, default_ttl));
        answers.extend(txt_records(&qname, &records, default_ttl));

        let mx = mx_records(&qname, &records, default_ttl);
        answers.extend(mx.answers);
        glue_hosts.extend(mx.glue_hosts);

        let srv = srv_records(&qname, &records, default_ttl);
        answers.extend(srv.answers);
        glue_hosts.extend(srv.glue_hosts);

        let ptr = ptr_records(&qname, &records, default_ttl);
        answers.extend(ptr.answers);
        glue_hosts.extend(ptr.glue_hosts);
    }

    let extras = resolve_extras(store, zone, glue_hosts).await;

    let mut stream = Vec::with_capacity(answers.len() + extras.len() + 2);
    stream.push(soa.clone());
    stream.extend(answers);
    stream.extend(extras);
    stream.push(soa);
    Ok(stream)
}

/// Splits an ordered record stream into envelopes whose cumulative wire
/// length stays within [`MAX_TRANSFER_LENGTH`].
///
/// Records are taken in order; when the next record would push the running
/// total over the bound the envelope is flushed and the counter reset. A
/// single oversized record still travels alone in its own envelope.
pub(crate) fn partition(records: Vec<Record>) -> Vec<Vec<Record>> {
    let mut envelopes = Vec::new();
    let mut current = Vec::new();
    let mut length = 0;

    for record in records {
        let record_length = wire_length(&record);
        if length + record_length > MAX_TRANSFER_LENGTH && !current.is_empty() {
            envelopes.push(std::mem::take(&mut current));
            length = 0;
        }
        length += record_length;
        current.push(record);
    }
    if !current.is_empty() {
        envelopes.push(current);
    }

    envelopes
}

/// Wire length of one record encoded standalone, without name compression
fn wire_length(record: &Record) -> usize {
    let mut buffer = Vec::with_capacity(64);
    let mut encoder = BinEncoder::new(&mut buffer);
    if let Err(error) = record.emit(&mut encoder) {
        warn!(%error, "failed to size record for transfer");
    }
    buffer.len()
}
