// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Conversion from stored records to wire-format record data.
//!
//! Each conversion returns `None` for entries that carry no usable value
//! (a missing address, an empty host), which the materializer skips rather
//! than failing the whole answer.

use hickory_proto::rr::rdata::{
    caa::{KeyValue, Property, Value},
    CAA, CNAME, MX, NS, PTR, SOA, SRV, TXT,
};
use hickory_proto::rr::{Name, RData};
use tracing::warn;
use url::Url;

use crate::record::{
    AaaaRecord, ARecord, CaaRecord, CnameRecord, MxRecord, NsRecord, PtrRecord, SoaRecord,
    SrvRecord, TxtRecord,
};

/// Maximum length of a single TXT character-string on the wire
const TXT_CHUNK_LEN: usize = 255;

fn parse_name(name: &str) -> Option<Name> {
    match Name::from_ascii(name) {
        Ok(name) => Some(name),
        Err(error) => {
            warn!(%name, %error, "skipping record with unparsable name");
            None
        }
    }
}

impl ARecord {
    /// Wire data for this record, `None` when no address is set
    pub fn to_rdata(&self) -> Option<RData> {
        self.ip.map(|ip| RData::A(ip.into()))
    }
}

impl AaaaRecord {
    /// Wire data for this record, `None` when no address is set
    pub fn to_rdata(&self) -> Option<RData> {
        self.ip.map(|ip| RData::AAAA(ip.into()))
    }
}

impl TxtRecord {
    /// Wire data for this record, chunked to 255-byte character-strings
    pub fn to_rdata(&self) -> Option<RData> {
        if self.text.is_empty() {
            return None;
        }
        Some(RData::TXT(TXT::new(split255(&self.text))))
    }
}

impl CnameRecord {
    /// Wire data for this record, `None` when the target is empty
    pub fn to_rdata(&self) -> Option<RData> {
        if self.host.is_empty() {
            return None;
        }
        Some(RData::CNAME(CNAME(parse_name(&self.host)?)))
    }
}

impl NsRecord {
    /// Wire data for this record, `None` when the host is empty
    pub fn to_rdata(&self) -> Option<RData> {
        if self.host.is_empty() {
            return None;
        }
        Some(RData::NS(NS(parse_name(&self.host)?)))
    }
}

impl PtrRecord {
    /// Wire data for this record, `None` when the name is empty
    pub fn to_rdata(&self) -> Option<RData> {
        if self.name.is_empty() {
            return None;
        }
        Some(RData::PTR(PTR(parse_name(&self.name)?)))
    }
}

impl MxRecord {
    /// Wire data for this record, `None` when the mail host is empty
    pub fn to_rdata(&self) -> Option<RData> {
        if self.host.is_empty() {
            return None;
        }
        Some(RData::MX(MX::new(self.preference, parse_name(&self.host)?)))
    }
}

impl SrvRecord {
    /// Wire data for this record, `None` when the target is empty
    pub fn to_rdata(&self) -> Option<RData> {
        if self.target.is_empty() {
            return None;
        }
        Some(RData::SRV(SRV::new(
            self.priority,
            self.weight,
            self.port,
            parse_name(&self.target)?,
        )))
    }
}

impl SoaRecord {
    /// Wire data for this record.
    ///
    /// `serial` overrides the stored serial; callers substitute a generated
    /// one when the stored value is zero.
    pub fn to_rdata(&self, serial: u32) -> Option<RData> {
        Some(RData::SOA(SOA::new(
            parse_name(&self.mname)?,
            parse_name(&self.rname)?,
            serial,
            self.refresh as i32,
            self.retry as i32,
            self.expire as i32,
            self.min_ttl,
        )))
    }
}

impl CaaRecord {
    /// Wire data for this record, `None` when the tag or value is empty or
    /// the value does not fit the tag.
    pub fn to_rdata(&self) -> Option<RData> {
        if self.tag.is_empty() || self.value.is_empty() {
            return None;
        }

        let issuer_critical = self.flag & 0x80 != 0;
        let tag = Property::from(self.tag.clone());
        let value = match &tag {
            Property::Issue | Property::IssueWild => issuer_value(&self.value)?,
            Property::Iodef => match Url::parse(&self.value) {
                Ok(url) => Value::Url(url),
                Err(error) => {
                    warn!(value = %self.value, %error, "skipping CAA record with bad iodef url");
                    return None;
                }
            },
            Property::Unknown(_) => Value::Unknown(self.value.clone().into_bytes()),
        };

        Some(RData::CAA(CAA {
            issuer_critical,
            tag,
            value,
        }))
    }
}

/// Parses an `issue`/`issuewild` value of the form
/// `<issuer-name>[; key=value]*` into its wire representation.
fn issuer_value(value: &str) -> Option<Value> {
    let mut parts = value.split(';');
    let issuer = parts.next().unwrap_or_default().trim();
    let name = if issuer.is_empty() {
        None
    } else {
        Some(parse_name(issuer)?)
    };

    let mut options = Vec::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=')?;
        options.push(KeyValue::new(key.trim(), value.trim()));
    }

    Some(Value::Issuer(name, options))
}

/// Splits text into character-strings no longer than 255 bytes, breaking on
/// UTF-8 boundaries.
pub(crate) fn split255(text: &str) -> Vec<String> {
    if text.len() <= TXT_CHUNK_LEN {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::with_capacity(text.len() / TXT_CHUNK_LEN + 1);
    let mut current = String::with_capacity(TXT_CHUNK_LEN);
    for c in text.chars() {
        if current.len() + c.len_utf8() > TXT_CHUNK_LEN {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
