// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Authoritative query resolution: zone matching, owner location, record
//! materialization, and the dispatching catalog.

mod axfr;
mod catalog;
mod materializer;
mod zone;

use enum_as_inner::EnumAsInner;
use hickory_proto::error::ProtoError;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::Record;
use thiserror::Error;

pub use self::catalog::Catalog;
pub use self::zone::ZoneIndex;

use crate::error::BackendError;

/// The records answering one query: authoritative answers plus any glue for
/// the additional section.
#[derive(Debug, Default)]
pub struct AuthLookup {
    /// Authoritative answers
    pub answers: Vec<Record>,
    /// Glue placed in the additional section
    pub additionals: Vec<Record>,
}

impl AuthLookup {
    /// True when no answer record was produced
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// A query could not be fulfilled
#[derive(Debug, EnumAsInner, Error)]
#[non_exhaustive]
pub enum LookupError {
    /// The lookup resolved to a response code other than NoError
    #[error("error performing lookup: {0}")]
    ResponseCode(ResponseCode),

    /// The zone store could not be reached or answered garbage
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A name or record could not be converted to wire form
    #[error("proto error: {0}")]
    Proto(#[from] ProtoError),
}

impl LookupError {
    /// This is a non-existent domain name
    pub fn is_nx_domain(&self) -> bool {
        matches!(self, Self::ResponseCode(ResponseCode::NXDomain))
    }

    /// The lookup was refused
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::ResponseCode(ResponseCode::Refused))
    }
}

impl From<ResponseCode> for LookupError {
    fn from(code: ResponseCode) -> Self {
        debug_assert!(code != ResponseCode::NoError);
        Self::ResponseCode(code)
    }
}
