// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The catalog dispatches each query through zone discovery, owner
//! location, record materialization, and response assembly.

use std::collections::HashSet;
use std::sync::Arc;

use hickory_proto::op::{Edns, Message, MessageType, OpCode, ResponseCode};
use hickory_proto::rr::{LowerName, Name, Record, RecordType};
use ipnet::IpNet;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::access::Access;
use crate::authority::axfr;
use crate::authority::materializer::{
    a_records, aaaa_records, cname_records, materialize,
};
use crate::authority::{AuthLookup, LookupError, ZoneIndex};
use crate::error::BackendError;
use crate::record::RecordSet;
use crate::server::{Protocol, Request, RequestHandler, ResponseHandler, ResponseInfo};
use crate::store::redis::RedisStore;

/// The authoritative request handler.
///
/// Stateless per query: the zone set is discovered from the store for every
/// request, so external zone writes are visible immediately. Queries no
/// local zone owns are handed to the chained handler when one is
/// configured, and refused otherwise.
pub struct Catalog {
    store: RedisStore,
    axfr_access: Access,
    next: Option<Arc<dyn RequestHandler>>,
}

impl Catalog {
    /// Constructs a catalog answering from the given store
    pub fn new(store: RedisStore) -> Self {
        Self {
            store,
            axfr_access: Access::default(),
            next: None,
        }
    }

    /// Restricts zone transfers to sources within `network`.
    ///
    /// Until the first network is added, transfers are open to every
    /// source.
    pub fn allow_axfr_from(&mut self, network: IpNet) {
        self.axfr_access.insert(network);
    }

    /// Chains a handler for queries outside the configured zones
    pub fn set_next(&mut self, next: Arc<dyn RequestHandler>) {
        self.next = Some(next);
    }

    /// Given the requested query, look up and return any matching results.
    async fn lookup(
        &self,
        request: &Request,
        response_edns: Option<Edns>,
        response_handle: &mut dyn ResponseHandler,
    ) -> ResponseInfo {
        let Some(query) = request.message.queries().first() else {
            return send_error_response(
                request,
                ResponseCode::FormErr,
                response_edns,
                response_handle,
            )
            .await;
        };
        let qname = query.name().clone();
        let qtype = query.query_type();

        // nothing to serve for an unspecified name or type
        if qname.is_root() || qtype == RecordType::ZERO {
            return self.forward(request, response_edns, response_handle).await;
        }

        let zones = match self.store.discover_zones(&qname).await {
            Ok(zones) => zones,
            Err(error) => {
                error!(%error, "zone discovery failed");
                return send_error_response(
                    request,
                    ResponseCode::ServFail,
                    response_edns,
                    response_handle,
                )
                .await;
            }
        };

        let Some(zone_name) = match_zone(zones, &qname) else {
            debug!(%qname, "no zone matches");
            return self.forward(request, response_edns, response_handle).await;
        };

        let zone = match self.store.load_zone(&zone_name).await {
            Ok(Some(zone)) => zone,
            Ok(None) => {
                error!(zone = %zone_name, "matched zone has no owners");
                return send_error_response(
                    request,
                    ResponseCode::ServFail,
                    response_edns,
                    response_handle,
                )
                .await;
            }
            Err(error) => {
                error!(zone = %zone_name, %error, "zone load failed");
                return send_error_response(
                    request,
                    ResponseCode::ServFail,
                    response_edns,
                    response_handle,
                )
                .await;
            }
        };

        if qtype == RecordType::AXFR {
            return self
                .zone_transfer(request, &zone, response_edns, response_handle)
                .await;
        }

        debug!(%qname, %qtype, zone = %zone.origin(), "performing lookup");

        let Some(owner) = zone.locate(&qname) else {
            return send_error_response(
                request,
                ResponseCode::NXDomain,
                response_edns,
                response_handle,
            )
            .await;
        };

        let records = match self.store.fetch_records(zone.origin(), &owner).await {
            Ok(records) => records.unwrap_or_default(),
            Err(error @ BackendError::Decode(_)) => {
                error!(zone = %zone.origin(), %owner, %error, "stored records are malformed");
                return send_error_response(
                    request,
                    ResponseCode::ServFail,
                    response_edns,
                    response_handle,
                )
                .await;
            }
            Err(error) => {
                error!(zone = %zone.origin(), %owner, %error, "record fetch failed");
                return send_error_response(
                    request,
                    ResponseCode::ServFail,
                    response_edns,
                    response_handle,
                )
                .await;
            }
        };

        let Some(materialized) =
            materialize(qtype, &qname, zone.origin(), &records, self.store.default_ttl())
        else {
            return send_error_response(
                request,
                ResponseCode::NotImp,
                response_edns,
                response_handle,
            )
            .await;
        };

        let additionals = resolve_extras(&self.store, &zone, materialized.glue_hosts).await;
        let lookup = AuthLookup {
            answers: materialized.answers,
            additionals,
        };

        // an owner without records of the queried type is NoData, not an error
        let mut response = response_message(request);
        if let Some(edns) = response_edns {
            response.set_edns(edns);
        }
        response.add_answers(lookup.answers);
        response.add_additionals(lookup.additionals);

        send_response(response, response_handle).await
    }

    /// Streams a full zone transfer as a sequence of bounded envelopes.
    ///
    /// The producer assembles and frames the stream while this consumer
    /// delivers envelopes to the transport in order.
    async fn zone_transfer(
        &self,
        request: &Request,
        zone: &ZoneIndex,
        response_edns: Option<Edns>,
        response_handle: &mut dyn ResponseHandler,
    ) -> ResponseInfo {
        if request.protocol != Protocol::Tcp {
            warn!(src = %request.src, "refusing zone transfer over udp");
            return send_error_response(
                request,
                ResponseCode::Refused,
                response_edns,
                response_handle,
            )
            .await;
        }
        if self.axfr_access.allow(request.src.ip()).is_err() {
            warn!(src = %request.src, zone = %zone.origin(), "zone transfer not allowed");
            return send_error_response(
                request,
                ResponseCode::Refused,
                response_edns,
                response_handle,
            )
            .await;
        }

        info!(zone = %zone.origin(), src = %request.src, "starting zone transfer");

        let (envelope_tx, mut envelope_rx) = mpsc::channel::<Result<Vec<Record>, LookupError>>(16);
        let store = self.store.clone();
        let producer_zone = zone.clone();
        tokio::spawn(async move {
            match axfr::assemble(&store, &producer_zone).await {
                Ok(stream) => {
                    for envelope in axfr::partition(stream) {
                        if envelope_tx.send(Ok(envelope)).await.is_err() {
                            // consumer went away, stop producing
                            return;
                        }
                    }
                }
                Err(error) => {
                    let _ = envelope_tx.send(Err(error)).await;
                }
            }
        });

        let mut info = ResponseInfo::serve_failed();
        while let Some(envelope) = envelope_rx.recv().await {
            match envelope {
                Ok(records) => {
                    let mut response = response_message(request);
                    response.add_answers(records);
                    match response_handle.send_response(response).await {
                        Ok(sent) => info = sent,
                        Err(error) => {
                            error!(%error, "error sending transfer envelope");
                            return ResponseInfo::serve_failed();
                        }
                    }
                }
                Err(error) => {
                    error!(%error, "zone transfer failed");
                    return send_error_response(
                        request,
                        ResponseCode::ServFail,
                        response_edns,
                        response_handle,
                    )
                    .await;
                }
            }
        }

        info
    }

    /// Hands the query to the chained handler, or refuses it
    async fn forward(
        &self,
        request: &Request,
        response_edns: Option<Edns>,
        response_handle: &mut dyn ResponseHandler,
    ) -> ResponseInfo {
        match &self.next {
            Some(next) => next.handle_request(request, response_handle).await,
            None => {
                send_error_response(
                    request,
                    ResponseCode::Refused,
                    response_edns,
                    response_handle,
                )
                .await
            }
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for Catalog {
    async fn handle_request(
        &self,
        request: &Request,
        response_handle: &mut dyn ResponseHandler,
    ) -> ResponseInfo {
        trace!("request: {:?}", request.message);

        // mirror the client's EDNS, rejecting versions we do not speak
        let response_edns = if let Some(req_edns) = request.message.edns() {
            let mut resp_edns = Edns::new();
            resp_edns.set_max_payload(req_edns.max_payload().max(512));
            resp_edns.set_version(0);

            if req_edns.version() > 0 {
                warn!("request edns version greater than 0: {}", req_edns.version());
                return send_error_response(
                    request,
                    ResponseCode::BADVERS,
                    Some(resp_edns),
                    response_handle,
                )
                .await;
            }

            Some(resp_edns)
        } else {
            None
        };

        match request.message.message_type() {
            MessageType::Query => match request.message.op_code() {
                OpCode::Query => {
                    debug!("query received: {}", request.message.id());
                    self.lookup(request, response_edns, response_handle).await
                }
                op_code => {
                    warn!("unimplemented op_code: {op_code:?}");
                    send_error_response(
                        request,
                        ResponseCode::NotImp,
                        response_edns,
                        response_handle,
                    )
                    .await
                }
            },
            MessageType::Response => {
                warn!(
                    "got a response as a request from id: {}",
                    request.message.id()
                );
                send_error_response(
                    request,
                    ResponseCode::FormErr,
                    response_edns,
                    response_handle,
                )
                .await
            }
        }
    }
}

/// Selects the longest discovered zone that is an ancestor of the query
fn match_zone(zones: Vec<Name>, qname: &Name) -> Option<Name> {
    let qname = LowerName::new(qname);
    zones
        .into_iter()
        .filter(|zone| LowerName::new(zone).zone_of(&qname))
        .max_by_key(Name::num_labels)
}

/// Resolves the additional-section addresses for hosts referenced by an
/// answer. Hosts no local zone owns contribute nothing.
pub(crate) async fn resolve_extras(
    store: &RedisStore,
    zone: &ZoneIndex,
    hosts: Vec<String>,
) -> Vec<Record> {
    let mut extras = Vec::new();
    let mut seen = HashSet::new();
    for host in hosts {
        if !seen.insert(host.to_lowercase()) {
            continue;
        }
        match lookup_extras(store, zone, &host).await {
            Ok(mut records) => extras.append(&mut records),
            Err(error) => debug!(%host, %error, "no glue for referenced host"),
        }
    }
    extras
}

/// Finds the owner of `host` in the current zone or any other local zone
/// and materializes its addresses and aliases.
async fn lookup_extras(
    store: &RedisStore,
    zone: &ZoneIndex,
    host: &str,
) -> Result<Vec<Record>, LookupError> {
    let name = Name::from_ascii(host)?;

    if let Some(owner) = zone.locate(&name) {
        let Some(records) = store.fetch_records(zone.origin(), &owner).await? else {
            return Ok(Vec::new());
        };
        return Ok(fill_extras(&name, &records, store.default_ttl()));
    }

    let zones = store.discover_zones(&name).await?;
    let Some(zone_name) = match_zone(zones, &name) else {
        return Ok(Vec::new());
    };
    let Some(other) = store.load_zone(&zone_name).await? else {
        return Ok(Vec::new());
    };
    let Some(owner) = other.locate(&name) else {
        return Ok(Vec::new());
    };
    let Some(records) = store.fetch_records(other.origin(), &owner).await? else {
        return Ok(Vec::new());
    };
    Ok(fill_extras(&name, &records, store.default_ttl()))
}

fn fill_extras(name: &Name, records: &RecordSet, default_ttl: u32) -> Vec<Record> {
    let mut extras = a_records(name, records, default_ttl);
    extras.extend(aaaa_records(name, records, default_ttl));
    extras.extend(cname_records(name, records, default_ttl));
    extras
}

/// Starts an authoritative response mirroring the request's query
fn response_message(request: &Request) -> Message {
    let mut response = Message::new();
    response
        .set_id(request.message.id())
        .set_message_type(MessageType::Response)
        .set_op_code(OpCode::Query)
        .set_authoritative(true)
        .set_recursion_desired(request.message.recursion_desired())
        .set_recursion_available(false);
    if let Some(query) = request.message.queries().first() {
        response.add_query(query.clone());
    }
    response
}

async fn send_response(
    response: Message,
    response_handle: &mut dyn ResponseHandler,
) -> ResponseInfo {
    match response_handle.send_response(response).await {
        Ok(info) => info,
        Err(error) => {
            error!(%error, "error sending response");
            ResponseInfo::serve_failed()
        }
    }
}

/// Builds a response carrying only an error code and sends it
async fn send_error_response(
    request: &Request,
    response_code: ResponseCode,
    response_edns: Option<Edns>,
    response_handle: &mut dyn ResponseHandler,
) -> ResponseInfo {
    let mut response = response_message(request);
    response.set_response_code(response_code);
    if let Some(edns) = response_edns {
        response.set_edns(edns);
    }
    send_response(response, response_handle).await
}
