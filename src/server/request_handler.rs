// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Request Handler for incoming requests

use std::net::SocketAddr;

use hickory_proto::op::{Header, Message, ResponseCode};

use crate::server::{Protocol, ResponseHandler};

/// An incoming request to the DNS catalog
pub struct Request {
    /// Message with the associated query data
    pub message: Message,
    /// Source address of the client
    pub src: SocketAddr,
    /// Protocol the request arrived over
    pub protocol: Protocol,
}

impl Request {
    /// Builds a new request from the inbound message, source address, and
    /// protocol.
    pub fn new(message: Message, src: SocketAddr, protocol: Protocol) -> Self {
        Self {
            message,
            src,
            protocol,
        }
    }
}

/// Information about the response sent for a request
#[derive(Clone, Copy)]
pub struct ResponseInfo(Header);

impl ResponseInfo {
    /// A stand-in for responses that could not be sent at all
    pub fn serve_failed() -> Self {
        let mut header = Header::new();
        header.set_response_code(ResponseCode::ServFail);
        header.into()
    }
}

impl From<Header> for ResponseInfo {
    fn from(header: Header) -> Self {
        Self(header)
    }
}

impl std::ops::Deref for ResponseInfo {
    type Target = Header;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Trait for handling incoming requests, and providing a message response
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Determines what needs to happen given the type of request.
    ///
    /// # Arguments
    ///
    /// * `request` - the requested action to perform.
    /// * `response_handle` - handle through which response messages are
    ///   sent; a zone transfer sends several.
    async fn handle_request(
        &self,
        request: &Request,
        response_handle: &mut dyn ResponseHandler,
    ) -> ResponseInfo;
}
