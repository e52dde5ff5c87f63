// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use hickory_proto::op::{Header, Message, ResponseCode};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::server::ResponseInfo;

/// Datagram limit for clients that did not negotiate a larger one with EDNS
const MAX_RECEIVE_BUFFER_SIZE: usize = 512;

/// A handler for sending response messages back to a client.
///
/// Ordinary lookups send exactly one message; zone transfers send a
/// sequence, which is why the handle is borrowed mutably rather than
/// consumed.
#[async_trait::async_trait]
pub trait ResponseHandler: Send {
    /// Serializes and sends a message to the wrapped transport
    async fn send_response(&mut self, response: Message) -> io::Result<ResponseInfo>;
}

/// Sends responses as UDP datagrams, truncating to the negotiated payload
/// size.
pub struct UdpResponseHandle {
    dst: SocketAddr,
    socket: Arc<UdpSocket>,
}

impl UdpResponseHandle {
    /// Returns a handle answering `dst` over `socket`
    pub fn new(dst: SocketAddr, socket: Arc<UdpSocket>) -> Self {
        Self { dst, socket }
    }

    /// Maximum serialized size the client is willing to receive
    fn max_size_for_response(&self, response: &Message) -> u16 {
        if let Some(edns) = response.edns() {
            edns.max_payload()
        } else {
            // no EDNS, fall back to the classic datagram limit
            MAX_RECEIVE_BUFFER_SIZE as u16
        }
    }
}

#[async_trait::async_trait]
impl ResponseHandler for UdpResponseHandle {
    async fn send_response(&mut self, mut response: Message) -> io::Result<ResponseInfo> {
        let id = response.id();
        debug!(
            id,
            response_code = %response.response_code(),
            "sending response",
        );

        let max_size = self.max_size_for_response(&response);
        trace!("setting response max size: {max_size}");

        let mut buffer = encode_with_max(&response, max_size);
        if buffer.is_none() {
            // too big for the client's buffer: truncate down to the header,
            // question, and EDNS and let the client retry over TCP
            response.set_truncated(true);
            response.take_answers();
            response.take_name_servers();
            response.take_additionals();
            buffer = encode_with_max(&response, max_size);
        }

        let buffer = match buffer {
            Some(buffer) => buffer,
            None => encode_fallback_servfail_response(id)?,
        };

        self.socket.send_to(&buffer, self.dst).await?;
        Ok(ResponseInfo::from(*response.header()))
    }
}

/// Sends length-prefixed responses on an accepted TCP stream
pub struct TcpResponseHandle {
    stream: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpResponseHandle {
    /// Returns a handle writing to the given stream half
    pub fn new(stream: Arc<Mutex<OwnedWriteHalf>>) -> Self {
        Self { stream }
    }
}

#[async_trait::async_trait]
impl ResponseHandler for TcpResponseHandle {
    async fn send_response(&mut self, response: Message) -> io::Result<ResponseInfo> {
        let id = response.id();
        debug!(
            id,
            response_code = %response.response_code(),
            "sending response",
        );

        let buffer = response
            .to_vec()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if buffer.len() > u16::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "response too large for a dns message",
            ));
        }

        let mut stream = self.stream.lock().await;
        stream.write_all(&(buffer.len() as u16).to_be_bytes()).await?;
        stream.write_all(&buffer).await?;
        stream.flush().await?;

        Ok(ResponseInfo::from(*response.header()))
    }
}

fn encode_with_max(response: &Message, max_size: u16) -> Option<Vec<u8>> {
    let mut buffer = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buffer);
    encoder.set_max_size(max_size);
    match response.emit(&mut encoder) {
        Ok(()) => Some(buffer),
        Err(error) => {
            debug!(%error, "response did not fit in {max_size} bytes");
            None
        }
    }
}

/// Encodes a bare SERVFAIL header as the response of last resort
fn encode_fallback_servfail_response(id: u16) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(12);
    let mut encoder = BinEncoder::new(&mut buffer);
    let mut header = Header::new();
    header.set_id(id);
    header.set_response_code(ResponseCode::ServFail);
    header
        .emit(&mut encoder)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    error!(id, "could not encode response, sent servfail");
    Ok(buffer)
}
