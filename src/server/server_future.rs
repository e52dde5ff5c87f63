// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future;
use hickory_proto::error::ProtoError;
use hickory_proto::op::Message;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::server::{
    Protocol, Request, RequestHandler, ResponseHandler, TcpResponseHandle, UdpResponseHandle,
};

/// Largest datagram accepted from the wire
const MAX_MESSAGE_LEN: usize = 4096;

/// A future-based DNS server bound to any number of UDP sockets and TCP
/// listeners, dispatching every decoded message into one [`RequestHandler`].
pub struct ServerFuture<T: RequestHandler> {
    handler: Arc<T>,
    joins: Vec<JoinHandle<Result<(), ProtoError>>>,
}

impl<T: RequestHandler> ServerFuture<T> {
    /// Creates a new server with the specified handler
    pub fn new(handler: T) -> Self {
        Self {
            handler: Arc::new(handler),
            joins: Vec::new(),
        }
    }

    /// Register a UDP socket. Should be bound before calling this function.
    pub fn register_socket(&mut self, socket: UdpSocket) {
        debug!("registering udp: {:?}", socket);

        let socket = Arc::new(socket);
        let handler = self.handler.clone();

        let join = tokio::spawn(async move {
            let mut buffer = [0u8; MAX_MESSAGE_LEN];
            loop {
                let (length, src) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(error) => {
                        warn!(%error, "error receiving message on udp socket");
                        continue;
                    }
                };
                debug!("received udp request from: {src}");

                let bytes = buffer[..length].to_vec();
                let handler = handler.clone();
                let socket = socket.clone();

                tokio::spawn(async move {
                    let mut response_handle = UdpResponseHandle::new(src, socket);
                    handle_raw_request(&bytes, src, Protocol::Udp, handler, &mut response_handle)
                        .await;
                });
            }
        });

        self.joins.push(join);
    }

    /// Register a TCP listener. Should already be bound before calling this
    /// function.
    ///
    /// `timeout` limits how long an open connection may sit idle between
    /// requests before it is closed.
    pub fn register_listener(&mut self, listener: TcpListener, timeout: Duration) {
        debug!("registering tcp: {:?}", listener);

        let handler = self.handler.clone();

        let join = tokio::spawn(async move {
            loop {
                let (stream, src) = match listener.accept().await {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        debug!(%error, "error accepting tcp connection");
                        continue;
                    }
                };
                debug!("accepted request from: {src}");

                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(error) = handle_tcp_stream(stream, src, handler, timeout).await {
                        debug!(%src, %error, "closing tcp connection");
                    }
                });
            }
        });

        self.joins.push(join);
    }

    /// Runs until any of the registered listeners stops
    pub async fn block_until_done(self) -> Result<(), ProtoError> {
        if self.joins.is_empty() {
            return Err(ProtoError::from("no listeners registered"));
        }
        let (result, _, _) = future::select_all(self.joins).await;
        result.map_err(|e| ProtoError::from(format!("internal error in spawn: {e}")))?
    }
}

/// Reads length-prefixed requests off one accepted connection until it goes
/// idle or closes. Requests are served in order to keep a single client from
/// monopolizing the executor.
async fn handle_tcp_stream<T: RequestHandler>(
    stream: tokio::net::TcpStream,
    src: SocketAddr,
    handler: Arc<T>,
    timeout: Duration,
) -> io::Result<()> {
    let (mut read_half, write_half) = stream.into_split();
    let write_half = Arc::new(Mutex::new(write_half));

    loop {
        let mut length_bytes = [0u8; 2];
        match read_with_timeout(&mut read_half, &mut length_bytes, timeout).await {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(error) => return Err(error),
        }

        let length = u16::from_be_bytes(length_bytes) as usize;
        let mut bytes = vec![0u8; length];
        read_with_timeout(&mut read_half, &mut bytes, timeout).await?;

        let mut response_handle = TcpResponseHandle::new(write_half.clone());
        handle_raw_request(&bytes, src, Protocol::Tcp, handler.clone(), &mut response_handle)
            .await;
    }
}

async fn read_with_timeout(
    read_half: &mut tokio::net::tcp::OwnedReadHalf,
    buffer: &mut [u8],
    timeout: Duration,
) -> io::Result<()> {
    let read = read_half.read_exact(buffer);
    if timeout > Duration::ZERO {
        match tokio::time::timeout(timeout, read).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("nothing ready in {timeout:?}"),
            )),
        }
    } else {
        read.await.map(|_| ())
    }
}

async fn handle_raw_request<T: RequestHandler>(
    bytes: &[u8],
    src: SocketAddr,
    protocol: Protocol,
    handler: Arc<T>,
    response_handle: &mut dyn ResponseHandler,
) {
    let message = match Message::from_vec(bytes) {
        Ok(message) => message,
        Err(error) => {
            warn!(%src, %error, "failed to decode message");
            return;
        }
    };

    info!(
        "request: {} type: {:?} op_code: {:?} {protocol} qname: {}",
        message.id(),
        message.message_type(),
        message.op_code(),
        message
            .queries()
            .first()
            .map(|q| q.name().to_string())
            .unwrap_or_else(|| "empty_queries".to_string()),
    );

    let request = Request::new(message, src, protocol);
    handler.handle_request(&request, response_handle).await;
}
