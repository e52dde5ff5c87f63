// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The server transport: socket loops and the request/response seams the
//! catalog plugs into.

mod request_handler;
mod response_handler;
mod server_future;

use std::fmt;

pub use self::request_handler::{Request, RequestHandler, ResponseInfo};
pub use self::response_handler::{ResponseHandler, TcpResponseHandle, UdpResponseHandle};
pub use self::server_future::ServerFuture;

/// The transport a request arrived over
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// User Datagram Protocol, the common case
    Udp,
    /// Transmission Control Protocol, required for zone transfers
    Tcp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        };
        f.write_str(protocol)
    }
}
