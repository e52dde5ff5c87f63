// Copyright 2015-2023 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// https://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// https://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Source-address screening for zone transfers.

use std::net::IpAddr;

use ipnet::IpNet;

/// Type to evaluate access from a source address.
///
/// With no networks inserted every address is allowed; once any network is
/// present, only addresses inside one of them pass.
#[derive(Default)]
pub(crate) struct Access {
    allow: Vec<IpNet>,
}

impl Access {
    /// Insert a new network that is allowed access
    pub(crate) fn insert(&mut self, network: IpNet) {
        self.allow.push(network);
    }

    /// Evaluate the IP address against the allowed networks
    ///
    /// # Return
    ///
    /// Ok if access is granted, Err otherwise
    pub(crate) fn allow(&self, ip: IpAddr) -> Result<(), ()> {
        if self.allow.is_empty() {
            return Ok(());
        }
        self.allow
            .iter()
            .any(|network| network.contains(&ip))
            .then_some(())
            .ok_or(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none() {
        let access = Access::default();
        assert!(access.allow("192.168.1.1".parse().unwrap()).is_ok());
        assert!(access.allow("fd00::1".parse().unwrap()).is_ok());
    }

    #[test]
    fn test_v4() {
        let mut access = Access::default();
        access.insert("192.168.1.0/24".parse().unwrap());

        assert!(access.allow("192.168.1.1".parse().unwrap()).is_ok());
        assert!(access.allow("192.168.1.255".parse().unwrap()).is_ok());
        assert!(access.allow("192.168.2.1".parse().unwrap()).is_err());
        assert!(access.allow("192.168.0.0".parse().unwrap()).is_err());
    }

    #[test]
    fn test_v6() {
        let mut access = Access::default();
        access.insert("fd00::/120".parse().unwrap());

        assert!(access.allow("fd00::1".parse().unwrap()).is_ok());
        assert!(access.allow("fd00::00ff".parse().unwrap()).is_ok());
        assert!(access.allow("fd00::ffff".parse().unwrap()).is_err());
        assert!(access.allow("fd00::1:1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_mixed_families() {
        let mut access = Access::default();
        access.insert("10.0.0.0/8".parse().unwrap());

        // no v6 network inserted, so v6 sources are rejected
        assert!(access.allow("10.1.2.3".parse().unwrap()).is_ok());
        assert!(access.allow("fd00::1".parse().unwrap()).is_err());
    }
}
