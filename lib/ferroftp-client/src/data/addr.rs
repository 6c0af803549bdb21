/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

/// The `h1,h2,h3,h4,p1,p2` address used by PASV replies and PORT commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtpHostPort(SocketAddrV4);

impl FtpHostPort {
    pub fn new(ip: Ipv4Addr, port: u16) -> Self {
        FtpHostPort(SocketAddrV4::new(ip, port))
    }

    /// Only IPv4 (or IPv4 mapped IPv6) addresses can be represented.
    pub fn from_socket_addr(addr: SocketAddr) -> Option<Self> {
        match addr.ip() {
            IpAddr::V4(ip) => Some(FtpHostPort::new(ip, addr.port())),
            IpAddr::V6(ip) => ip
                .to_ipv4_mapped()
                .map(|ip| FtpHostPort::new(ip, addr.port())),
        }
    }

    #[inline]
    pub fn ip(&self) -> Ipv4Addr {
        *self.0.ip()
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    #[inline]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(self.0)
    }

    /// Find the address inside a 227 reply text.
    ///
    /// The address is usually enclosed in parentheses, but some servers omit
    /// them, so fall back to the first run of digits and commas.
    pub fn parse_pasv_reply(line: &str) -> Option<Self> {
        if let Some(p_start) = memchr::memchr(b'(', line.as_bytes())
            && let Some(p_end) = memchr::memchr(b')', &line.as_bytes()[p_start..])
        {
            let p_end = p_end + p_start;
            return FtpHostPort::from_str(&line[p_start + 1..p_end]).ok();
        }

        let start = line.find(|c: char| c.is_ascii_digit())?;
        let s = &line[start..];
        let end = s
            .find(|c: char| !(c.is_ascii_digit() || c == ','))
            .unwrap_or(s.len());
        FtpHostPort::from_str(&s[..end]).ok()
    }
}

impl FromStr for FtpHostPort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let a: Vec<&str> = s.split(',').map(|v| v.trim()).collect();
        if a.len() != 6 {
            return Err(());
        }

        let mut octets = [0u8; 6];
        for (o, v) in octets.iter_mut().zip(a) {
            *o = u8::from_str(v).map_err(|_| ())?;
        }

        let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
        let port = ((octets[4] as u16) << 8) + (octets[5] as u16);
        Ok(FtpHostPort::new(ip, port))
    }
}

impl fmt::Display for FtpHostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [h1, h2, h3, h4] = self.ip().octets();
        let port = self.port();
        write!(f, "{h1},{h2},{h3},{h4},{},{}", port >> 8, port & 0xFF)
    }
}
