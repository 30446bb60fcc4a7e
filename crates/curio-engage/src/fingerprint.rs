//! Visitor fingerprints for view and click deduplication.
//!
//! A fingerprint is derived from the first usable address in an ordered list
//! of sources: proxy headers first, then the peer address of the
//! connection. It is hashed before it reaches the cache so dedup keys never
//! contain raw client addresses. When no source yields an address the
//! visitor is unknown and the event is not counted.

use std::{
  fmt,
  net::{IpAddr, SocketAddr, UdpSocket},
};

use sha2::{Digest, Sha256};

/// Headers consulted by default, in order. The first non-empty value that is
/// not the literal `unknown` wins.
pub const DEFAULT_HEADERS: &[&str] = &[
  "x-forwarded-for",
  "proxy-client-ip",
  "wl-proxy-client-ip",
  "http-client-ip",
  "http-x-forwarded-for",
  "x-real-ip",
];

/// Where a candidate visitor address comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FingerprintSource {
  /// A request header, matched case-insensitively. Comma-separated chains
  /// (as in `X-Forwarded-For`) contribute their first entry.
  Header(String),
  /// The address of the directly connected peer.
  PeerAddress,
}

/// An opaque, hashed visitor identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
  /// Hash a raw address (or address alias) into a fingerprint.
  pub fn from_raw(raw: &str) -> Self {
    Self(hex::encode(Sha256::digest(raw.as_bytes())))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Resolves a [`Fingerprint`] from request metadata.
#[derive(Debug, Clone)]
pub struct FingerprintResolver {
  sources:        Vec<FingerprintSource>,
  /// Identity substituted for loopback addresses, so local traffic from
  /// different processes does not collapse onto `127.0.0.1`.
  loopback_alias: Option<String>,
}

impl Default for FingerprintResolver {
  fn default() -> Self {
    Self::from_headers(DEFAULT_HEADERS.iter().copied())
  }
}

impl FingerprintResolver {
  pub fn new(sources: Vec<FingerprintSource>) -> Self {
    Self { sources, loopback_alias: None }
  }

  /// Consult `headers` in order, then the peer address.
  pub fn from_headers<'h>(headers: impl IntoIterator<Item = &'h str>) -> Self {
    let mut sources: Vec<_> = headers
      .into_iter()
      .map(|h| FingerprintSource::Header(h.to_ascii_lowercase()))
      .collect();
    sources.push(FingerprintSource::PeerAddress);
    Self::new(sources)
  }

  pub fn with_loopback_alias(mut self, alias: Option<String>) -> Self {
    self.loopback_alias = alias;
    self
  }

  pub fn sources(&self) -> &[FingerprintSource] { &self.sources }

  /// Resolve the visitor address. `header` looks up a request header by
  /// lowercase name. Returns `None` when the visitor is unknown.
  pub fn resolve_address<F>(&self, header: F, peer: Option<IpAddr>) -> Option<String>
  where
    F: Fn(&str) -> Option<String>,
  {
    let raw = self.sources.iter().find_map(|source| match source {
      FingerprintSource::Header(name) => header(name).and_then(first_usable),
      FingerprintSource::PeerAddress => peer.map(|ip| ip.to_string()),
    })?;

    match parse_ip(&raw) {
      Some(ip) if ip.is_loopback() => {
        Some(self.loopback_alias.clone().unwrap_or_else(|| ip.to_string()))
      }
      Some(ip) => Some(ip.to_string()),
      None => Some(raw),
    }
  }

  /// Resolve and hash the visitor identity.
  pub fn resolve<F>(&self, header: F, peer: Option<IpAddr>) -> Option<Fingerprint>
  where
    F: Fn(&str) -> Option<String>,
  {
    self
      .resolve_address(header, peer)
      .map(|address| Fingerprint::from_raw(&address))
  }
}

/// First entry of a possibly comma-separated header value, if usable.
fn first_usable(value: String) -> Option<String> {
  let first = value.split(',').next()?.trim();
  if first.is_empty() || first.eq_ignore_ascii_case("unknown") {
    None
  } else {
    Some(first.to_owned())
  }
}

/// Accept bare addresses as well as `ip:port` and `[v6]:port` forms.
fn parse_ip(raw: &str) -> Option<IpAddr> {
  raw
    .parse::<IpAddr>()
    .ok()
    .or_else(|| raw.parse::<SocketAddr>().ok().map(|sa| sa.ip()))
}

/// Resolve this host's `hostname/address` pair, used as the loopback alias.
///
/// The address is the one the OS would route outbound traffic from; binding
/// and connecting a UDP socket sends no packets.
pub fn local_identity() -> Option<String> {
  let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
  socket.connect("192.0.2.1:9").ok()?;
  let address = socket.local_addr().ok()?.ip();
  let host = hostname::get().ok()?.into_string().ok()?;
  Some(format!("{host}/{address}"))
}

#[cfg(test)]
mod tests {
  use std::{collections::HashMap, net::Ipv4Addr};

  use super::*;

  fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |name| map.get(name).cloned()
  }

  fn peer(a: u8, b: u8, c: u8, d: u8) -> Option<IpAddr> {
    Some(IpAddr::V4(Ipv4Addr::new(a, b, c, d)))
  }

  #[test]
  fn forwarded_chain_uses_first_hop() {
    let r = FingerprintResolver::default();
    let addr = r.resolve_address(
      lookup(&[("x-forwarded-for", "1.2.3.4, 10.0.0.1, 10.0.0.2")]),
      peer(10, 0, 0, 2),
    );
    assert_eq!(addr.as_deref(), Some("1.2.3.4"));
  }

  #[test]
  fn unknown_header_values_fall_through() {
    let r = FingerprintResolver::default();
    let addr = r.resolve_address(
      lookup(&[("x-forwarded-for", "unknown"), ("x-real-ip", "5.6.7.8")]),
      peer(10, 0, 0, 2),
    );
    assert_eq!(addr.as_deref(), Some("5.6.7.8"));
  }

  #[test]
  fn peer_address_is_the_last_resort() {
    let r = FingerprintResolver::default();
    assert_eq!(
      r.resolve_address(lookup(&[]), peer(9, 9, 9, 9)).as_deref(),
      Some("9.9.9.9")
    );
  }

  #[test]
  fn no_source_means_unknown_visitor() {
    let r = FingerprintResolver::default();
    assert!(r.resolve(lookup(&[("x-forwarded-for", " ")]), None).is_none());
  }

  #[test]
  fn loopback_is_remapped_when_alias_is_set() {
    let r = FingerprintResolver::default().with_loopback_alias(Some("box/192.168.1.5".into()));
    assert_eq!(
      r.resolve_address(lookup(&[]), peer(127, 0, 0, 1)).as_deref(),
      Some("box/192.168.1.5")
    );
    assert_eq!(
      r.resolve_address(lookup(&[("x-real-ip", "[::1]:8080")]), None).as_deref(),
      Some("box/192.168.1.5")
    );
  }

  #[test]
  fn ports_are_stripped() {
    let r = FingerprintResolver::default();
    assert_eq!(
      r.resolve_address(lookup(&[("x-real-ip", "1.2.3.4:5555")]), None).as_deref(),
      Some("1.2.3.4")
    );
  }

  #[test]
  fn custom_source_order_is_respected() {
    let r = FingerprintResolver::new(vec![
      FingerprintSource::PeerAddress,
      FingerprintSource::Header("x-forwarded-for".into()),
    ]);
    assert_eq!(
      r.resolve_address(lookup(&[("x-forwarded-for", "1.1.1.1")]), peer(2, 2, 2, 2))
        .as_deref(),
      Some("2.2.2.2")
    );
  }

  #[test]
  fn fingerprints_are_hashed_and_stable() {
    let a = Fingerprint::from_raw("1.2.3.4");
    assert_eq!(a, Fingerprint::from_raw("1.2.3.4"));
    assert_ne!(a, Fingerprint::from_raw("1.2.3.5"));
    assert_eq!(a.as_str().len(), 64);
    assert!(!a.as_str().contains("1.2.3.4"));
  }

  #[test]
  fn local_identity_names_the_os_hostname() {
    let Some(identity) = local_identity() else { return };
    let host = hostname::get().unwrap().into_string().unwrap();
    let (name, address) = identity.split_once('/').unwrap();
    assert_eq!(name, host);
    assert!(address.parse::<IpAddr>().is_ok());
  }
}
