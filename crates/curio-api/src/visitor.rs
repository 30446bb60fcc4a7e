//! Request metadata used to fingerprint a visitor.

use std::{
  convert::Infallible,
  net::{IpAddr, SocketAddr},
};

use axum::{
  extract::{ConnectInfo, FromRequestParts},
  http::{HeaderMap, request::Parts},
};
use curio_engage::fingerprint::{Fingerprint, FingerprintResolver};

/// Headers and peer address of the current request.
///
/// The peer is only known when the server was started with
/// `into_make_service_with_connect_info::<SocketAddr>()`; otherwise only
/// headers are consulted.
#[derive(Debug, Clone)]
pub struct VisitorOrigin {
  pub headers: HeaderMap,
  pub peer:    Option<IpAddr>,
}

impl VisitorOrigin {
  pub fn fingerprint(&self, resolver: &FingerprintResolver) -> Option<Fingerprint> {
    resolver.resolve(
      |name| {
        self
          .headers
          .get(name)
          .and_then(|v| v.to_str().ok())
          .map(str::to_owned)
      },
      self.peer,
    )
  }
}

impl<S: Send + Sync> FromRequestParts<S> for VisitorOrigin {
  type Rejection = Infallible;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let peer = parts
      .extensions
      .get::<ConnectInfo<SocketAddr>>()
      .map(|ConnectInfo(addr)| addr.ip());
    Ok(Self { headers: parts.headers.clone(), peer })
  }
}
