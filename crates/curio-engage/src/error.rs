//! Error type for `curio-engage`.

use curio_core::cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngageError {
  #[error("subject not found: {0}")]
  SubjectNotFound(i64),

  #[error("actor not found: {0}")]
  ActorNotFound(i64),

  #[error("cache error: {0}")]
  Cache(#[from] CacheError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngageError {
  /// Box a backend error. Used as `.map_err(EngageError::store)`.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = EngageError> = std::result::Result<T, E>;
