//! The `ObjectStore` trait: external storage for uploaded images.
//!
//! Uploading is handled elsewhere; the engagement subsystem only ever deletes
//! orphaned objects.

use std::future::Future;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectError {
  #[error("invalid object name: {0:?}")]
  InvalidName(String),

  #[error("object storage io error: {0}")]
  Io(#[from] std::io::Error),
}

pub trait ObjectStore: Send + Sync {
  /// Delete the object called `name`.
  ///
  /// Idempotent: deleting an object that does not exist succeeds.
  fn delete_object<'a>(
    &'a self,
    name: &'a str,
  ) -> impl Future<Output = Result<(), ObjectError>> + Send + 'a;
}
