//! [`FsObjectStore`]: object storage on a local directory.
//!
//! Images live as flat files named after their object name; no image bytes
//! are ever stored in the database.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use curio_core::objects::{ObjectError, ObjectStore};

#[derive(Debug, Clone)]
pub struct FsObjectStore {
  root: PathBuf,
}

impl FsObjectStore {
  pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve `name` inside the root, rejecting anything that could escape it.
  fn path_of(&self, name: &str) -> Result<PathBuf, ObjectError> {
    let valid = !name.is_empty()
      && name != "."
      && name != ".."
      && !name.contains(['/', '\\', '\0']);
    if !valid {
      return Err(ObjectError::InvalidName(name.to_owned()));
    }
    Ok(self.root.join(name))
  }
}

impl ObjectStore for FsObjectStore {
  async fn delete_object(&self, name: &str) -> Result<(), ObjectError> {
    let path = self.path_of(name)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => {
        tracing::debug!(object = name, "object deleted");
        Ok(())
      }
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }
}
