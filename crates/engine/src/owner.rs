//! File ownership helpers for [`Engine::chown`](crate::Engine::chown)
//! implementations.

use crate::error::{ErrorKind, Result};
use std::os::unix::fs::{MetadataExt, chown};
use std::path::Path;
use tokio::fs;

/// The uid/gid pair the engine runs as.
///
/// Engines usually resolve this once, from the owner of their data path, and
/// reuse it for every [`chown`](crate::Engine::chown) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}
impl Ownership {
    /// Ownership of an existing path.
    pub async fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path).await.map_err(|e| ErrorKind::from_io(e, path))?;
        Ok(Self { uid: metadata.uid(), gid: metadata.gid() })
    }

    /// Hand `path` over to this owner. Does not recurse.
    pub fn apply(&self, path: &Path) -> Result<()> {
        Ok(chown(path, Some(self.uid), Some(self.gid)).map_err(|e| ErrorKind::from_io(e, path))?)
    }
}
