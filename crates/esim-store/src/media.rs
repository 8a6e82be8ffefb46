//! Filesystem blob store for uploaded SPICE files.
//!
//! Records only keep the name returned by [`MediaStorage::save`]; the bytes
//! live directly under the media root. Names are sanitised to a plain
//! basename, and a taken name gets a short random suffix before its
//! extension (`rc.cir` -> `rc_3f9a2c1.cir`). Files are opened with
//! create-new semantics, so two concurrent uploads of the same name never
//! clobber each other.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;

const SUFFIX_LEN: usize = 7;
const MAX_NAME_ATTEMPTS: usize = 100;

/// Blob store rooted at a media directory.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under a free name derived from `name`.
    ///
    /// Returns the stored name, relative to the media root.
    pub async fn save(&self, name: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let valid = valid_name(name).ok_or_else(|| StoreError::InvalidFileName(name.to_owned()))?;
        fs::create_dir_all(&self.root).await?;

        let mut candidate = valid.clone();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.root.join(&candidate);
            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    if let Err(e) = write_all(&mut file, bytes).await {
                        drop(file);
                        if let Err(cleanup) = fs::remove_file(&path).await {
                            warn!(name = %candidate, error = %cleanup, "failed to remove partial upload");
                        }
                        return Err(e.into());
                    }
                    debug!(name = %candidate, bytes = bytes.len(), "stored media file");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_suffix(&valid);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for {valid:?} after {MAX_NAME_ATTEMPTS} attempts"),
        )
        .into())
    }

    /// Read a stored file.
    pub async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        Ok(fs::read(self.path(name)?).await?)
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(fs::try_exists(self.path(name)?).await?)
    }

    /// Remove a stored file. Removing a name that is already gone succeeds.
    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path(name)?).await {
            Ok(()) => {
                debug!(name, "removed media file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Absolute location of a stored name. Rejects names that would leave
    /// the media root.
    pub fn path(&self, name: &str) -> Result<PathBuf, StoreError> {
        match valid_name(name) {
            Some(valid) if valid == name => Ok(self.root.join(name)),
            _ => Err(StoreError::InvalidFileName(name.to_owned())),
        }
    }
}

async fn write_all(file: &mut fs::File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_all().await
}

/// Reduce an uploaded name to a safe basename: whitespace becomes `_` and
/// anything outside `[A-Za-z0-9._-]` is dropped.
fn valid_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some('_'),
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') => Some(c),
            _ => None,
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        None
    } else {
        Some(cleaned)
    }
}

fn with_suffix(name: &str) -> String {
    let random = Uuid::new_v4().simple().to_string();
    let suffix = &random[..SUFFIX_LEN];
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{name}_{suffix}"),
    }
}
