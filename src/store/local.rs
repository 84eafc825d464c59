use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A JSON file holding one value of `T`.
///
/// Saves go through a sibling temp file and a rename so a crash never
/// leaves a half-written file behind.
pub struct LocalJson<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> LocalJson<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when the file does not exist yet.
    pub fn load(&self) -> Result<Option<T>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serde_json::to_string_pretty(value)?)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}
