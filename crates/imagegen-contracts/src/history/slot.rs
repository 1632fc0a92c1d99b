use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;

/// One named location holding the serialized history.
pub trait StorageSlot {
    fn describe(&self) -> String;
    /// `Ok(None)` when nothing has been stored yet.
    fn read(&self) -> anyhow::Result<Option<String>>;
    fn write(&self, contents: &str) -> anyhow::Result<()>;
    fn remove(&self) -> anyhow::Result<()>;
}

/// JSON file on disk. Writes land in a sibling temp file and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|value| value.to_os_string())
            .unwrap_or_else(|| "history.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StorageSlot for FileSlot {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> anyhow::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("failed reading {}", self.path.display()))
            }
        }
    }

    fn write(&self, contents: &str) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed creating {}", parent.display()))?;
        }
        let staging = self.staging_path();
        std::fs::write(&staging, contents)
            .with_context(|| format!("failed writing {}", staging.display()))?;
        std::fs::rename(&staging, &self.path)
            .with_context(|| format!("failed replacing {}", self.path.display()))?;
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed removing {}", self.path.display()))
            }
        }
    }
}

/// In-process slot. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    contents: Arc<Mutex<Option<String>>>,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Arc::new(Mutex::new(Some(contents.into()))),
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Option<String>>> {
        self.contents
            .lock()
            .map_err(|_| anyhow::anyhow!("memory slot lock poisoned"))
    }
}

impl StorageSlot for MemorySlot {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    fn read(&self) -> anyhow::Result<Option<String>> {
        Ok(self.lock()?.clone())
    }

    fn write(&self, contents: &str) -> anyhow::Result<()> {
        *self.lock()? = Some(contents.to_string());
        Ok(())
    }

    fn remove(&self) -> anyhow::Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}
