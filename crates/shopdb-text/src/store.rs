use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use shopdb_core::error::{Error, Result};

use crate::index::IndexGeneration;

/// Persistence hook for built generations.
pub trait IndexStore: Send + Sync {
    fn save_index(&self, index: &IndexGeneration) -> Result<()>;
    /// `Ok(None)` when nothing has been saved yet.
    fn load_index(&self) -> Result<Option<IndexGeneration>>;
}

/// Mirrors the current generation to `<dir>/index.json`.
#[derive(Debug, Clone)]
pub struct JsonIndexStore {
    dir: PathBuf,
}

pub const SNAPSHOT_FILE: &str = "index.json";

impl JsonIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn path(&self) -> PathBuf { self.dir.join(SNAPSHOT_FILE) }

    pub fn dir(&self) -> &Path { &self.dir }
}

impl IndexStore for JsonIndexStore {
    /// Write to a temp file in the same directory, fsync, then rename over
    /// the previous snapshot.
    fn save_index(&self, index: &IndexGeneration) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, index)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        let path = self.path();
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        info!(path = %path.display(), generation = index.generation(), documents = index.len(), "index snapshot saved");
        Ok(())
    }

    fn load_index(&self) -> Result<Option<IndexGeneration>> {
        let path = self.path();
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no index snapshot");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let generation: IndexGeneration = serde_json::from_reader(BufReader::new(file))?;
        generation.verify()?;
        Ok(Some(generation))
    }
}
