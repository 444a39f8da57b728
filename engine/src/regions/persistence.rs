use std::{
    collections::BTreeSet,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use ahash::AHashMap;
use ron::ser::PrettyConfig;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

const REGIONS_DIRECTORY: &str = "regions";
const REGION_EXTENSION: &str = "region";
const WORLD_INDEX_FILE: &str = "world.ron";

/// World-level record of every region that has ever been saved
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorldIndex {
    pub saved_regions: BTreeSet<String>,
}

/// Where region blobs live. Regions are addressed by their "x,y,z" name.
pub trait RegionPersistence: Send + Sync {
    fn region_exists(&self, name: &str) -> bool;
    fn load_region(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError>;
    fn save_region(&self, name: &str, data: &[u8]) -> Result<(), PersistenceError>;
    fn load_world_index(&self) -> Result<Option<WorldIndex>, PersistenceError>;
    fn save_world_index(&self, index: &WorldIndex) -> Result<(), PersistenceError>;
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PersistenceError + '_ {
    move |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Writes to a sibling temp file first so a crash never leaves a half-written blob
fn write_replacing(path: &Path, data: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data).map_err(io_error(&temp_path))?;
    fs::rename(&temp_path, path).map_err(io_error(path))
}

fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>, PersistenceError> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(path)(err)),
    }
}

/// One file per region under `<root>/regions/`, plus `<root>/world.ron`
pub struct DirectoryPersistence {
    root: PathBuf,
}

impl DirectoryPersistence {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryPersistence { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn region_path(&self, name: &str) -> PathBuf {
        self.root
            .join(REGIONS_DIRECTORY)
            .join(format!("{}.{}", name, REGION_EXTENSION))
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(WORLD_INDEX_FILE)
    }
}

impl RegionPersistence for DirectoryPersistence {
    fn region_exists(&self, name: &str) -> bool {
        self.region_path(name).is_file()
    }

    fn load_region(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        read_if_exists(&self.region_path(name))
    }

    fn save_region(&self, name: &str, data: &[u8]) -> Result<(), PersistenceError> {
        write_replacing(&self.region_path(name), data)
    }

    fn load_world_index(&self) -> Result<Option<WorldIndex>, PersistenceError> {
        let path = self.index_path();
        let Some(data) = read_if_exists(&path)? else {
            return Ok(None);
        };

        let text = String::from_utf8_lossy(&data);
        Ok(Some(ron::from_str(&text)?))
    }

    fn save_world_index(&self, index: &WorldIndex) -> Result<(), PersistenceError> {
        let serialized = ron::ser::to_string_pretty(index, PrettyConfig::default())?;
        write_replacing(&self.index_path(), serialized.as_bytes())
    }
}

#[derive(Default)]
struct MemoryStorage {
    regions: AHashMap<String, Vec<u8>>,
    index: Option<WorldIndex>,
}

/// In-memory persistence. Clones share the same storage, so a world can be
/// saved by one streamer and reopened by another.
#[derive(Clone, Default)]
pub struct MemoryPersistence {
    storage: Arc<Mutex<MemoryStorage>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn region_count(&self) -> usize {
        self.storage.lock().unwrap().regions.len()
    }

    /// Replaces a stored blob without touching the index
    pub fn overwrite_region(&self, name: &str, data: Vec<u8>) {
        self.storage
            .lock()
            .unwrap()
            .regions
            .insert(name.to_string(), data);
    }
}

impl RegionPersistence for MemoryPersistence {
    fn region_exists(&self, name: &str) -> bool {
        self.storage.lock().unwrap().regions.contains_key(name)
    }

    fn load_region(&self, name: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.storage.lock().unwrap().regions.get(name).cloned())
    }

    fn save_region(&self, name: &str, data: &[u8]) -> Result<(), PersistenceError> {
        self.overwrite_region(name, data.to_vec());
        Ok(())
    }

    fn load_world_index(&self) -> Result<Option<WorldIndex>, PersistenceError> {
        Ok(self.storage.lock().unwrap().index.clone())
    }

    fn save_world_index(&self, index: &WorldIndex) -> Result<(), PersistenceError> {
        self.storage.lock().unwrap().index = Some(index.clone());
        Ok(())
    }
}
