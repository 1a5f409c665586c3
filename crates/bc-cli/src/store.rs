use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bc_core::{KvStore, StoredValue};

/// Settings file standing in for the userscript manager's storage. Every
/// `set` rewrites the whole file.
pub struct JsonFileStore {
    path: PathBuf,
    values: RefCell<BTreeMap<String, StoredValue>>,
}

impl JsonFileStore {
    /// Open `path`; a missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, String> {
        let values = match fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text)
                .map_err(|e| format!("Failed to parse '{}': {}", path.display(), e))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(format!("Failed to read '{}': {}", path.display(), e)),
        };
        Ok(Self {
            path: path.to_path_buf(),
            values: RefCell::new(values),
        })
    }

    fn save(&self) -> Result<(), String> {
        let text = serde_json::to_string_pretty(&*self.values.borrow())
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(&self.path, text).map_err(|e| format!("Failed to write '{}': {}", self.path.display(), e))
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: StoredValue) {
        self.values.borrow_mut().insert(key.to_string(), value);
        if let Err(e) = self.save() {
            log::error!("{e}");
        }
    }
}
