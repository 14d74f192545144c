//! TOML-backed title registry.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::RegistryError;
use super::lock::RegistryLock;
use super::types::TitleEntry;

/// A stored table that failed to parse, kept verbatim for the next save.
#[derive(Debug, Clone)]
struct InvalidEntry {
    raw: toml::Value,
    reason: String,
}

/// Collection of tracked titles keyed by codename.
///
/// Persisted as one TOML table per codename. Saves are atomic (temp file,
/// fsync, rename) and require the [`RegistryLock`].
#[derive(Debug, Clone)]
pub struct TitleRegistry {
    path: PathBuf,
    entries: BTreeMap<String, TitleEntry>,
    invalid: BTreeMap<String, InvalidEntry>,
}

impl TitleRegistry {
    /// Creates an empty registry bound to `path` without touching disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            invalid: BTreeMap::new(),
        }
    }

    /// Loads the registry. A missing file is an empty registry.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        if !path.exists() {
            debug!(path = %path.display(), "Registry file missing, starting empty");
            return Ok(Self::new(path));
        }

        let text = fs::read_to_string(&path).map_err(|e| RegistryError::io(&path, e))?;
        let mut registry = Self::from_toml_str(&text).map_err(|reason| RegistryError::Parse {
            path: path.clone(),
            reason,
        })?;
        registry.path = path;

        info!(
            path = %registry.path.display(),
            titles = registry.entries.len(),
            malformed = registry.invalid.len(),
            "Registry loaded"
        );
        Ok(registry)
    }

    fn from_toml_str(text: &str) -> Result<Self, String> {
        let table: toml::Table = text.parse().map_err(|e: toml::de::Error| e.to_string())?;
        let mut registry = Self::new(PathBuf::new());

        for (codename, raw) in table {
            let parsed = raw
                .clone()
                .try_into::<TitleEntry>()
                .map_err(|e| e.to_string())
                .and_then(|entry| entry.validate().map(|()| entry));

            match parsed {
                Ok(entry) => {
                    registry.entries.insert(codename, entry);
                }
                Err(reason) => {
                    warn!(codename = %codename, reason = %reason, "Keeping malformed registry entry");
                    registry
                        .invalid
                        .insert(codename, InvalidEntry { raw, reason });
                }
            }
        }

        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a title. Malformed stored entries surface as [`RegistryError::InvalidEntry`].
    pub fn get(&self, codename: &str) -> Result<&TitleEntry, RegistryError> {
        if let Some(entry) = self.entries.get(codename) {
            return Ok(entry);
        }
        match self.invalid.get(codename) {
            Some(invalid) => Err(RegistryError::InvalidEntry {
                codename: codename.to_string(),
                reason: invalid.reason.clone(),
            }),
            None => Err(RegistryError::NotFound(codename.to_string())),
        }
    }

    /// True when the codename is taken, even by a malformed entry.
    pub fn contains(&self, codename: &str) -> bool {
        self.entries.contains_key(codename) || self.invalid.contains_key(codename)
    }

    /// Adds a new title. Codenames are unique.
    pub fn insert(&mut self, codename: &str, entry: TitleEntry) -> Result<(), RegistryError> {
        if self.contains(codename) {
            return Err(RegistryError::Duplicate(codename.to_string()));
        }
        entry
            .validate()
            .map_err(|reason| RegistryError::InvalidEntry {
                codename: codename.to_string(),
                reason,
            })?;
        self.entries.insert(codename.to_string(), entry);
        Ok(())
    }

    /// Replaces an existing, well-formed title.
    pub fn update(&mut self, codename: &str, entry: TitleEntry) -> Result<(), RegistryError> {
        self.get(codename)?;
        entry
            .validate()
            .map_err(|reason| RegistryError::InvalidEntry {
                codename: codename.to_string(),
                reason,
            })?;
        self.entries.insert(codename.to_string(), entry);
        Ok(())
    }

    /// All codenames in registry order, malformed ones included.
    pub fn codenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .keys()
            .chain(self.invalid.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Well-formed titles in codename order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &TitleEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.invalid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Renders the registry, malformed entries included verbatim.
    pub fn to_toml_string(&self) -> Result<String, RegistryError> {
        let mut table = toml::Table::new();

        for (codename, entry) in &self.entries {
            let value = toml::Value::try_from(entry).map_err(|e| RegistryError::Serialize {
                codename: codename.clone(),
                reason: e.to_string(),
            })?;
            table.insert(codename.clone(), value);
        }
        for (codename, invalid) in &self.invalid {
            table.insert(codename.clone(), invalid.raw.clone());
        }

        toml::to_string_pretty(&table).map_err(|e| RegistryError::Serialize {
            codename: String::new(),
            reason: e.to_string(),
        })
    }

    /// Writes the registry atomically. The caller must hold the lock.
    pub fn save(&self, _lock: &RegistryLock) -> Result<(), RegistryError> {
        let text = self.to_toml_string()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }

        let tmp = temp_path(&self.path);
        {
            let mut file = File::create(&tmp).map_err(|e| RegistryError::io(&tmp, e))?;
            file.write_all(text.as_bytes())
                .map_err(|e| RegistryError::io(&tmp, e))?;
            file.sync_all().map_err(|e| RegistryError::io(&tmp, e))?;
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(RegistryError::io(&self.path, e));
        }

        debug!(path = %self.path.display(), titles = self.len(), "Registry saved");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "registry".into());
    name.push(".tmp");
    path.with_file_name(name)
}
