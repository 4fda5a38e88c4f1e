use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use st_types::{ParameterSet, TuneResult};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rounded value and engine default of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub value: i64,
    pub default: i64,
}

/// The best-estimate parameter vector as persisted to disk:
/// `{ "<name>": { "value": <int>, "default": <int> } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: Vec<(String, SnapshotEntry)>,
}

impl Snapshot {
    pub fn from_parameters(params: &ParameterSet) -> Self {
        let entries = params
            .iter()
            .map(|p| {
                (
                    p.name().to_string(),
                    SnapshotEntry {
                        value: p.rounded(),
                        default: p.default(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<SnapshotEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| *e)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Written and read as a map in parameter order rather than sorted by name.
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

struct SnapshotVisitor;

impl<'de> Visitor<'de> for SnapshotVisitor {
    type Value = Snapshot;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of parameter name to value and default")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Snapshot, A::Error> {
        let mut entries: Vec<(String, SnapshotEntry)> =
            Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, entry)) = access.next_entry::<String, SnapshotEntry>()? {
            match entries.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = entry,
                None => entries.push((name, entry)),
            }
        }
        Ok(Snapshot { entries })
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SnapshotVisitor)
    }
}

/// Writes the snapshot file, replacing it completely on every write.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Serialize `params` and atomically replace the snapshot file. A crash
    /// mid-write leaves the previous snapshot intact.
    pub fn write(&self, params: &ParameterSet) -> TuneResult<Snapshot> {
        let snapshot = Snapshot::from_parameters(params);
        let json = serde_json::to_string_pretty(&snapshot)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        std::fs::write(&temp, json)?;
        std::fs::rename(&temp, &self.path)?;

        debug!("Wrote snapshot of {} parameters to {}", snapshot.len(), self.path.display());
        Ok(snapshot)
    }

    pub fn read(&self) -> TuneResult<Snapshot> {
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}
