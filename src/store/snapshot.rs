//! Snapshot persistence for the store.
//!
//! The whole store serializes to one versioned JSON document. Loading
//! refuses documents written by a different schema version. A
//! [`SnapshotWriter`] rewrites the file on a dedicated thread so request
//! handlers never block on disk.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::thread::JoinHandle;

use rocket::serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub struct StoreSnapshot {
    pub version: u32,
    pub scalars: HashMap<String, String>,
    pub hashes: HashMap<String, HashMap<String, String>>,
    pub zsets: HashMap<String, HashMap<String, i64>>,
}

impl StoreSnapshot {
    pub fn save_to_file(&self, path: &str) -> Result<(), String> {
        let json = serde_json::to_string(self)
            .map_err(|e| format!("Could not serialize snapshot: {e}"))?;
        write_snapshot_file(path, &json)
    }

    pub fn load_from_file(path: &str) -> Result<StoreSnapshot, String> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("Could not read snapshot file {path}: {e}"))?;
        let snap: StoreSnapshot = serde_json::from_str(&raw)
            .map_err(|e| format!("Could not parse snapshot file {path}: {e}"))?;
        if snap.version != SNAPSHOT_VERSION {
            return Err(format!(
                "Snapshot file {path} has version {}, expected {SNAPSHOT_VERSION}",
                snap.version
            ));
        }
        Ok(snap)
    }
}

fn write_snapshot_file(path: &str, json: &str) -> Result<(), String> {
    let file =
        File::create(path).map_err(|e| format!("Could not create snapshot file {path}: {e}"))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(json.as_bytes())
        .and_then(|_| writer.write_all(b"\n"))
        .and_then(|_| writer.flush())
        .map_err(|e| format!("Could not write snapshot file {path}: {e}"))
}

/// Rewrites the snapshot file on its own thread. Each queued snapshot
/// replaces the file whole, so the last one sent before [`close`] wins.
///
/// [`close`]: SnapshotWriter::close
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    sender: Sender<StoreSnapshot>,
    handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SnapshotWriter {
    pub fn new(path: String) -> SnapshotWriter {
        let (sender, receiver) = channel::<StoreSnapshot>();
        let handle = thread::spawn(move || {
            while let Ok(snapshot) = receiver.recv() {
                if let Err(e) = snapshot.save_to_file(&path) {
                    log::error!("Snapshot write failed: {e}");
                }
            }
        });
        SnapshotWriter {
            sender,
            handle: Arc::new(Mutex::new(Some(handle))),
        }
    }

    pub fn send(&self, snapshot: StoreSnapshot) {
        if self.sender.send(snapshot).is_err() {
            log::error!("Snapshot writer thread is gone, state not persisted");
        }
    }

    /// Drain the queue and stop the thread. Call before process exit so the
    /// final state reaches disk.
    pub fn close(self) {
        let taken = {
            let mut guard = match self.handle.lock() {
                Ok(g) => g,
                Err(e) => e.into_inner(),
            };
            guard.take()
        };
        if let Some(handle) = taken {
            drop(self.sender);
            if handle.join().is_err() {
                log::error!("Snapshot writer thread panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_snapshot() -> StoreSnapshot {
        let mut scalars = HashMap::new();
        scalars.insert("battle:next_id".to_string(), "3".to_string());
        let mut war = HashMap::new();
        war.insert("slider".to_string(), "-2".to_string());
        let mut hashes = HashMap::new();
        hashes.insert("war:state".to_string(), war);
        let mut active = HashMap::new();
        active.insert("1".to_string(), 1_000_i64);
        let mut zsets = HashMap::new();
        zsets.insert("battles:active".to_string(), active);
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            scalars,
            hashes,
            zsets,
        }
    }

    #[test]
    fn file_roundtrip_preserves_every_namespace() {
        let path = std::env::temp_dir().join("cc_snapshot_roundtrip.json");
        let path = path.to_str().unwrap().to_string();
        let snap = sample_snapshot();
        snap.save_to_file(&path).unwrap();

        let loaded = StoreSnapshot::load_from_file(&path).unwrap();
        assert_eq!(loaded.scalars.get("battle:next_id").unwrap(), "3");
        assert_eq!(
            loaded.hashes.get("war:state").unwrap().get("slider").unwrap(),
            "-2"
        );
        assert_eq!(
            loaded.zsets.get("battles:active").unwrap().get("1"),
            Some(&1_000_i64)
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let path = std::env::temp_dir().join("cc_snapshot_version.json");
        let path = path.to_str().unwrap().to_string();
        let mut snap = sample_snapshot();
        snap.version = 99;
        let json = serde_json::to_string(&snap).unwrap();
        std::fs::write(&path, json).unwrap();

        let err = StoreSnapshot::load_from_file(&path).unwrap_err();
        assert!(err.contains("version 99"), "unexpected error: {err}");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        let missing = std::env::temp_dir().join("cc_snapshot_missing_for_sure.json");
        let result = StoreSnapshot::load_from_file(missing.to_str().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn writer_flushes_queued_snapshot_on_close() {
        let path = std::env::temp_dir().join("cc_snapshot_writer.json");
        let path_str = path.to_str().unwrap().to_string();
        let writer = SnapshotWriter::new(path_str.clone());
        writer.send(sample_snapshot());
        writer.close();

        let loaded = StoreSnapshot::load_from_file(&path_str).unwrap();
        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        std::fs::remove_file(&path).ok();
    }
}
