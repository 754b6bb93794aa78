//! Key-value store backing every piece of mutable game state.
//!
//! An in-memory engine with the primitives the game needs: scalars, hashes,
//! sorted sets, and atomic counters. Every operation is async and atomic;
//! one mutex guards the whole map, so read-modify-write primitives like
//! [`Store::hincr_by`] can never interleave. State survives restarts through
//! JSON snapshots (see [`snapshot`]).
//!
//! Key scheme (prefix-discoverable for admin tooling):
//!
//! ```text
//! battle:next_id                 counter  next battle id
//! battle:<id>                    scalar   versioned JSON battle record
//! battle:post:<post_id>         scalar   battle id for an originating post
//! battles:active                 zset     member=<id> score=created_at_ms
//! war:state                      hash     slider / total_battles / wins_* / last_victory_*
//! war:participants:<faction>     hash     member=username, append-only until reset
//! player:<username>              hash     coins / xp / points_west / points_east
//! leaderboard:<faction>          zset     member=username score=faction points
//! scheduler:battle_sweep         hash     runs / last_run_at / last_* counters
//! ```

pub mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use rocket::futures::lock::Mutex;
use rocket::serde::{Deserialize, Serialize};

use snapshot::{SnapshotWriter, StoreSnapshot, SNAPSHOT_VERSION};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(crate = "rocket::serde")]
pub(crate) struct StoreInner {
    pub(crate) scalars: HashMap<String, String>,
    pub(crate) hashes: HashMap<String, HashMap<String, String>>,
    pub(crate) zsets: HashMap<String, HashMap<String, i64>>,
}

/// Shared handle to the store. Cheap to clone; all clones see the same data.
#[derive(Debug, Clone, Default)]
pub struct Store {
    inner: Arc<Mutex<StoreInner>>,
    writer: Arc<std::sync::Mutex<Option<SnapshotWriter>>>,
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    /// Build a store pre-filled from a snapshot, for restart recovery.
    pub fn from_snapshot(snap: StoreSnapshot) -> Store {
        Store {
            inner: Arc::new(Mutex::new(StoreInner {
                scalars: snap.scalars,
                hashes: snap.hashes,
                zsets: snap.zsets,
            })),
            writer: Arc::default(),
        }
    }

    // ---- scalars ----

    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.lock().await.scalars.get(key).cloned()
    }

    pub async fn set(&self, key: &str, value: impl Into<String>) {
        self.inner
            .lock()
            .await
            .scalars
            .insert(key.to_string(), value.into());
    }

    /// Remove a key of any type. Returns true if something was removed.
    pub async fn del(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        let a = inner.scalars.remove(key).is_some();
        let b = inner.hashes.remove(key).is_some();
        let c = inner.zsets.remove(key).is_some();
        a || b || c
    }

    pub async fn exists(&self, key: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.scalars.contains_key(key)
            || inner.hashes.contains_key(key)
            || inner.zsets.contains_key(key)
    }

    /// Atomic counter increment over a scalar key. Missing or non-numeric
    /// values count from zero. Returns the new value.
    pub async fn incr_by(&self, key: &str, delta: i64) -> i64 {
        let mut inner = self.inner.lock().await;
        let current = inner
            .scalars
            .get(key)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + delta;
        inner.scalars.insert(key.to_string(), next.to_string());
        next
    }

    // ---- hashes ----

    pub async fn hget(&self, key: &str, field: &str) -> Option<String> {
        self.inner
            .lock()
            .await
            .hashes
            .get(key)
            .and_then(|h| h.get(field).cloned())
    }

    pub async fn hgetall(&self, key: &str) -> HashMap<String, String> {
        self.inner
            .lock()
            .await
            .hashes
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn hset(&self, key: &str, field: &str, value: impl Into<String>) {
        self.inner
            .lock()
            .await
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.into());
    }

    pub async fn hset_multi(&self, key: &str, fields: &[(&str, String)]) {
        let mut inner = self.inner.lock().await;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
    }

    /// Atomic hash-field increment. Missing or non-numeric fields count
    /// from zero. Returns the new value.
    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> i64 {
        let mut inner = self.inner.lock().await;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        let current = hash
            .get(field)
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        let next = current + delta;
        hash.insert(field.to_string(), next.to_string());
        next
    }

    pub async fn hdel(&self, key: &str, field: &str) -> bool {
        self.inner
            .lock()
            .await
            .hashes
            .get_mut(key)
            .map(|h| h.remove(field).is_some())
            .unwrap_or(false)
    }

    // ---- sorted sets ----

    pub async fn zadd(&self, key: &str, member: &str, score: i64) {
        self.inner
            .lock()
            .await
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
    }

    /// Atomic score increment; adds the member at `delta` if absent.
    /// Returns the new score.
    pub async fn zincr_by(&self, key: &str, member: &str, delta: i64) -> i64 {
        let mut inner = self.inner.lock().await;
        let set = inner.zsets.entry(key.to_string()).or_default();
        let next = set.get(member).copied().unwrap_or(0) + delta;
        set.insert(member.to_string(), next);
        next
    }

    pub async fn zscore(&self, key: &str, member: &str) -> Option<i64> {
        self.inner
            .lock()
            .await
            .zsets
            .get(key)
            .and_then(|s| s.get(member).copied())
    }

    pub async fn zrem(&self, key: &str, member: &str) -> bool {
        self.inner
            .lock()
            .await
            .zsets
            .get_mut(key)
            .map(|s| s.remove(member).is_some())
            .unwrap_or(false)
    }

    pub async fn zcard(&self, key: &str) -> usize {
        self.inner
            .lock()
            .await
            .zsets
            .get(key)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Members by rank, ascending score (ties broken by member), with
    /// scores. `start..=stop` are rank indices; out-of-range is clamped.
    pub async fn zrange(&self, key: &str, start: usize, stop: usize) -> Vec<(String, i64)> {
        let sorted = self.sorted_members(key).await;
        slice_ranks(sorted, start, stop)
    }

    /// Members by rank, descending score (ties broken by member ascending).
    pub async fn zrange_rev(&self, key: &str, start: usize, stop: usize) -> Vec<(String, i64)> {
        let mut sorted = self.sorted_members(key).await;
        sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        slice_ranks(sorted, start, stop)
    }

    async fn sorted_members(&self, key: &str) -> Vec<(String, i64)> {
        let inner = self.inner.lock().await;
        let mut members: Vec<(String, i64)> = inner
            .zsets
            .get(key)
            .map(|s| s.iter().map(|(m, v)| (m.clone(), *v)).collect())
            .unwrap_or_default();
        members.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        members
    }

    // ---- snapshots ----

    pub async fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock().await;
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            scalars: inner.scalars.clone(),
            hashes: inner.hashes.clone(),
            zsets: inner.zsets.clone(),
        }
    }

    /// Replace the whole store content with a snapshot's.
    pub async fn restore(&self, snap: StoreSnapshot) {
        let mut inner = self.inner.lock().await;
        inner.scalars = snap.scalars;
        inner.hashes = snap.hashes;
        inner.zsets = snap.zsets;
    }

    pub async fn save_to_file(&self, path: &str) -> Result<(), String> {
        self.snapshot().await.save_to_file(path)
    }

    pub async fn load_from_file(&self, path: &str) -> Result<(), String> {
        let snap = StoreSnapshot::load_from_file(path)?;
        self.restore(snap).await;
        Ok(())
    }

    /// Attach a background writer; subsequent `persist()` calls hand it a
    /// fresh snapshot.
    pub fn attach_writer(&self, writer: SnapshotWriter) {
        let mut guard = match self.writer.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        *guard = Some(writer);
    }

    /// Hand the current state to the background writer, if one is attached.
    /// Best-effort: a missing writer is not an error.
    pub async fn persist(&self) {
        let snap = {
            let has_writer = {
                let guard = match self.writer.lock() {
                    Ok(g) => g,
                    Err(e) => e.into_inner(),
                };
                guard.is_some()
            };
            if !has_writer {
                return;
            }
            self.snapshot().await
        };
        let guard = match self.writer.lock() {
            Ok(g) => g,
            Err(e) => e.into_inner(),
        };
        if let Some(writer) = &*guard {
            writer.send(snap);
        }
    }

    /// Flush and stop the background writer. Safe to call when none exists.
    pub fn shutdown(&self) {
        let writer = {
            let mut guard = match self.writer.lock() {
                Ok(g) => g,
                Err(e) => e.into_inner(),
            };
            guard.take()
        };
        if let Some(writer) = writer {
            writer.close();
        }
    }
}

fn slice_ranks(sorted: Vec<(String, i64)>, start: usize, stop: usize) -> Vec<(String, i64)> {
    if start >= sorted.len() || stop < start {
        return Vec::new();
    }
    let end = stop.saturating_add(1).min(sorted.len());
    sorted[start..end].to_vec()
}
