//! Keyed snapshot diffing with update hysteresis
//!
//! A [`Reconciler`] caches the records the presentation layer currently
//! shows. Each poll is diffed against that cache; entries whose numbers
//! moved by no more than the threshold are not reported and keep their
//! cached value, so slow polling jitter never reaches the view.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::types::{AudioApp, AudioDevice, BluetoothDevice};

/// A record with a stable identity across polls
pub trait Keyed: Clone {
    type Key: Ord + Hash + Clone + Debug;

    fn key(&self) -> Self::Key;

    /// Whether `newer` differs from `self` enough to be shown
    fn drifted(&self, newer: &Self, threshold: u8) -> bool;
}

fn moved(old: u8, new: u8, threshold: u8) -> bool {
    old.abs_diff(new) > threshold
}

impl Keyed for AudioDevice {
    type Key = String;

    fn key(&self) -> String {
        self.identifier.clone()
    }

    fn drifted(&self, newer: &Self, threshold: u8) -> bool {
        moved(self.volume_percent, newer.volume_percent, threshold) || self.muted != newer.muted
    }
}

impl Keyed for AudioApp {
    type Key = u32;

    fn key(&self) -> u32 {
        self.index
    }

    fn drifted(&self, newer: &Self, threshold: u8) -> bool {
        moved(self.volume_percent, newer.volume_percent, threshold) || self.name != newer.name
    }
}

impl Keyed for BluetoothDevice {
    type Key = String;

    fn key(&self) -> String {
        self.mac.to_ascii_uppercase()
    }

    // No numeric fields; any flag or name change counts
    fn drifted(&self, newer: &Self, _threshold: u8) -> bool {
        self != newer
    }
}

/// Partition between two snapshots of a keyed collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta<R: Keyed> {
    pub added: Vec<R>,
    pub removed: Vec<R::Key>,
    pub updated: Vec<R>,
}

impl<R: Keyed> Default for Delta<R> {
    fn default() -> Self {
        Self { added: Vec::new(), removed: Vec::new(), updated: Vec::new() }
    }
}

impl<R: Keyed> Delta<R> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }

    #[cfg(test)]
    pub fn added_keys(&self) -> Vec<R::Key> {
        self.added.iter().map(Keyed::key).collect()
    }

    #[cfg(test)]
    pub fn updated_keys(&self) -> Vec<R::Key> {
        self.updated.iter().map(Keyed::key).collect()
    }
}

/// Index records by key; a repeated key keeps its first record
pub fn key_by<R: Keyed>(records: impl IntoIterator<Item = R>) -> BTreeMap<R::Key, R> {
    let mut map = BTreeMap::new();
    for record in records {
        map.entry(record.key()).or_insert(record);
    }
    map
}

/// Diff `previous` against `next` by key.
///
/// Output vectors are in key order.
pub fn reconcile<R: Keyed>(
    previous: &BTreeMap<R::Key, R>,
    next: &BTreeMap<R::Key, R>,
    threshold: u8,
) -> Delta<R> {
    let mut delta = Delta::default();

    for (key, record) in next {
        match previous.get(key) {
            None => delta.added.push(record.clone()),
            Some(old) if old.drifted(record, threshold) => delta.updated.push(record.clone()),
            Some(_) => {}
        }
    }
    delta.removed = previous.keys().filter(|key| !next.contains_key(*key)).cloned().collect();

    delta
}

/// Cached view of one collection plus per-key edit suppression
#[derive(Debug)]
pub struct Reconciler<R: Keyed> {
    shown: BTreeMap<R::Key, R>,
    threshold: u8,
    suppressed: HashSet<R::Key>,
}

impl<R: Keyed> Reconciler<R> {
    pub fn new(threshold: u8) -> Self {
        Self { shown: BTreeMap::new(), threshold, suppressed: HashSet::new() }
    }

    pub fn shown(&self) -> &BTreeMap<R::Key, R> {
        &self.shown
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.shown.get(key)
    }

    pub fn len(&self) -> usize {
        self.shown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }

    /// Apply a poll by delta only.
    ///
    /// Entries that did not drift, and entries under user edit, keep the
    /// value already shown. Suppressed entries are still added and removed.
    pub fn apply(&mut self, next: impl IntoIterator<Item = R>) -> Delta<R> {
        let next = key_by(next);
        let mut delta = reconcile(&self.shown, &next, self.threshold);
        delta.updated.retain(|record| !self.suppressed.contains(&record.key()));

        for key in &delta.removed {
            self.shown.remove(key);
            self.suppressed.remove(key);
        }
        for record in delta.added.iter().chain(delta.updated.iter()) {
            self.shown.insert(record.key(), record.clone());
        }
        delta
    }

    /// Apply fresh values for entries already shown; nothing is added or removed.
    ///
    /// Used by fast level polls that only sample known keys. Drift and
    /// suppression apply as in [`Reconciler::apply`].
    pub fn update_existing(&mut self, next: impl IntoIterator<Item = R>) -> Delta<R> {
        let mut delta = Delta::default();
        for record in next {
            let key = record.key();
            if self.suppressed.contains(&key) {
                continue;
            }
            if let Some(shown) = self.shown.get_mut(&key)
                && shown.drifted(&record, self.threshold)
            {
                *shown = record.clone();
                delta.updated.push(record);
            }
        }
        delta
    }

    /// Replace everything, for explicit refreshes of low-churn collections
    pub fn rebuild(&mut self, next: impl IntoIterator<Item = R>) -> Vec<R> {
        self.shown = key_by(next);
        self.suppressed.retain(|key| self.shown.contains_key(key));
        self.shown.values().cloned().collect()
    }

    /// Modify a shown record in place, so the next poll compares against
    /// what the user just set; false if it is not shown
    pub fn edit_shown(&mut self, key: &R::Key, edit: impl FnOnce(&mut R)) -> bool {
        match self.shown.get_mut(key) {
            Some(record) => {
                edit(record);
                true
            }
            None => false,
        }
    }

    /// Stop reporting updates for `key` until [`Reconciler::release`]
    pub fn suppress(&mut self, key: R::Key) {
        self.suppressed.insert(key);
    }

    pub fn release(&mut self, key: &R::Key) -> bool {
        self.suppressed.remove(key)
    }

    #[cfg(test)]
    pub fn is_suppressed(&self, key: &R::Key) -> bool {
        self.suppressed.contains(key)
    }

    pub fn clear(&mut self) {
        self.shown.clear();
        self.suppressed.clear();
    }
}
