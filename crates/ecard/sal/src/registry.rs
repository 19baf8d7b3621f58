//! Registry of card state entries
//!
//! Entries are indexed by channel session id, context handle and slot handle. Queries
//! intersect the buckets of the keys given in a connection handle and then narrow the result
//! by slot index, reader name, card application and card type.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::card_state::CardStateEntry;
use crate::handle::ConnectionHandle;

type EntrySet = BTreeSet<Arc<CardStateEntry>>;

#[derive(Debug, Default)]
struct Indices {
    sessions: HashMap<String, EntrySet>,
    contexts: HashMap<Bytes, EntrySet>,
    slots: HashMap<Bytes, EntrySet>,
    all: EntrySet,
}

impl Indices {
    fn insert(&mut self, entry: &Arc<CardStateEntry>) {
        let handle = entry.handle();
        if let Some(session) = handle.session_id() {
            insert_into(&mut self.sessions, session.to_string(), entry);
        }
        if let Some(context) = handle.context_handle() {
            insert_into(&mut self.contexts, context.clone(), entry);
        }
        if let Some(slot) = handle.slot_handle() {
            insert_into(&mut self.slots, slot.clone(), entry);
        }
        self.all.insert(entry.clone());
    }

    /// Drop every index reference to `entry`
    ///
    /// With `all_slots` the entry is purged from every slot handle bucket, otherwise only from
    /// the bucket of its current slot handle.
    fn remove(&mut self, entry: &Arc<CardStateEntry>, all_slots: bool) {
        let handle = entry.handle();
        if let Some(session) = handle.session_id() {
            remove_from(&mut self.sessions, session, entry);
        }
        if let Some(context) = handle.context_handle() {
            remove_from(&mut self.contexts, context, entry);
        }
        if all_slots {
            self.slots.retain(|_, bucket| {
                bucket.remove(entry);
                !bucket.is_empty()
            });
        } else if let Some(slot) = handle.slot_handle() {
            remove_from(&mut self.slots, slot, entry);
        }
        self.all.remove(entry);
    }

    fn matching(&self, query: &ConnectionHandle, filter_by_application: bool) -> EntrySet {
        let session = query.session_id();
        let context = query.context_handle();
        let slot = query.slot_handle();

        let mut candidates = if session.is_none() && context.is_none() && slot.is_none() {
            self.all.clone()
        } else {
            let buckets = [
                session.map(|key| self.sessions.get(key)),
                context.map(|key| self.contexts.get(key)),
                slot.map(|key| self.slots.get(key)),
            ];
            intersect(buckets.into_iter().flatten())
        };

        if let Some(index) = query.slot_index() {
            candidates.retain(|entry| entry.handle().slot_index().is_none_or(|own| own == index));
        }
        if let Some(ifd_name) = query.ifd_name() {
            candidates.retain(|entry| entry.handle().ifd_name().is_none_or(|own| own == ifd_name));
        }
        if filter_by_application && let Some(application) = query.card_application() {
            candidates.retain(|entry| entry.handle().card_application() == Some(application));
        }
        if let Some(card_type) = query.card_type() {
            candidates.retain(|entry| entry.card_type() == card_type);
        }

        candidates
    }
}

fn insert_into<K: Eq + Hash>(map: &mut HashMap<K, EntrySet>, key: K, entry: &Arc<CardStateEntry>) {
    map.entry(key).or_default().insert(entry.clone());
}

fn remove_from<K, Q>(map: &mut HashMap<K, EntrySet>, key: &Q, entry: &Arc<CardStateEntry>)
where
    K: Eq + Hash + std::borrow::Borrow<Q>,
    Q: Eq + Hash + ?Sized,
{
    if let Some(bucket) = map.get_mut(key) {
        bucket.remove(entry);
        if bucket.is_empty() {
            map.remove(key);
        }
    }
}

/// Intersection of the given buckets; a missing bucket makes the result empty
fn intersect<'a>(buckets: impl Iterator<Item = Option<&'a EntrySet>>) -> EntrySet {
    let mut result: Option<EntrySet> = None;
    for bucket in buckets {
        let Some(bucket) = bucket else {
            return EntrySet::new();
        };
        result = Some(match result {
            None => bucket.clone(),
            Some(current) => current.intersection(bucket).cloned().collect(),
        });
    }
    result.unwrap_or_default()
}

/// Thread safe registry of card state entries
///
/// One lock guards every index and is held for the duration of a single call only.
#[derive(Debug, Default)]
pub struct CardStateRegistry {
    indices: Mutex<Indices>,
}

impl CardStateRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.indices.lock().all.len()
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.indices.lock().all.is_empty()
    }

    /// Snapshot of all entries ordered by serial number
    pub fn entries(&self) -> Vec<Arc<CardStateEntry>> {
        self.indices.lock().all.iter().cloned().collect()
    }

    /// Register an entry under the keys present in its handle
    pub fn add_entry(&self, entry: Arc<CardStateEntry>) {
        debug!(entry = %entry, "Adding card state entry");
        self.indices.lock().insert(&entry);
    }

    /// Entries matching a connection handle
    ///
    /// Without a session id, context handle or slot handle every entry is a candidate.
    /// Candidates without a slot index or reader name pass those filters. The card application
    /// filter only applies when `filter_by_application` is set and the query names one.
    pub fn get_matching_entries(
        &self,
        handle: &ConnectionHandle,
        filter_by_application: bool,
    ) -> Vec<Arc<CardStateEntry>> {
        self.indices
            .lock()
            .matching(handle, filter_by_application)
            .into_iter()
            .collect()
    }

    /// The single entry matching a connection handle
    ///
    /// Returns `None` when no entry or more than one entry matches.
    pub fn get_entry(
        &self,
        handle: &ConnectionHandle,
        filter_by_application: bool,
    ) -> Option<Arc<CardStateEntry>> {
        let mut matches = self.indices.lock().matching(handle, filter_by_application);
        match matches.len() {
            1 => matches.pop_first(),
            0 => {
                warn!(%handle, "No state entry found for the connection handle");
                None
            }
            count => {
                warn!(%handle, count, "More than one state entry found for the connection handle");
                None
            }
        }
    }

    /// Remove every entry matching a connection handle, returning the removed entries
    ///
    /// Without a slot handle in the query the entries are purged from all slot handle
    /// buckets. Protocol state of removed entries is dropped.
    pub fn remove_entry(&self, handle: &ConnectionHandle) -> Vec<Arc<CardStateEntry>> {
        let all_slots = handle.slot_handle().is_none();
        let removed: Vec<_> = {
            let mut indices = self.indices.lock();
            let matches = indices.matching(handle, true);
            for entry in &matches {
                indices.remove(entry, all_slots);
            }
            matches.into_iter().collect()
        };

        for entry in &removed {
            entry.remove_all_protocols();
        }
        debug!(%handle, count = removed.len(), all_slots, "Removed card state entries");
        removed
    }

    /// Drop the slot handle association of the entry connected through `slot_handle`
    ///
    /// The entry stays reachable through its other keys; its protocol state is dropped.
    pub fn remove_slot_handle_entry(&self, context_handle: &[u8], slot_handle: &[u8]) {
        debug!(slot = hex::encode(slot_handle), "Removing slot handle association");
        let query = ConnectionHandle::new()
            .with_context_handle(Bytes::copy_from_slice(context_handle))
            .with_slot_handle(Bytes::copy_from_slice(slot_handle));

        let matches = {
            let mut indices = self.indices.lock();
            let matches = indices.matching(&query, true);
            for entry in &matches {
                remove_from(&mut indices.slots, slot_handle, entry);
            }
            matches
        };
        for entry in &matches {
            entry.remove_all_protocols();
        }
    }

    /// Replace the handle of a registered entry and re-index it
    pub fn update_handle(&self, entry: &Arc<CardStateEntry>, handle: ConnectionHandle) {
        self.update_handle_with(entry, |_| handle);
    }

    /// Derive a new handle from the current one and re-index the entry
    ///
    /// The read of the current handle and the write of the new one happen under the index lock,
    /// so concurrent updates of the same entry are not lost.
    pub fn update_handle_with(
        &self,
        entry: &Arc<CardStateEntry>,
        update: impl FnOnce(ConnectionHandle) -> ConnectionHandle,
    ) {
        let mut indices = self.indices.lock();
        indices.remove(entry, false);
        let previous = entry.replace_handle(update(entry.handle()));
        indices.insert(entry);
        debug!(entry = %entry, %previous, "Updated connection handle");
    }

    /// Switch the current card application of an entry
    ///
    /// The last selected EF belongs to the previous application and is forgotten.
    pub fn set_card_application(&self, entry: &Arc<CardStateEntry>, application: impl Into<Bytes>) {
        self.update_handle_with(entry, |handle| handle.with_card_application(application));
        entry.unset_fcp_of_selected_ef();
    }
}
