//! Cached, persisted tables: the per-peer inclusion index plus the two
//! aggregate tables the commit path maintains.
//!
//! All mutations run inside one exclusive unit of work provided by the
//! caller; the read caches live across units of work, while the inclusion
//! table's snapshot map must be empty at every commit boundary.

use std::collections::HashMap;

use crate::domain::counters::{ChatListTotalUnreadState, PeerGroupUnreadCountersCombinedSummary};
use crate::domain::ids::{GroupId, MessageIndex, PeerId};
use crate::domain::inclusion::{PeerChatListInclusion, PeerInclusionIndex};
use crate::index::codec;
use crate::infra::contracts::{KeyValueStore, TableId};
use crate::infra::error::StoreError;

const INCLUSION_RECORD_CORRUPT: &str = "CHATLIST_INCLUSION_RECORD_CORRUPT";

/// One cached+persisted inclusion record per peer, with a first-touch
/// snapshot of the pre-mutation value kept per unit of work for delta
/// computation.
#[derive(Debug)]
pub struct InclusionIndexTable {
    pub(crate) table: TableId,
    pub(crate) cached_peer_indices: HashMap<PeerId, PeerInclusionIndex>,
    pub(crate) updated_previous_peer_indices: HashMap<PeerId, PeerInclusionIndex>,
}

impl InclusionIndexTable {
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            cached_peer_indices: HashMap::new(),
            updated_previous_peer_indices: HashMap::new(),
        }
    }

    pub fn table(&self) -> TableId {
        self.table
    }

    /// Returns the peer's record, reading and caching the persisted value on
    /// first access. A peer without a record reads as the default
    /// not-included record.
    pub fn get(
        &mut self,
        store: &dyn KeyValueStore,
        peer: PeerId,
    ) -> Result<PeerInclusionIndex, StoreError> {
        if let Some(cached) = self.cached_peer_indices.get(&peer) {
            return Ok(*cached);
        }

        let index = match store.get(self.table, &codec::peer_key(peer)) {
            Some(value) => match codec::decode_inclusion_index(peer, &value) {
                Ok(index) => index,
                Err(error) => {
                    tracing::error!(
                        code = INCLUSION_RECORD_CORRUPT,
                        peer = %peer,
                        error = %error,
                        "refusing to load corrupt inclusion record"
                    );
                    return Err(error);
                }
            },
            None => PeerInclusionIndex::default(),
        };

        self.cached_peer_indices.insert(peer, index);
        Ok(index)
    }

    /// Replaces the ordering message, preserving the inclusion rule.
    pub fn set_top_message_index(
        &mut self,
        store: &dyn KeyValueStore,
        peer: PeerId,
        index: Option<MessageIndex>,
    ) -> Result<PeerInclusionIndex, StoreError> {
        let current = self.get(store, peer)?;
        self.updated_previous_peer_indices
            .entry(peer)
            .or_insert(current);

        let updated = PeerInclusionIndex {
            top_message_index: index,
            inclusion: current.inclusion,
        };
        self.cached_peer_indices.insert(peer, updated);
        Ok(updated)
    }

    /// Replaces the inclusion rule, preserving the ordering message.
    pub fn set_inclusion(
        &mut self,
        store: &dyn KeyValueStore,
        peer: PeerId,
        inclusion: PeerChatListInclusion,
    ) -> Result<PeerInclusionIndex, StoreError> {
        let current = self.get(store, peer)?;
        self.updated_previous_peer_indices
            .entry(peer)
            .or_insert(current);

        let updated = PeerInclusionIndex {
            top_message_index: current.top_message_index,
            inclusion,
        };
        self.cached_peer_indices.insert(peer, updated);
        Ok(updated)
    }

    /// Full key scan over the table, excluding nothing. Group-level rows
    /// come back with the reserved namespace and are the caller's to filter.
    pub fn get_all_peer_ids(&self, store: &dyn KeyValueStore) -> Result<Vec<PeerId>, StoreError> {
        let mut keys: Vec<Vec<u8>> = Vec::new();
        store.scan_keys(self.table, &[], &mut |key| {
            keys.push(key.to_vec());
            true
        });

        keys.iter().map(|key| codec::peer_from_key(key)).collect()
    }

    /// Drops the read cache. Only legal while no unit of work holds pending
    /// snapshots.
    pub fn clear_memory_cache(&mut self) -> Result<(), StoreError> {
        self.check_clean()?;
        self.cached_peer_indices.clear();
        Ok(())
    }

    /// Verifies the snapshot map is empty. Call at unit-of-work boundaries;
    /// a non-empty map there means a commit was skipped, which is a logic
    /// fault that must surface loudly.
    pub fn check_clean(&self) -> Result<(), StoreError> {
        let count = self.updated_previous_peer_indices.len();
        if count != 0 {
            return Err(StoreError::DirtySnapshotsNotFlushed { count });
        }
        Ok(())
    }
}

/// Single-record table holding the root unread aggregate.
#[derive(Debug)]
pub struct TotalUnreadStateTable {
    table: TableId,
    cached: Option<ChatListTotalUnreadState>,
}

const TOTAL_UNREAD_STATE_KEY: [u8; 1] = [0];

impl TotalUnreadStateTable {
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            cached: None,
        }
    }

    pub fn get(
        &mut self,
        store: &dyn KeyValueStore,
    ) -> Result<ChatListTotalUnreadState, StoreError> {
        if let Some(cached) = &self.cached {
            return Ok(cached.clone());
        }

        let state = match store.get(self.table, &TOTAL_UNREAD_STATE_KEY) {
            Some(value) => codec::decode_total_unread_state(&value)?,
            None => ChatListTotalUnreadState::default(),
        };

        self.cached = Some(state.clone());
        Ok(state)
    }

    pub fn set(&mut self, store: &mut dyn KeyValueStore, state: ChatListTotalUnreadState) {
        store.set(
            self.table,
            &TOTAL_UNREAD_STATE_KEY,
            codec::encode_total_unread_state(&state),
        );
        self.cached = Some(state);
    }

    pub fn clear_memory_cache(&mut self) {
        self.cached = None;
    }
}

/// Per-group unread summaries, keyed with the reserved group namespace.
#[derive(Debug)]
pub struct GroupStatsTable {
    table: TableId,
    cached: HashMap<GroupId, PeerGroupUnreadCountersCombinedSummary>,
}

impl GroupStatsTable {
    pub fn new(table: TableId) -> Self {
        Self {
            table,
            cached: HashMap::new(),
        }
    }

    pub fn get(
        &mut self,
        store: &dyn KeyValueStore,
        group: GroupId,
    ) -> Result<PeerGroupUnreadCountersCombinedSummary, StoreError> {
        if let Some(cached) = self.cached.get(&group) {
            return Ok(cached.clone());
        }

        let summary = match store.get(self.table, &codec::group_key(group)) {
            Some(value) => codec::decode_group_summary(&value)?,
            None => PeerGroupUnreadCountersCombinedSummary::default(),
        };

        self.cached.insert(group, summary.clone());
        Ok(summary)
    }

    pub fn set(
        &mut self,
        store: &mut dyn KeyValueStore,
        group: GroupId,
        summary: PeerGroupUnreadCountersCombinedSummary,
    ) {
        store.set(
            self.table,
            &codec::group_key(group),
            codec::encode_group_summary(&summary),
        );
        self.cached.insert(group, summary);
    }

    pub fn clear_memory_cache(&mut self) {
        self.cached.clear();
    }
}
