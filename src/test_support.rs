//! Shared test harness: a full in-memory engine with the bookkeeping the
//! enclosing transaction machinery would normally do (initial read-state
//! snapshots, tag transitions, filter-set participation).

use std::collections::BTreeMap;

use crate::domain::counters::{ChatListTotalUnreadState, PeerGroupUnreadCountersCombinedSummary};
use crate::domain::ids::{GroupId, MessageId, MessageIndex, MessageNamespace, PeerId};
use crate::domain::inclusion::PeerChatListInclusion;
use crate::domain::read_state::{CombinedReadState, NamespaceReadState};
use crate::domain::tags::{CounterTag, CounterTagSet};
use crate::index::codec;
use crate::index::commit::{CommitOutcome, CommitParams, CommitStores, TagTransition};
use crate::index::reindex;
use crate::index::table::{GroupStatsTable, InclusionIndexTable, TotalUnreadStateTable};
use crate::infra::config::ValidationConfig;
use crate::infra::contracts::{
    MuteState, NotificationMuteStore, PeerDirectory, PeerRecord, ReadStateStore, TableId,
};
use crate::infra::stubs::{
    MemoryChatListMembership, MemoryKeyValueStore, MemoryMuteStore, MemoryPeerDirectory,
    MemoryReadStateStore, RecordingNameIndex,
};

pub const INCLUSION_TABLE: TableId = TableId(10);
pub const TOTALS_TABLE: TableId = TableId(11);
pub const GROUP_STATS_TABLE: TableId = TableId(12);

pub const TAG_1: CounterTag = CounterTag(1 << 0);
pub const TAG_2: CounterTag = CounterTag(1 << 1);

pub fn tags(list: &[CounterTag]) -> CounterTagSet {
    list.iter().copied().collect()
}

pub fn include_in(group: GroupId) -> PeerChatListInclusion {
    PeerChatListInclusion::IfHasMessagesOrOneOf {
        group,
        pinning_index: None,
        min_timestamp: None,
    }
}

pub fn message_at(peer: PeerId, timestamp: i32, id: i32) -> MessageIndex {
    MessageIndex {
        id: MessageId {
            peer,
            namespace: 0,
            id,
        },
        timestamp,
    }
}

/// One namespace's read state with `is_unread` derived the way the
/// read-state store derives it.
pub fn single_state(namespace: MessageNamespace, count: i32, marked: bool) -> CombinedReadState {
    multi_state(&[(namespace, count, marked)])
}

pub fn multi_state(states: &[(MessageNamespace, i32, bool)]) -> CombinedReadState {
    CombinedReadState {
        states: states
            .iter()
            .map(|(namespace, count, marked)| {
                (
                    *namespace,
                    NamespaceReadState {
                        count: *count,
                        is_unread: *count > 0 || *marked,
                        marked_unread: *marked,
                    },
                )
            })
            .collect(),
    }
}

pub struct Harness {
    pub store: MemoryKeyValueStore,
    pub inclusion: InclusionIndexTable,
    pub totals: TotalUnreadStateTable,
    pub group_stats: GroupStatsTable,
    pub read_states: MemoryReadStateStore,
    pub mutes: MemoryMuteStore,
    pub peers: MemoryPeerDirectory,
    pub name_index: RecordingNameIndex,
    pub validation: ValidationConfig,
    params: CommitParams,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: MemoryKeyValueStore::default(),
            inclusion: InclusionIndexTable::new(INCLUSION_TABLE),
            totals: TotalUnreadStateTable::new(TOTALS_TABLE),
            group_stats: GroupStatsTable::new(GROUP_STATS_TABLE),
            read_states: MemoryReadStateStore::default(),
            mutes: MemoryMuteStore::default(),
            peers: MemoryPeerDirectory::default(),
            name_index: RecordingNameIndex::default(),
            validation: ValidationConfig::default(),
            params: CommitParams::default(),
        }
    }

    /// Registers an unmuted peer carrying `tags`.
    pub fn add_peer(&mut self, peer: PeerId, tags: CounterTagSet) {
        self.peers.insert(
            PeerRecord {
                id: peer,
                associated_peer_id: None,
            },
            tags,
        );
        self.mutes.set_mute(
            peer,
            MuteState {
                is_excluded_from_total_unread_count: false,
            },
        );
    }

    /// Registers a peer whose notification settings live on `associated`.
    pub fn add_peer_with_associated(
        &mut self,
        peer: PeerId,
        associated: PeerId,
        tags: CounterTagSet,
    ) {
        self.peers.insert(
            PeerRecord {
                id: peer,
                associated_peer_id: Some(associated),
            },
            tags,
        );
    }

    pub fn set_inclusion(&mut self, peer: PeerId, inclusion: PeerChatListInclusion) {
        self.inclusion
            .set_inclusion(&self.store, peer, inclusion)
            .expect("inclusion must update");
    }

    pub fn set_top_message(&mut self, peer: PeerId, index: Option<MessageIndex>) {
        self.inclusion
            .set_top_message_index(&self.store, peer, index)
            .expect("top message must update");
    }

    /// Updates the read-state store, recording the pre-change state on the
    /// first touch within the current unit of work.
    pub fn set_read_state(&mut self, peer: PeerId, state: CombinedReadState) {
        let initial = self.read_states.combined_state(peer).unwrap_or_default();
        self.params
            .altered_initial_read_states
            .entry(peer)
            .or_insert(initial);
        self.read_states.set_state(peer, state);
    }

    /// Overrides the recorded pre-change read state outright.
    pub fn force_altered_initial(&mut self, peer: PeerId, state: CombinedReadState) {
        self.params.altered_initial_read_states.insert(peer, state);
    }

    pub fn change_tags(&mut self, peer: PeerId, updated: CounterTagSet) {
        let previous = self.peers.classification_tags(peer);
        self.params
            .peer_tag_transitions
            .entry(peer)
            .and_modify(|transition| transition.updated = updated)
            .or_insert(TagTransition { previous, updated });
        self.peers.set_tags(peer, updated);
    }

    /// Flips the peer's mute setting and records the matching filter-set
    /// entry or exit.
    pub fn set_mute_excluded(&mut self, peer: PeerId, excluded: bool) {
        let counted_before = self
            .mutes
            .effective_mute(peer)
            .map_or(false, |mute| !mute.is_excluded_from_total_unread_count);
        self.mutes.set_mute(
            peer,
            MuteState {
                is_excluded_from_total_unread_count: excluded,
            },
        );

        let counted_after = !excluded;
        if counted_before && !counted_after {
            if !self.params.participation.added.remove(&peer) {
                self.params.participation.removed.insert(peer);
            }
        } else if !counted_before && counted_after {
            if !self.params.participation.removed.remove(&peer) {
                self.params.participation.added.insert(peer);
            }
        }
    }

    pub fn note_participation_removed(&mut self, peer: PeerId) {
        self.params.participation.removed.insert(peer);
    }

    pub fn commit(&mut self) -> CommitOutcome {
        let params = std::mem::take(&mut self.params);
        let mut stores = CommitStores {
            read_states: &self.read_states,
            mutes: &self.mutes,
            peers: &self.peers,
            name_index: &mut self.name_index,
        };

        let outcome = self
            .inclusion
            .commit_with_transaction(
                &mut self.store,
                &mut stores,
                &mut self.totals,
                &mut self.group_stats,
                &self.validation,
                &params,
            )
            .expect("commit must succeed");
        self.inclusion
            .check_clean()
            .expect("snapshot map must be flushed by commit");
        outcome
    }

    pub fn total_state(&mut self) -> ChatListTotalUnreadState {
        self.totals.get(&self.store).expect("totals must load")
    }

    pub fn group_summary(&mut self, group: GroupId) -> PeerGroupUnreadCountersCombinedSummary {
        self.group_stats
            .get(&self.store, group)
            .expect("group summary must load")
    }

    /// Chat-list membership as a real membership table would report it,
    /// derived from the persisted inclusion records.
    pub fn membership(&mut self) -> MemoryChatListMembership {
        let mut membership = MemoryChatListMembership::default();
        let peers = self
            .inclusion
            .get_all_peer_ids(&self.store)
            .expect("scan must succeed");
        for peer in peers {
            if peer.namespace == codec::GROUP_KEY_NAMESPACE {
                continue;
            }
            let record = self
                .inclusion
                .get(&self.store, peer)
                .expect("record must load");
            if let Some((group, _)) = record.included_index(peer) {
                membership.assign(group, peer);
            }
        }
        membership
    }

    pub fn reindex_global(
        &mut self,
    ) -> (
        ChatListTotalUnreadState,
        BTreeMap<GroupId, PeerGroupUnreadCountersCombinedSummary>,
    ) {
        reindex::reindex_unread_counts(
            &mut self.inclusion,
            &self.store,
            &self.read_states,
            &self.mutes,
            &self.peers,
        )
        .expect("global reindex must succeed")
    }

    pub fn reindex_group(&mut self, group: GroupId) -> PeerGroupUnreadCountersCombinedSummary {
        let membership = self.membership();
        reindex::reindex_peer_group_unread_counts(
            &mut self.inclusion,
            &self.store,
            &self.read_states,
            &self.mutes,
            &self.peers,
            &membership,
            group,
        )
        .expect("group reindex must succeed")
    }
}
