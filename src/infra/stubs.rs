//! In-memory implementations of every collaborator contract, used by this
//! crate's tests and exported so embedders can test their glue without a
//! real store.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::ids::{GroupId, PeerId};
use crate::domain::read_state::CombinedReadState;
use crate::domain::tags::CounterTagSet;
use crate::infra::contracts::{
    ChatListMembership, KeyValueStore, MuteState, NameIndex, NotificationMuteStore, PeerDirectory,
    PeerRecord, ReadStateStore, TableId,
};

#[derive(Debug, Clone, Default)]
pub struct MemoryKeyValueStore {
    tables: BTreeMap<TableId, BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, table: TableId, key: &[u8]) -> Option<Vec<u8>> {
        self.tables.get(&table)?.get(key).cloned()
    }

    fn set(&mut self, table: TableId, key: &[u8], value: Vec<u8>) {
        self.tables
            .entry(table)
            .or_default()
            .insert(key.to_vec(), value);
    }

    fn scan_keys(&self, table: TableId, prefix: &[u8], visit: &mut dyn FnMut(&[u8]) -> bool) {
        let Some(rows) = self.tables.get(&table) else {
            return;
        };

        for key in rows
            .range(prefix.to_vec()..)
            .map(|(key, _)| key)
            .take_while(|key| key.starts_with(prefix))
        {
            if !visit(key) {
                return;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryReadStateStore {
    states: HashMap<PeerId, CombinedReadState>,
}

impl MemoryReadStateStore {
    pub fn set_state(&mut self, peer: PeerId, state: CombinedReadState) {
        self.states.insert(peer, state);
    }

    pub fn remove_state(&mut self, peer: PeerId) {
        self.states.remove(&peer);
    }
}

impl ReadStateStore for MemoryReadStateStore {
    fn combined_state(&self, peer: PeerId) -> Option<CombinedReadState> {
        self.states.get(&peer).cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryMuteStore {
    settings: HashMap<PeerId, MuteState>,
}

impl MemoryMuteStore {
    pub fn set_mute(&mut self, peer: PeerId, state: MuteState) {
        self.settings.insert(peer, state);
    }

    pub fn remove_mute(&mut self, peer: PeerId) {
        self.settings.remove(&peer);
    }
}

impl NotificationMuteStore for MemoryMuteStore {
    fn effective_mute(&self, peer: PeerId) -> Option<MuteState> {
        self.settings.get(&peer).copied()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPeerDirectory {
    peers: HashMap<PeerId, PeerRecord>,
    tags: HashMap<PeerId, CounterTagSet>,
}

impl MemoryPeerDirectory {
    pub fn insert(&mut self, record: PeerRecord, tags: CounterTagSet) {
        self.tags.insert(record.id, tags);
        self.peers.insert(record.id, record);
    }

    pub fn set_tags(&mut self, peer: PeerId, tags: CounterTagSet) {
        self.tags.insert(peer, tags);
    }
}

impl PeerDirectory for MemoryPeerDirectory {
    fn get(&self, peer: PeerId) -> Option<PeerRecord> {
        self.peers.get(&peer).copied()
    }

    fn classification_tags(&self, peer: PeerId) -> CounterTagSet {
        self.tags.get(&peer).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryChatListMembership {
    members: BTreeMap<GroupId, BTreeSet<PeerId>>,
}

impl MemoryChatListMembership {
    pub fn assign(&mut self, group: GroupId, peer: PeerId) {
        self.members.entry(group).or_default().insert(peer);
    }
}

impl ChatListMembership for MemoryChatListMembership {
    fn for_each_peer(&self, group: GroupId, visit: &mut dyn FnMut(PeerId)) {
        let Some(members) = self.members.get(&group) else {
            return;
        };

        for peer in members {
            visit(*peer);
        }
    }
}

/// Records the most recent inclusion flag reported for each peer.
#[derive(Debug, Clone, Default)]
pub struct RecordingNameIndex {
    pub included: BTreeMap<PeerId, bool>,
}

impl NameIndex for RecordingNameIndex {
    fn set_chat_list_inclusion(&mut self, peer: PeerId, included: bool) {
        self.included.insert(peer, included);
    }
}
