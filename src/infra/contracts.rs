//! Collaborator contracts. The core consumes its surroundings through these
//! narrow interfaces only; missing data means "no contribution", never an
//! error.

use crate::domain::ids::{GroupId, PeerId};
use crate::domain::read_state::CombinedReadState;
use crate::domain::tags::CounterTagSet;

/// Identifies one keyed table inside the ordered store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub i32);

/// Ordered byte-keyed store. Callers group mutations transactionally; the
/// core never manages durability itself.
pub trait KeyValueStore {
    fn get(&self, table: TableId, key: &[u8]) -> Option<Vec<u8>>;
    fn set(&mut self, table: TableId, key: &[u8], value: Vec<u8>);
    /// Visits keys starting with `prefix` in ascending byte order until the
    /// visitor returns `false`. An empty prefix visits every key.
    fn scan_keys(&self, table: TableId, prefix: &[u8], visit: &mut dyn FnMut(&[u8]) -> bool);
}

pub trait ReadStateStore {
    fn combined_state(&self, peer: PeerId) -> Option<CombinedReadState>;
}

/// Effective notification-mute settings of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MuteState {
    pub is_excluded_from_total_unread_count: bool,
}

pub trait NotificationMuteStore {
    fn effective_mute(&self, peer: PeerId) -> Option<MuteState>;
}

/// The slice of a peer object this core needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: PeerId,
    /// Peer whose notification settings govern this one (e.g. a channel's
    /// linked discussion group).
    pub associated_peer_id: Option<PeerId>,
}

pub trait PeerDirectory {
    fn get(&self, peer: PeerId) -> Option<PeerRecord>;
    fn classification_tags(&self, peer: PeerId) -> CounterTagSet;
}

/// Enumerates the peers currently listed in one group.
pub trait ChatListMembership {
    fn for_each_peer(&self, group: GroupId, visit: &mut dyn FnMut(PeerId));
}

/// Name/search index membership flag for peers entering or leaving the chat
/// list entirely.
pub trait NameIndex {
    fn set_chat_list_inclusion(&mut self, peer: PeerId, included: bool);
}
