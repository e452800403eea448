use std::cmp::Ordering;
use std::fmt;

/// Message sub-category used to partition unread counters
/// (e.g. regular vs. scheduled messages).
pub type MessageNamespace = i32;

/// Identity of a conversation endpoint: a user, a group chat or a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId {
    pub namespace: i32,
    pub id: i32,
}

impl PeerId {
    pub fn new(namespace: i32, id: i32) -> Self {
        Self { namespace, id }
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

/// Top-level container a chat list is organized into (e.g. main list vs.
/// archive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub i32);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageId {
    pub peer: PeerId,
    pub namespace: MessageNamespace,
    pub id: i32,
}

/// Position of a message in a peer's timeline. Totally ordered by timestamp
/// first, then by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageIndex {
    pub id: MessageId,
    pub timestamp: i32,
}

impl MessageIndex {
    /// Synthetic zero message placed at `timestamp`, used when a peer must
    /// appear in a list without a real top message.
    pub fn zero(peer: PeerId, timestamp: i32) -> Self {
        Self {
            id: MessageId {
                peer,
                namespace: 0,
                id: 0,
            },
            timestamp,
        }
    }
}

impl PartialOrd for MessageIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MessageIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Ordering key of a chat list entry. A greater index sorts closer to the
/// top of the list: pinned entries sort above unpinned ones, a lower pinning
/// ordinal wins among pinned entries, and unpinned entries order by message
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChatListIndex {
    pub pinning_index: Option<u16>,
    pub message_index: MessageIndex,
}

impl PartialOrd for ChatListIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChatListIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.pinning_index, other.pinning_index) {
            (Some(lhs), Some(rhs)) => rhs
                .cmp(&lhs)
                .then_with(|| self.message_index.cmp(&other.message_index)),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => self.message_index.cmp(&other.message_index),
        }
    }
}

/// Decodes the wire form of an optional pinning ordinal: `0` means "not
/// pinned", any other value is the ordinal plus one.
pub fn pinning_index_from_key_value(value: u16) -> Option<u16> {
    if value == 0 {
        None
    } else {
        Some(value - 1)
    }
}

/// Inverse of [`pinning_index_from_key_value`].
pub fn key_value_for_pinning_index(index: Option<u16>) -> u16 {
    match index {
        Some(index) => index + 1,
        None => 0,
    }
}
