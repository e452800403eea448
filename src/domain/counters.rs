use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::MessageNamespace;
use super::tags::CounterTag;

/// A pair of running unread totals. Persisted values are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnreadCounters {
    pub message_count: i32,
    pub chat_count: i32,
}

impl UnreadCounters {
    /// Clamps both counters at zero. Delta maintenance can transiently drive
    /// a counter below zero; a negative value must never reach a persisted
    /// record or a downstream consumer.
    pub fn clamp_negative(&mut self) {
        if self.message_count < 0 {
            self.message_count = 0;
        }
        if self.chat_count < 0 {
            self.chat_count = 0;
        }
    }
}

/// Root unread aggregate: one counter pair per classification tag, in an
/// absolute variant and a variant excluding muted peers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatListTotalUnreadState {
    pub absolute: BTreeMap<CounterTag, UnreadCounters>,
    pub filtered: BTreeMap<CounterTag, UnreadCounters>,
}

/// Unread totals of one message namespace within one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerGroupUnreadCountersSummary {
    pub all: UnreadCounters,
    pub filtered: UnreadCounters,
}

/// Per-group unread aggregate, partitioned by message namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PeerGroupUnreadCountersCombinedSummary {
    pub namespaces: BTreeMap<MessageNamespace, PeerGroupUnreadCountersSummary>,
}
