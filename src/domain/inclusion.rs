use super::ids::{ChatListIndex, GroupId, MessageIndex, PeerId};

/// Rule deciding whether and where a peer shows up in a chat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeerChatListInclusion {
    /// The peer never appears in any list.
    #[default]
    NotIncluded,
    /// The peer appears in `group` if it has any message, or unconditionally
    /// while pinned, or, when `min_timestamp` is set, from the moment its
    /// top message reaches that floor time.
    IfHasMessagesOrOneOf {
        group: GroupId,
        pinning_index: Option<u16>,
        min_timestamp: Option<i32>,
    },
}

/// Per-peer inclusion record: the message the list entry is ordered by, and
/// the rule that decides membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PeerInclusionIndex {
    pub top_message_index: Option<MessageIndex>,
    pub inclusion: PeerChatListInclusion,
}

impl PeerInclusionIndex {
    /// The single source of truth for "is this peer visible in a group, and
    /// at which position". Pure and total over the record.
    pub fn included_index(&self, peer: PeerId) -> Option<(GroupId, ChatListIndex)> {
        match self.inclusion {
            PeerChatListInclusion::NotIncluded => None,
            PeerChatListInclusion::IfHasMessagesOrOneOf {
                group,
                pinning_index,
                min_timestamp,
            } => {
                if let Some(min_timestamp) = min_timestamp {
                    // The floor time guarantees visibility: until the real
                    // top message reaches it, a synthetic zero message
                    // stamped at the floor holds the position.
                    let message_index = match self.top_message_index {
                        Some(top) if top.timestamp >= min_timestamp => top,
                        _ => MessageIndex::zero(peer, min_timestamp),
                    };
                    Some((
                        group,
                        ChatListIndex {
                            pinning_index,
                            message_index,
                        },
                    ))
                } else if let Some(top) = self.top_message_index {
                    Some((
                        group,
                        ChatListIndex {
                            pinning_index,
                            message_index: top,
                        },
                    ))
                } else if pinning_index.is_some() {
                    Some((
                        group,
                        ChatListIndex {
                            pinning_index,
                            message_index: MessageIndex::zero(peer, 0),
                        },
                    ))
                } else {
                    None
                }
            }
        }
    }
}
