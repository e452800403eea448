//! Keys and binary record layouts.
//!
//! Keys are 8 bytes, big-endian `(namespace, id)`, so the ordered store
//! scans peers in identity order. Record bodies are little-endian with
//! fixed-width fields.
//!
//! Inclusion record:
//! ```text
//! u8   flags                  (bit0: has top-message index)
//! [if bit0] i32 namespace, i32 message id, i32 timestamp
//! u8   inclusion kind         (0 = not included, 1 = if-has-messages-or-one-of)
//! [if kind 1]
//!   u16 pinning index         (0 = none, else ordinal + 1)
//!   u8  has min timestamp
//!   [if set] i32 min timestamp
//!   i32 group id
//! ```
//!
//! Aggregate records are counted maps: the root record is two `u32`-counted
//! lists of `(u32 tag, i32 messages, i32 chats)` (absolute, then filtered);
//! a group summary record is one `u32`-counted list of
//! `(i32 namespace, i32 all messages, i32 all chats, i32 filtered messages,
//! i32 filtered chats)`.

use std::collections::BTreeMap;

use crate::domain::counters::{
    ChatListTotalUnreadState, PeerGroupUnreadCountersCombinedSummary,
    PeerGroupUnreadCountersSummary, UnreadCounters,
};
use crate::domain::ids::{
    key_value_for_pinning_index, pinning_index_from_key_value, GroupId, MessageId, MessageIndex,
    PeerId,
};
use crate::domain::inclusion::{PeerChatListInclusion, PeerInclusionIndex};
use crate::domain::tags::CounterTag;
use crate::infra::error::StoreError;

/// Reserved key namespace for group-level rows. Peer records never use it,
/// so both kinds of row follow one keying discipline without colliding.
pub const GROUP_KEY_NAMESPACE: i32 = i32::MAX;

const FLAG_HAS_TOP_MESSAGE_INDEX: u8 = 1 << 0;

const INCLUSION_KIND_NOT_INCLUDED: u8 = 0;
const INCLUSION_KIND_IF_HAS_MESSAGES_OR_ONE_OF: u8 = 1;

pub fn peer_key(peer: PeerId) -> [u8; 8] {
    let mut key = [0u8; 8];
    key[..4].copy_from_slice(&peer.namespace.to_be_bytes());
    key[4..].copy_from_slice(&peer.id.to_be_bytes());
    key
}

pub fn peer_from_key(key: &[u8]) -> Result<PeerId, StoreError> {
    if key.len() != 8 {
        return Err(StoreError::TruncatedRecord { record: "peer key" });
    }

    Ok(PeerId {
        namespace: i32::from_be_bytes([key[0], key[1], key[2], key[3]]),
        id: i32::from_be_bytes([key[4], key[5], key[6], key[7]]),
    })
}

pub fn group_key(group: GroupId) -> [u8; 8] {
    peer_key(PeerId::new(GROUP_KEY_NAMESPACE, group.0))
}

struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
    record: &'static str,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8], record: &'static str) -> Self {
        Self {
            data,
            offset: 0,
            record,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], StoreError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(StoreError::TruncatedRecord {
                record: self.record,
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, StoreError> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, StoreError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, StoreError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i32(&mut self) -> Result<i32, StoreError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

pub fn encode_inclusion_index(index: &PeerInclusionIndex) -> Vec<u8> {
    let mut out = Vec::with_capacity(25);

    let mut flags = 0u8;
    if index.top_message_index.is_some() {
        flags |= FLAG_HAS_TOP_MESSAGE_INDEX;
    }
    out.push(flags);

    if let Some(top) = index.top_message_index {
        out.extend_from_slice(&top.id.namespace.to_le_bytes());
        out.extend_from_slice(&top.id.id.to_le_bytes());
        out.extend_from_slice(&top.timestamp.to_le_bytes());
    }

    match index.inclusion {
        PeerChatListInclusion::NotIncluded => out.push(INCLUSION_KIND_NOT_INCLUDED),
        PeerChatListInclusion::IfHasMessagesOrOneOf {
            group,
            pinning_index,
            min_timestamp,
        } => {
            out.push(INCLUSION_KIND_IF_HAS_MESSAGES_OR_ONE_OF);
            out.extend_from_slice(&key_value_for_pinning_index(pinning_index).to_le_bytes());
            match min_timestamp {
                Some(min_timestamp) => {
                    out.push(1);
                    out.extend_from_slice(&min_timestamp.to_le_bytes());
                }
                None => out.push(0),
            }
            out.extend_from_slice(&group.0.to_le_bytes());
        }
    }

    out
}

pub fn decode_inclusion_index(peer: PeerId, data: &[u8]) -> Result<PeerInclusionIndex, StoreError> {
    let mut reader = ByteReader::new(data, "inclusion");

    let flags = reader.read_u8()?;
    let top_message_index = if flags & FLAG_HAS_TOP_MESSAGE_INDEX != 0 {
        let namespace = reader.read_i32()?;
        let id = reader.read_i32()?;
        let timestamp = reader.read_i32()?;
        Some(MessageIndex {
            id: MessageId {
                peer,
                namespace,
                id,
            },
            timestamp,
        })
    } else {
        None
    };

    let inclusion = match reader.read_u8()? {
        INCLUSION_KIND_NOT_INCLUDED => PeerChatListInclusion::NotIncluded,
        INCLUSION_KIND_IF_HAS_MESSAGES_OR_ONE_OF => {
            let pinning_index = pinning_index_from_key_value(reader.read_u16()?);
            let min_timestamp = if reader.read_u8()? != 0 {
                Some(reader.read_i32()?)
            } else {
                None
            };
            let group = GroupId(reader.read_i32()?);
            PeerChatListInclusion::IfHasMessagesOrOneOf {
                group,
                pinning_index,
                min_timestamp,
            }
        }
        kind => return Err(StoreError::CorruptInclusionRecord { peer, kind }),
    };

    Ok(PeerInclusionIndex {
        top_message_index,
        inclusion,
    })
}

pub fn encode_total_unread_state(state: &ChatListTotalUnreadState) -> Vec<u8> {
    let mut out = Vec::new();
    write_counter_map(&mut out, &state.absolute);
    write_counter_map(&mut out, &state.filtered);
    out
}

pub fn decode_total_unread_state(data: &[u8]) -> Result<ChatListTotalUnreadState, StoreError> {
    let mut reader = ByteReader::new(data, "total unread state");
    Ok(ChatListTotalUnreadState {
        absolute: read_counter_map(&mut reader)?,
        filtered: read_counter_map(&mut reader)?,
    })
}

fn write_counter_map(out: &mut Vec<u8>, map: &BTreeMap<CounterTag, UnreadCounters>) {
    out.extend_from_slice(&(map.len() as u32).to_le_bytes());
    for (tag, counters) in map {
        out.extend_from_slice(&tag.0.to_le_bytes());
        out.extend_from_slice(&counters.message_count.to_le_bytes());
        out.extend_from_slice(&counters.chat_count.to_le_bytes());
    }
}

fn read_counter_map(
    reader: &mut ByteReader<'_>,
) -> Result<BTreeMap<CounterTag, UnreadCounters>, StoreError> {
    let len = reader.read_u32()?;
    let mut map = BTreeMap::new();
    for _ in 0..len {
        let tag = CounterTag(reader.read_u32()?);
        let message_count = reader.read_i32()?;
        let chat_count = reader.read_i32()?;
        map.insert(
            tag,
            UnreadCounters {
                message_count,
                chat_count,
            },
        );
    }
    Ok(map)
}

pub fn encode_group_summary(summary: &PeerGroupUnreadCountersCombinedSummary) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(summary.namespaces.len() as u32).to_le_bytes());
    for (namespace, counters) in &summary.namespaces {
        out.extend_from_slice(&namespace.to_le_bytes());
        out.extend_from_slice(&counters.all.message_count.to_le_bytes());
        out.extend_from_slice(&counters.all.chat_count.to_le_bytes());
        out.extend_from_slice(&counters.filtered.message_count.to_le_bytes());
        out.extend_from_slice(&counters.filtered.chat_count.to_le_bytes());
    }
    out
}

pub fn decode_group_summary(
    data: &[u8],
) -> Result<PeerGroupUnreadCountersCombinedSummary, StoreError> {
    let mut reader = ByteReader::new(data, "group summary");
    let len = reader.read_u32()?;
    let mut namespaces = BTreeMap::new();
    for _ in 0..len {
        let namespace = reader.read_i32()?;
        let all = UnreadCounters {
            message_count: reader.read_i32()?,
            chat_count: reader.read_i32()?,
        };
        let filtered = UnreadCounters {
            message_count: reader.read_i32()?,
            chat_count: reader.read_i32()?,
        };
        namespaces.insert(namespace, PeerGroupUnreadCountersSummary { all, filtered });
    }
    Ok(PeerGroupUnreadCountersCombinedSummary { namespaces })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEER: PeerId = PeerId { namespace: 0, id: 42 };

    fn sample_indices() -> Vec<PeerInclusionIndex> {
        let top = MessageIndex {
            id: MessageId {
                peer: PEER,
                namespace: 2,
                id: 9_001,
            },
            timestamp: 1_600_000_000,
        };

        vec![
            PeerInclusionIndex::default(),
            PeerInclusionIndex {
                top_message_index: Some(top),
                inclusion: PeerChatListInclusion::NotIncluded,
            },
            PeerInclusionIndex {
                top_message_index: Some(top),
                inclusion: PeerChatListInclusion::IfHasMessagesOrOneOf {
                    group: GroupId(1),
                    pinning_index: None,
                    min_timestamp: None,
                },
            },
            PeerInclusionIndex {
                top_message_index: None,
                inclusion: PeerChatListInclusion::IfHasMessagesOrOneOf {
                    group: GroupId(-7),
                    pinning_index: Some(0),
                    min_timestamp: Some(12_345),
                },
            },
        ]
    }

    #[test]
    fn inclusion_records_round_trip() {
        for index in sample_indices() {
            let encoded = encode_inclusion_index(&index);
            let decoded = decode_inclusion_index(PEER, &encoded).expect("must decode");

            assert_eq!(decoded, index);
        }
    }

    #[test]
    fn unknown_inclusion_kind_is_a_corruption_error() {
        let mut encoded = encode_inclusion_index(&PeerInclusionIndex::default());
        *encoded.last_mut().expect("record has a kind byte") = 9;

        let error = decode_inclusion_index(PEER, &encoded).expect_err("must fail");

        assert!(matches!(
            error,
            StoreError::CorruptInclusionRecord { peer: PEER, kind: 9 }
        ));
    }

    #[test]
    fn short_record_is_a_truncation_error() {
        let encoded = encode_inclusion_index(&PeerInclusionIndex {
            top_message_index: Some(MessageIndex::zero(PEER, 5)),
            inclusion: PeerChatListInclusion::NotIncluded,
        });

        let error = decode_inclusion_index(PEER, &encoded[..encoded.len() - 2]).expect_err("must fail");

        assert!(matches!(error, StoreError::TruncatedRecord { .. }));
    }

    #[test]
    fn peer_keys_round_trip_and_order_by_identity() {
        let first = PeerId::new(0, 5);
        let second = PeerId::new(0, 6);
        let third = PeerId::new(1, 0);

        assert_eq!(peer_from_key(&peer_key(first)).expect("must decode"), first);
        assert!(peer_key(first) < peer_key(second));
        assert!(peer_key(second) < peer_key(third));
    }

    #[test]
    fn group_keys_use_the_reserved_namespace() {
        let key = group_key(GroupId(3));
        let decoded = peer_from_key(&key).expect("must decode");

        assert_eq!(decoded.namespace, GROUP_KEY_NAMESPACE);
        assert_eq!(decoded.id, 3);
    }

    #[test]
    fn total_unread_state_round_trips() {
        let mut state = ChatListTotalUnreadState::default();
        state.absolute.insert(
            CounterTag(1),
            UnreadCounters {
                message_count: 10,
                chat_count: 2,
            },
        );
        state.absolute.insert(
            CounterTag(4),
            UnreadCounters {
                message_count: 1,
                chat_count: 1,
            },
        );
        state.filtered.insert(
            CounterTag(1),
            UnreadCounters {
                message_count: 7,
                chat_count: 1,
            },
        );

        let decoded =
            decode_total_unread_state(&encode_total_unread_state(&state)).expect("must decode");

        assert_eq!(decoded, state);
    }

    #[test]
    fn group_summary_round_trips() {
        let mut summary = PeerGroupUnreadCountersCombinedSummary::default();
        summary.namespaces.insert(
            0,
            PeerGroupUnreadCountersSummary {
                all: UnreadCounters {
                    message_count: 5,
                    chat_count: 2,
                },
                filtered: UnreadCounters {
                    message_count: 3,
                    chat_count: 1,
                },
            },
        );

        let decoded = decode_group_summary(&encode_group_summary(&summary)).expect("must decode");

        assert_eq!(decoded, summary);
    }
}
