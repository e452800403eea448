//! Consistency auditor: full-rescan recomputation of the unread aggregates,
//! never used on the hot commit path. From-scratch results must match what
//! correct incremental maintenance produces from an empty starting state.

use std::collections::BTreeMap;

use crate::domain::counters::{
    ChatListTotalUnreadState, PeerGroupUnreadCountersCombinedSummary, UnreadCounters,
};
use crate::domain::ids::GroupId;
use crate::domain::read_state::CombinedReadState;
use crate::index::codec;
use crate::index::table::InclusionIndexTable;
use crate::infra::contracts::{
    ChatListMembership, KeyValueStore, NotificationMuteStore, PeerDirectory, ReadStateStore,
};
use crate::infra::error::StoreError;

const GLOBAL_REINDEX_COMPLETED: &str = "CHATLIST_GLOBAL_REINDEX_COMPLETED";
const GROUP_REINDEX_COMPLETED: &str = "CHATLIST_GROUP_REINDEX_COMPLETED";

/// Recomputes the root aggregate and every group aggregate from first
/// principles: current read state, tags, mute status and inclusion only.
pub fn reindex_unread_counts(
    inclusion: &mut InclusionIndexTable,
    store: &dyn KeyValueStore,
    read_states: &dyn ReadStateStore,
    mutes: &dyn NotificationMuteStore,
    peers: &dyn PeerDirectory,
) -> Result<
    (
        ChatListTotalUnreadState,
        BTreeMap<GroupId, PeerGroupUnreadCountersCombinedSummary>,
    ),
    StoreError,
> {
    let mut root = ChatListTotalUnreadState::default();
    let mut summaries: BTreeMap<GroupId, PeerGroupUnreadCountersCombinedSummary> = BTreeMap::new();

    let mut scanned = 0usize;
    for peer in inclusion.get_all_peer_ids(store)? {
        if peer.namespace == codec::GROUP_KEY_NAMESPACE {
            continue;
        }
        scanned += 1;

        let Some(peer_record) = peers.get(peer) else {
            continue;
        };
        let Some(combined) = read_states.combined_state(peer) else {
            continue;
        };

        let notification_peer = peer_record.associated_peer_id.unwrap_or(peer);
        let counted = mutes
            .effective_mute(notification_peer)
            .map_or(false, |mute| !mute.is_excluded_from_total_unread_count);

        let record = inclusion.get(store, peer)?;
        let Some((group, _)) = record.included_index(peer) else {
            continue;
        };

        let tags = peers.classification_tags(peer);
        for tag in tags.iter() {
            accumulate_root(root.absolute.entry(tag).or_default(), &combined);
            if counted {
                accumulate_root(root.filtered.entry(tag).or_default(), &combined);
            }
        }

        accumulate_group_summary(summaries.entry(group).or_default(), &combined, counted);
    }

    tracing::debug!(
        code = GLOBAL_REINDEX_COMPLETED,
        peers = scanned,
        groups = summaries.len(),
        "recomputed unread aggregates from scratch"
    );

    Ok((root, summaries))
}

/// Recomputes one group's per-namespace aggregate from scratch, scanning
/// only the peers the membership enumerator lists for that group.
pub fn reindex_peer_group_unread_counts(
    inclusion: &mut InclusionIndexTable,
    store: &dyn KeyValueStore,
    read_states: &dyn ReadStateStore,
    mutes: &dyn NotificationMuteStore,
    peers: &dyn PeerDirectory,
    membership: &dyn ChatListMembership,
    group: GroupId,
) -> Result<PeerGroupUnreadCountersCombinedSummary, StoreError> {
    let mut members = Vec::new();
    membership.for_each_peer(group, &mut |peer| members.push(peer));

    let mut summary = PeerGroupUnreadCountersCombinedSummary::default();
    for peer in members {
        if peer.namespace == codec::GROUP_KEY_NAMESPACE {
            continue;
        }
        let Some(peer_record) = peers.get(peer) else {
            continue;
        };
        let Some(combined) = read_states.combined_state(peer) else {
            continue;
        };

        let notification_peer = peer_record.associated_peer_id.unwrap_or(peer);
        let counted = mutes
            .effective_mute(notification_peer)
            .map_or(false, |mute| !mute.is_excluded_from_total_unread_count);

        let record = inclusion.get(store, peer)?;
        match record.included_index(peer) {
            Some((inclusion_group, _)) if inclusion_group == group => {}
            _ => continue,
        }

        accumulate_group_summary(&mut summary, &combined, counted);
    }

    tracing::debug!(
        code = GROUP_REINDEX_COMPLETED,
        group = %group,
        "recomputed group unread summary from scratch"
    );

    Ok(summary)
}

/// One peer's root contribution: `max(count, marked)` effective messages,
/// one chat while unread. This is the same accounting the commit path
/// applies by delta.
fn accumulate_root(counters: &mut UnreadCounters, combined: &CombinedReadState) {
    let effective = combined.count().max(i32::from(combined.marked_unread()));
    counters.message_count = counters.message_count.saturating_add(effective);
    if combined.is_unread() {
        counters.chat_count += 1;
    }
    counters.clamp_negative();
}

/// One peer's contribution to a group summary: per namespace, a chat while
/// it holds messages plus a chat while explicitly marked, raw message
/// counts; mirrored into the filtered side while the peer is counted.
fn accumulate_group_summary(
    summary: &mut PeerGroupUnreadCountersCombinedSummary,
    combined: &CombinedReadState,
    counted: bool,
) {
    for (namespace, state) in &combined.states {
        let entry = summary.namespaces.entry(*namespace).or_default();
        if state.count > 0 {
            entry.all.chat_count += 1;
            entry.all.message_count = entry.all.message_count.saturating_add(state.count);
            if counted {
                entry.filtered.chat_count += 1;
                entry.filtered.message_count =
                    entry.filtered.message_count.saturating_add(state.count);
            }
        }
        if state.marked_unread {
            entry.all.chat_count += 1;
            if counted {
                entry.filtered.chat_count += 1;
            }
        }
        entry.all.clamp_negative();
        entry.filtered.clamp_negative();
    }
}
