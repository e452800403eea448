//! Commit-time unread aggregation.
//!
//! Runs once per unit of work, only when something relevant changed: a
//! peer's inclusion record, its read state, its classification tags, or its
//! membership in the "counted toward totals" filter set. Aggregates are
//! adjusted by delta, touching only altered peers, and only peers and
//! groups that actually changed are written back.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::domain::counters::{
    ChatListTotalUnreadState, PeerGroupUnreadCountersCombinedSummary,
    PeerGroupUnreadCountersSummary, UnreadCounters,
};
use crate::domain::ids::{GroupId, MessageNamespace, PeerId};
use crate::domain::read_state::{CombinedReadState, NamespaceReadState};
use crate::domain::tags::{CounterTag, CounterTagSet};
use crate::index::codec;
use crate::index::table::{GroupStatsTable, InclusionIndexTable, TotalUnreadStateTable};
use crate::infra::config::ValidationConfig;
use crate::infra::contracts::{
    KeyValueStore, NameIndex, NotificationMuteStore, PeerDirectory, ReadStateStore,
};
use crate::infra::error::StoreError;

const INCLUSION_RECORDS_PERSISTED: &str = "CHATLIST_INCLUSION_RECORDS_PERSISTED";
const ROOT_UNREAD_STATE_CHANGED: &str = "CHATLIST_ROOT_UNREAD_STATE_CHANGED";
const GROUP_UNREAD_SUMMARY_CHANGED: &str = "CHATLIST_GROUP_UNREAD_SUMMARY_CHANGED";
const GROUP_STATS_VALIDATION_DEFERRED: &str = "CHATLIST_GROUP_STATS_VALIDATION_DEFERRED";

/// External stores consulted while applying a commit.
pub struct CommitStores<'a> {
    pub read_states: &'a dyn ReadStateStore,
    pub mutes: &'a dyn NotificationMuteStore,
    pub peers: &'a dyn PeerDirectory,
    pub name_index: &'a mut dyn NameIndex,
}

/// Classification tags of one peer before and after the unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTransition {
    pub previous: CounterTagSet,
    pub updated: CounterTagSet,
}

/// Peers that entered or left the "counted toward totals" filter set during
/// the unit of work.
#[derive(Debug, Clone, Default)]
pub struct ParticipationUpdates {
    pub added: HashSet<PeerId>,
    pub removed: HashSet<PeerId>,
}

impl ParticipationUpdates {
    fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// What else changed during the unit of work, as reported by the enclosing
/// transaction machinery.
#[derive(Debug, Clone, Default)]
pub struct CommitParams {
    /// Read states as they were before this unit of work, for every peer
    /// whose read state changed. An empty state means the peer had none.
    pub altered_initial_read_states: HashMap<PeerId, CombinedReadState>,
    /// Tag transitions for every peer whose peer object was updated.
    /// Transitions with equal sides are ignored.
    pub peer_tag_transitions: HashMap<PeerId, TagTransition>,
    pub participation: ParticipationUpdates,
}

/// Aggregates that actually changed, for downstream notification, plus
/// namespace/group pairs whose counters need external revalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub updated_total_unread_state: Option<ChatListTotalUnreadState>,
    pub updated_group_summaries: BTreeMap<GroupId, PeerGroupUnreadCountersCombinedSummary>,
    pub validation_requests: BTreeSet<(GroupId, MessageNamespace)>,
}

/// A peer's whole-state unread contribution at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Contribution {
    count: i32,
    is_unread: bool,
    marked_unread: bool,
}

impl Contribution {
    fn of(state: &CombinedReadState) -> Self {
        Self {
            count: state.count(),
            is_unread: state.is_unread(),
            marked_unread: state.marked_unread(),
        }
    }
}

impl InclusionIndexTable {
    /// Applies the unit of work: classifies group deltas for every touched
    /// peer, persists their records, flushes the snapshot map, and adjusts
    /// the root and per-group aggregates for every altered peer.
    pub fn commit_with_transaction(
        &mut self,
        store: &mut dyn KeyValueStore,
        stores: &mut CommitStores<'_>,
        totals: &mut TotalUnreadStateTable,
        group_stats: &mut GroupStatsTable,
        validation: &ValidationConfig,
        params: &CommitParams,
    ) -> Result<CommitOutcome, StoreError> {
        let mut outcome = CommitOutcome::default();

        let updated_peer_tags: HashMap<PeerId, TagTransition> = params
            .peer_tag_transitions
            .iter()
            .filter(|(_, transition)| transition.previous != transition.updated)
            .map(|(peer, transition)| (*peer, *transition))
            .collect();

        if self.updated_previous_peer_indices.is_empty()
            && params.altered_initial_read_states.is_empty()
            && updated_peer_tags.is_empty()
            && params.participation.is_empty()
        {
            return Ok(outcome);
        }

        let mut added_to_group: HashMap<PeerId, GroupId> = HashMap::new();
        let mut removed_from_group: HashMap<PeerId, GroupId> = HashMap::new();
        let mut added_to_index: HashSet<PeerId> = HashSet::new();
        let mut removed_from_index: HashSet<PeerId> = HashSet::new();

        let mut dirty: Vec<(PeerId, crate::domain::inclusion::PeerInclusionIndex)> =
            self.updated_previous_peer_indices.drain().collect();
        dirty.sort_by_key(|(peer, _)| *peer);

        for (peer, previous) in &dirty {
            let peer = *peer;
            // Setters cache the updated value, and cache clears are refused
            // while snapshots are pending.
            let Some(current) = self.cached_peer_indices.get(&peer).copied() else {
                continue;
            };

            if let Some((current_group, _)) = current.included_index(peer) {
                let previous_group = previous.included_index(peer).map(|(group, _)| group);
                if previous_group != Some(current_group) {
                    added_to_group.insert(peer, current_group);
                    match previous_group {
                        Some(previous_group) => {
                            removed_from_group.insert(peer, previous_group);
                        }
                        None => {
                            added_to_index.insert(peer);
                        }
                    }
                }
            } else if let Some((previous_group, _)) = previous.included_index(peer) {
                removed_from_group.insert(peer, previous_group);
                removed_from_index.insert(peer);
            }

            store.set(
                self.table,
                &codec::peer_key(peer),
                codec::encode_inclusion_index(&current),
            );
        }

        if !dirty.is_empty() {
            tracing::debug!(
                code = INCLUSION_RECORDS_PERSISTED,
                records = dirty.len(),
                "persisted updated inclusion records"
            );
        }

        for peer in &added_to_index {
            stores.name_index.set_chat_list_inclusion(*peer, true);
        }
        for peer in &removed_from_index {
            stores.name_index.set_chat_list_inclusion(*peer, false);
        }

        let mut altered_peers: BTreeSet<PeerId> = BTreeSet::new();
        altered_peers.extend(params.altered_initial_read_states.keys().copied());
        altered_peers.extend(added_to_group.keys().copied());
        altered_peers.extend(removed_from_group.keys().copied());
        altered_peers.extend(params.participation.added.iter().copied());
        altered_peers.extend(params.participation.removed.iter().copied());
        altered_peers.extend(updated_peer_tags.keys().copied());

        let baseline_root = totals.get(store)?;
        let mut working_root = baseline_root.clone();
        let mut working_groups: BTreeMap<GroupId, PeerGroupUnreadCountersCombinedSummary> =
            BTreeMap::new();

        for peer in altered_peers {
            let Some(peer_record) = stores.peers.get(peer) else {
                continue;
            };
            let notification_peer = peer_record.associated_peer_id.unwrap_or(peer);

            let initial_read_state = params
                .altered_initial_read_states
                .get(&peer)
                .cloned()
                .or_else(|| stores.read_states.combined_state(peer));
            let current_read_state = stores.read_states.combined_state(peer);

            let current_group = self.get(store, peer)?.included_index(peer).map(|(group, _)| group);

            let mut groups: Vec<GroupId> = Vec::new();
            if let Some(group) = current_group {
                groups.push(group);
            }
            for source in [added_to_group.get(&peer), removed_from_group.get(&peer)] {
                if let Some(group) = source {
                    if !groups.contains(group) {
                        groups.push(*group);
                    }
                }
            }

            for group in groups {
                let mut summary = match working_groups.get(&group) {
                    Some(summary) => summary.clone(),
                    None => group_stats.get(store, group)?,
                };

                let mut initial_value = Contribution::default();
                let mut current_value = Contribution::default();
                let mut initial_states = CombinedReadState::default();
                let mut current_states = CombinedReadState::default();

                // A peer added to this group contributes only its current
                // value here; a removed peer only its initial value.
                if added_to_group.get(&peer) == Some(&group) {
                    if let Some(state) = &current_read_state {
                        current_value = Contribution::of(state);
                        current_states = state.clone();
                    }
                } else if removed_from_group.get(&peer) == Some(&group) {
                    if let Some(state) = &initial_read_state {
                        initial_value = Contribution::of(state);
                        initial_states = state.clone();
                    }
                } else if current_group == Some(group) {
                    if let Some(state) = &initial_read_state {
                        initial_value = Contribution::of(state);
                        initial_states = state.clone();
                    }
                    if let Some(state) = &current_read_state {
                        current_value = Contribution::of(state);
                        current_states = state.clone();
                    }
                }

                let mut initial_filtered_value = initial_value;
                let mut current_filtered_value = current_value;
                let mut initial_filtered_states = initial_states.clone();
                let mut current_filtered_states = current_states.clone();

                // Entry into or exit from the filter set this unit of work
                // overrides the steady-state mute flag, which already
                // reflects the post-change settings.
                if params.participation.added.contains(&peer) {
                    initial_filtered_value = Contribution::default();
                    initial_filtered_states = CombinedReadState::default();
                } else if params.participation.removed.contains(&peer) {
                    current_filtered_value = Contribution::default();
                    current_filtered_states = CombinedReadState::default();
                } else {
                    let counted = stores
                        .mutes
                        .effective_mute(notification_peer)
                        .map_or(false, |mute| !mute.is_excluded_from_total_unread_count);
                    if !counted {
                        initial_filtered_value = Contribution::default();
                        current_filtered_value = Contribution::default();
                        initial_filtered_states = CombinedReadState::default();
                        current_filtered_states = CombinedReadState::default();
                    }
                }

                let mut kept_tags = stores.peers.classification_tags(peer);
                if let Some(transition) = updated_peer_tags.get(&peer) {
                    kept_tags = kept_tags
                        .without(transition.previous)
                        .without(transition.updated);

                    for tag in transition.previous.iter() {
                        alter_tag(&mut working_root, tag, |absolute, filtered| {
                            subtract_contribution(absolute, initial_value);
                            subtract_contribution(filtered, initial_filtered_value);
                        });
                    }
                    for tag in transition.updated.iter() {
                        alter_tag(&mut working_root, tag, |absolute, filtered| {
                            add_contribution(absolute, current_value);
                            add_contribution(filtered, current_filtered_value);
                        });
                    }
                }
                for tag in kept_tags.iter() {
                    alter_tag(&mut working_root, tag, |absolute, filtered| {
                        apply_net_delta(absolute, initial_value, current_value);
                        apply_net_delta(filtered, initial_filtered_value, current_filtered_value);
                    });
                }

                let mut namespaces: BTreeSet<MessageNamespace> = BTreeSet::new();
                namespaces.extend(initial_states.states.iter().map(|(namespace, _)| *namespace));
                namespaces.extend(current_states.states.iter().map(|(namespace, _)| *namespace));

                let freshly_added = added_to_group.get(&peer) == Some(&group)
                    && !removed_from_group.contains_key(&peer);

                for namespace in namespaces {
                    if validation.requires_validation(namespace) && freshly_added {
                        // Historical counts for a first-time join may be
                        // unknown locally; a delta would bake the gap in.
                        outcome.validation_requests.insert((group, namespace));
                        tracing::debug!(
                            code = GROUP_STATS_VALIDATION_DEFERRED,
                            group = %group,
                            namespace,
                            peer = %peer,
                            "deferring group counters to external revalidation"
                        );
                        continue;
                    }

                    let mut namespace_summary = summary
                        .namespaces
                        .get(&namespace)
                        .copied()
                        .unwrap_or_default();
                    alter_namespace(
                        &mut namespace_summary,
                        initial_states.state(namespace),
                        current_states.state(namespace),
                        initial_filtered_states.state(namespace),
                        current_filtered_states.state(namespace),
                    );
                    summary.namespaces.insert(namespace, namespace_summary);
                }

                working_groups.insert(group, summary);
            }
        }

        if working_root != baseline_root {
            totals.set(store, working_root.clone());
            tracing::debug!(code = ROOT_UNREAD_STATE_CHANGED, "root unread state changed");
            outcome.updated_total_unread_state = Some(working_root);
        }

        for (group, summary) in working_groups {
            if group_stats.get(store, group)? != summary {
                group_stats.set(store, group, summary.clone());
                tracing::debug!(
                    code = GROUP_UNREAD_SUMMARY_CHANGED,
                    group = %group,
                    "group unread summary changed"
                );
                outcome.updated_group_summaries.insert(group, summary);
            }
        }

        Ok(outcome)
    }
}

fn alter_tag(
    state: &mut ChatListTotalUnreadState,
    tag: CounterTag,
    apply: impl FnOnce(&mut UnreadCounters, &mut UnreadCounters),
) {
    let absolute = state.absolute.entry(tag).or_default();
    let filtered = state.filtered.entry(tag).or_default();
    apply(absolute, filtered);
    absolute.clamp_negative();
    filtered.clamp_negative();
}

fn subtract_contribution(counters: &mut UnreadCounters, value: Contribution) {
    counters.message_count -= value.count;
    if value.is_unread {
        counters.chat_count -= 1;
    }
    if value.marked_unread && value.count == 0 {
        counters.message_count -= 1;
    }
}

fn add_contribution(counters: &mut UnreadCounters, value: Contribution) {
    counters.message_count += value.count;
    if value.marked_unread && value.count == 0 {
        counters.message_count += 1;
    }
    if value.is_unread {
        counters.chat_count += 1;
    }
}

/// Net adjustment for a peer whose tag membership did not change: the chat
/// count flips with the unread flag, and the effective message contribution
/// is `max(count, marked)` so a zero-count marked-unread chat still counts
/// as one message.
fn apply_net_delta(counters: &mut UnreadCounters, initial: Contribution, current: Contribution) {
    let chat_difference = if initial.is_unread != current.is_unread {
        if initial.is_unread {
            -1
        } else {
            1
        }
    } else {
        0
    };

    let message_difference = current.count.max(i32::from(current.marked_unread))
        - initial.count.max(i32::from(initial.marked_unread));

    counters.message_count += message_difference;
    counters.chat_count += chat_difference;
}

/// Applies one peer's per-namespace read-state change to a group summary.
/// Chat counts flip on count transitions through zero and on explicit
/// mark-unread transitions; the filtered side is driven by the filtered
/// states on both sides of each transition.
fn alter_namespace(
    summary: &mut PeerGroupUnreadCountersSummary,
    previous: Option<NamespaceReadState>,
    updated: Option<NamespaceReadState>,
    previous_filtered: Option<NamespaceReadState>,
    updated_filtered: Option<NamespaceReadState>,
) {
    let previous_count = previous.map_or(0, |state| state.count);
    let updated_count = updated.map_or(0, |state| state.count);
    if previous_count != updated_count {
        if (previous_count != 0) != (updated_count != 0) {
            if updated_count != 0 {
                summary.all.chat_count += 1;
            } else {
                summary.all.chat_count = (summary.all.chat_count - 1).max(0);
            }
        }
        summary.all.message_count =
            (summary.all.message_count + updated_count - previous_count).max(0);
    }
    let previous_marked = previous.map_or(false, |state| state.marked_unread);
    let updated_marked = updated.map_or(false, |state| state.marked_unread);
    if previous_marked != updated_marked {
        if previous_marked {
            summary.all.chat_count -= 1;
        } else {
            summary.all.chat_count += 1;
        }
    }

    let previous_filtered_count = previous_filtered.map_or(0, |state| state.count);
    let updated_filtered_count = updated_filtered.map_or(0, |state| state.count);
    if previous_filtered_count != updated_filtered_count {
        if (previous_filtered_count != 0) != (updated_filtered_count != 0) {
            if updated_filtered_count != 0 {
                summary.filtered.chat_count += 1;
            } else {
                summary.filtered.chat_count = (summary.filtered.chat_count - 1).max(0);
            }
        }
        summary.filtered.message_count =
            (summary.filtered.message_count + updated_filtered_count - previous_filtered_count)
                .max(0);
    }
    let previous_filtered_marked = previous_filtered.map_or(false, |state| state.marked_unread);
    let updated_filtered_marked = updated_filtered.map_or(false, |state| state.marked_unread);
    if previous_filtered_marked != updated_filtered_marked {
        if previous_filtered_marked {
            summary.filtered.chat_count -= 1;
        } else {
            summary.filtered.chat_count += 1;
        }
    }

    summary.all.clamp_negative();
    summary.filtered.clamp_negative();
}
