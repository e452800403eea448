//! Chat-list membership and unread-count aggregation core of a
//! message-store engine.
//!
//! For every conversation ("peer") this crate tracks whether and where it
//! appears in ordered chat lists ("groups"), the message its list entry is
//! ordered by, and running unread aggregates: one root counter pair per
//! classification tag and one per-group counter pair per message namespace,
//! each in an absolute and a mute-filtered variant. Aggregates are
//! maintained by delta at commit time, touching only altered peers, and can
//! be audited or repaired against a from-scratch recomputation.
//!
//! The surrounding store engine supplies the ordered key-value store, read
//! states, mute settings, the peer directory, and chat-list membership
//! through the narrow contracts in [`infra::contracts`]; all mutations are
//! expected to run inside one exclusive unit of work.

pub mod domain;
pub mod index;
pub mod infra;

#[cfg(test)]
mod test_support;
