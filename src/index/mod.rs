//! Persisted core: inclusion index records, commit-time unread aggregation,
//! and the full-rescan consistency auditor.

pub mod codec;
pub mod commit;
pub mod reindex;
pub mod table;
