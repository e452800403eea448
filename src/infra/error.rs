use std::path::PathBuf;

use thiserror::Error;

use crate::domain::ids::PeerId;

#[derive(Debug, Error)]
pub enum StoreError {
    /// An inclusion record carries an inclusion-kind tag this build does not
    /// know. Records are assumed structurally trustworthy; there is no
    /// forward-compatible tolerance for unknown variants.
    #[error("corrupt inclusion record for peer {peer}: unknown inclusion kind {kind}")]
    CorruptInclusionRecord { peer: PeerId, kind: u8 },
    #[error("truncated {record} record")]
    TruncatedRecord { record: &'static str },
    /// The per-unit-of-work snapshot map survived past a commit boundary.
    /// This is a logic bug in the enclosing transaction machinery, never a
    /// data problem.
    #[error("dirty inclusion snapshots not flushed: {count} peers pending")]
    DirtySnapshotsNotFlushed { count: usize },
    #[error("failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
