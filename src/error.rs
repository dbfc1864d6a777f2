//! The engine's structured error taxonomy (spec §7).

use std::io;

/// Failure reported by a [`crate::publish::Publisher`].
///
/// `Transient` signals transport backpressure; under the current contract the
/// engine treats it as fatal (see spec §7, §9) rather than retrying.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish transport refused message (backpressure): {0}")]
    Transient(String),
    #[error("publish transport unusable: {0}")]
    Fatal(String),
}

/// Top-level engine error. Every fatal condition in spec §7 has a variant
/// here; per-event, non-fatal conditions (`InodeDecodeOutOfRange`) are
/// reported separately via [`InodeDecodeOutOfRange`] and never reach this
/// type, since they are logged and skipped rather than propagated.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The catalog violates the document schema or a structural invariant.
    #[error("index corrupt at offset {offset}: {reason}")]
    IndexCorrupt { reason: String, offset: u64 },

    /// A write-event header or body was shorter than declared.
    #[error("write stream truncated: {0}")]
    StreamTruncated(String),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl EngineError {
    pub(crate) fn corrupt(reason: impl Into<String>, offset: u64) -> Self {
        Self::IndexCorrupt {
            reason: reason.into(),
            offset,
        }
    }
}

/// The computed inode offset for a write fell outside the write's data
/// buffer. Per-event only: the caller logs a warning and skips the file,
/// inspection of the rest of the write continues.
#[derive(Debug, thiserror::Error)]
#[error("inode offset {offset} (len {len}) exceeds write buffer of {buf_len} bytes")]
pub struct InodeDecodeOutOfRange {
    pub offset: usize,
    pub len: usize,
    pub buf_len: usize,
}
