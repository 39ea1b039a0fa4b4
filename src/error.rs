//! The crate's single error type.
//!
//! The reference implementation reported failures as distinct negative
//! integers returned alongside (or instead of) a success value. A safe Rust
//! API reports them as a typed `Result` instead; the mapping from §7 of the
//! specification to these variants is one-to-one, plus a handful of
//! invariant violations ([`BlockOutOfRange`](FsError::BlockOutOfRange),
//! [`InvalidHandle`](FsError::InvalidHandle),
//! [`NotMounted`](FsError::NotMounted)) that the original left as undefined
//! behavior on its raw C arrays.
use thiserror::Error;

/// Everything that can go wrong while using a [`Volume`](crate::Volume).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FsError {
    /// A file name reached or exceeded the configured maximum length.
    #[error("path too long")]
    PathTooLong,
    /// `create` was called with a name that already names a live file.
    #[error("file already exists")]
    AlreadyExists,
    /// `destroy` or `open` was called with a name that names no live file.
    #[error("file not found")]
    NotFound,
    /// The descriptor table has no free slot.
    #[error("too many files")]
    TooManyFiles,
    /// The directory file is at its maximum size and every entry is live.
    #[error("no free directory entry")]
    NoFreeDirEntry,
    /// A seek target fell outside `0..=size`.
    #[error("seek position out of range")]
    SeekOutOfRange,
    /// The bitmap allocator has no free block left to give out.
    #[error("disk is full")]
    DiskFull,
    /// The open-file table has no free slot.
    #[error("too many open files")]
    TooManyOpenFiles,
    /// A block index presented to the block device was `>= block_count`.
    #[error("block index {index} out of range (device has {total} blocks)")]
    BlockOutOfRange {
        /// The offending index.
        index: usize,
        /// The device's block count.
        total: usize,
    },
    /// A handle did not name a currently open file.
    #[error("handle {handle} does not name an open file")]
    InvalidHandle {
        /// The offending handle.
        handle: usize,
    },
    /// An operation was attempted before `mount` or after `unmount`.
    #[error("volume is not mounted")]
    NotMounted,
    /// `Config::validate` rejected a geometry.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
