//! Block-device geometry.
//!
//! The reference instance (`Config::default`) is the geometry the rest of
//! this crate's doc comments and test data assume: 512-byte blocks, 64
//! blocks total, 6 descriptor blocks, 3-block files, 4-byte names, 4 open
//! files at a time.

use crate::descriptor::{RawDescriptor, MAX_BLOCKS_PER_FILE};
use crate::directory::{RawDirectoryEntry, MAX_NAME_LEN};
use crate::error::FsError;

/// Geometry of a [`Volume`](crate::Volume)'s backing block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Bytes per block.
    pub block_size: usize,
    /// Total number of blocks on the device, including the bitmap block.
    pub block_count: usize,
    /// Number of blocks following the bitmap block that hold the
    /// descriptor table.
    pub descriptor_blocks: usize,
    /// Maximum number of data blocks a single file may occupy.
    pub max_blocks_per_file: usize,
    /// Maximum file name length in bytes.
    pub max_name_len: usize,
    /// Number of simultaneously open files (the open-file table's capacity).
    pub oft_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: 512,
            block_count: 64,
            descriptor_blocks: 6,
            max_blocks_per_file: 3,
            max_name_len: 4,
            oft_capacity: 4,
        }
    }
}

impl Config {
    /// Index of the first block available for descriptors (always `1`,
    /// right after the bitmap block).
    pub fn descriptor_area_start(&self) -> usize {
        1
    }

    /// Index of the first block available to hold file data.
    pub fn data_area_start(&self) -> usize {
        1 + self.descriptor_blocks
    }

    /// Number of descriptors that fit in one block.
    pub fn descriptors_per_block(&self) -> usize {
        self.block_size / core::mem::size_of::<RawDescriptor>()
    }

    /// Total number of descriptors the volume can hold.
    pub fn total_descriptors(&self) -> usize {
        self.descriptors_per_block() * self.descriptor_blocks
    }

    /// Size in bytes of one directory entry.
    pub fn directory_entry_size(&self) -> usize {
        core::mem::size_of::<RawDirectoryEntry>()
    }

    /// Checks the invariants a well-formed geometry must satisfy, mirroring
    /// the `static_assert`s the reference implementation hard-coded at
    /// compile time. Since `Config` is a runtime value here, the checks must
    /// run at `mount` instead.
    pub fn validate(&self) -> Result<(), FsError> {
        if self.descriptor_blocks == 0 {
            return Err(FsError::InvalidConfig(
                "descriptor_blocks must be at least 1".into(),
            ));
        }
        if self.data_area_start() + 1 > self.block_count {
            return Err(FsError::InvalidConfig(
                "block_count leaves no room for data blocks".into(),
            ));
        }
        if core::mem::size_of::<RawDescriptor>() > self.block_size {
            return Err(FsError::InvalidConfig(
                "block_size is too small to hold one descriptor".into(),
            ));
        }
        if self.directory_entry_size() > self.block_size {
            return Err(FsError::InvalidConfig(
                "block_size is too small to hold one directory entry".into(),
            ));
        }
        if self.descriptors_per_block() == 0 {
            return Err(FsError::InvalidConfig(
                "block_size is too small to fit any descriptor".into(),
            ));
        }
        // `RawDescriptor` and `RawDirectoryEntry` bake their array lengths in
        // at compile time (see their doc comments), so a `Config` claiming a
        // different geometry for either would silently mismatch the on-disk
        // record layout it is supposed to describe.
        if self.max_blocks_per_file != MAX_BLOCKS_PER_FILE {
            return Err(FsError::InvalidConfig(format!(
                "max_blocks_per_file must be {MAX_BLOCKS_PER_FILE}"
            )));
        }
        if self.max_name_len != MAX_NAME_LEN {
            return Err(FsError::InvalidConfig(format!(
                "max_name_len must be {MAX_NAME_LEN}"
            )));
        }
        if self.oft_capacity == 0 {
            return Err(FsError::InvalidConfig(
                "oft_capacity must be at least 1".into(),
            ));
        }
        if self.block_count % 8 != 0 {
            return Err(FsError::InvalidConfig(
                "block_count must be a multiple of 8 so the bitmap has no partial byte".into(),
            ));
        }
        Ok(())
    }
}
