//! The directory: the root's content, interpreted as a packed array of
//! fixed-width name-to-descriptor records.
//!
//! There is exactly one directory and it is not itself listed in its own
//! entries; it is simply the file that descriptor 0 always names. All of
//! `create`, `destroy`, name lookup, and listing work by driving the
//! buffered I/O engine over that one file, the same way the reference
//! implementation treats the root directory as just another open file
//! handle (`ROOT`).

use zerocopy::{AsBytes, FromBytes};

use crate::error::FsError;
use crate::oft;
use crate::Volume;

/// Maximum file name length in bytes. Fixed at compile time for the same
/// reason [`crate::descriptor::MAX_BLOCKS_PER_FILE`] is:
/// [`RawDirectoryEntry`] needs a fixed `repr(C)` layout.
pub const MAX_NAME_LEN: usize = 4;

/// The root directory's descriptor index. Always open at OFT slot
/// [`ROOT_OFT_SLOT`] for the lifetime of a mount.
pub(crate) const ROOT_DESCRIPTOR: usize = 0;
pub(crate) const ROOT_OFT_SLOT: usize = 0;

/// One packed directory record.
///
/// A record is free exactly when `file_name[0] == 0`; a live record's
/// `file_name` holds the name followed by zero-padding (so a name can
/// never legally start with a NUL byte).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, AsBytes, FromBytes)]
pub(crate) struct RawDirectoryEntry {
    file_name: [u8; MAX_NAME_LEN],
    descriptor: i32,
}

impl RawDirectoryEntry {
    fn is_free(&self) -> bool {
        self.file_name[0] == 0
    }

    fn name(&self) -> &[u8] {
        let len = self
            .file_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        &self.file_name[..len]
    }

    fn matches(&self, name: &[u8]) -> bool {
        !self.is_free() && self.name() == name
    }

    fn new(name: &[u8], descriptor: usize) -> Self {
        let mut file_name = [0u8; MAX_NAME_LEN];
        file_name[..name.len()].copy_from_slice(name);
        RawDirectoryEntry {
            file_name,
            descriptor: descriptor as i32,
        }
    }

    fn free_marker() -> Self {
        RawDirectoryEntry {
            file_name: [0u8; MAX_NAME_LEN],
            descriptor: -1,
        }
    }
}

const ENTRY_SIZE: usize = core::mem::size_of::<RawDirectoryEntry>();

fn check_name(config: &crate::config::Config, name: &str) -> Result<(), FsError> {
    if name.len() >= config.max_name_len {
        return Err(FsError::PathTooLong);
    }
    Ok(())
}

impl Volume {
    /// Rewinds the root directory handle to the beginning, mirroring every
    /// name-service operation's `seek(ROOT, 0)` opening move.
    fn rewind_root(&mut self) -> Result<(), FsError> {
        self.seek_handle(ROOT_OFT_SLOT, 0)
    }

    /// Reads the next directory entry, if any, advancing the root handle.
    /// Returns `None` at end of directory.
    fn read_next_entry(&mut self) -> Result<Option<(usize, RawDirectoryEntry)>, FsError> {
        if self.handle_eof(ROOT_OFT_SLOT)? {
            return Ok(None);
        }
        let offset = self.tell_handle(ROOT_OFT_SLOT)?;
        let mut buf = [0u8; ENTRY_SIZE];
        let n = self.read_handle(ROOT_OFT_SLOT, &mut buf)?;
        if n < ENTRY_SIZE {
            return Ok(None);
        }
        let mut entry = RawDirectoryEntry::default();
        entry.as_bytes_mut().copy_from_slice(&buf);
        Ok(Some((offset, entry)))
    }

    fn write_entry_at(&mut self, offset: usize, entry: RawDirectoryEntry) -> Result<(), FsError> {
        self.seek_handle(ROOT_OFT_SLOT, offset)?;
        let n = self.write_handle(ROOT_OFT_SLOT, entry.as_bytes())?;
        debug_assert_eq!(n, ENTRY_SIZE, "directory entry write must never be partial");
        Ok(())
    }

    /// Creates a new, empty file named `name`.
    pub fn create(&mut self, name: &str) -> Result<(), FsError> {
        check_name(&self.config, name)?;
        let name_bytes = name.as_bytes();

        self.rewind_root()?;
        let mut free_slot = None;
        while let Some((offset, entry)) = self.read_next_entry()? {
            if entry.is_free() {
                if free_slot.is_none() {
                    free_slot = Some(offset);
                }
            } else if entry.matches(name_bytes) {
                return Err(FsError::AlreadyExists);
            }
        }
        let append_offset = self.tell_handle(ROOT_OFT_SLOT)?;

        // An append that would grow the directory past its own
        // three-block capacity must fail before anything is mutated,
        // rather than letting the generic buffered writer silently
        // truncate a directory entry mid-record.
        if free_slot.is_none() {
            let max_directory_size = self.config.max_blocks_per_file * self.config.block_size;
            if append_offset + ENTRY_SIZE > max_directory_size {
                log::warn!("directory: no free entry for {name:?}, directory is full");
                return Err(FsError::NoFreeDirEntry);
            }
        }

        let descriptor = self.descriptors.acquire_free()?;
        let offset = free_slot.unwrap_or(append_offset);
        let entry = RawDirectoryEntry::new(name_bytes, descriptor);
        self.write_entry_at(offset, entry)?;
        log::debug!("directory: created {name:?} -> descriptor {descriptor}");
        Ok(())
    }

    /// Removes `name`, releasing its descriptor and data blocks.
    ///
    /// Unlike `create`/`open`, an over-long name is not rejected up front
    /// (the reference does not bounds-check it either): it simply cannot
    /// match any stored entry, so the scan below falls through to
    /// `NotFound`.
    pub fn destroy(&mut self, name: &str) -> Result<(), FsError> {
        let name_bytes = name.as_bytes();

        self.rewind_root()?;
        while let Some((offset, entry)) = self.read_next_entry()? {
            if entry.matches(name_bytes) {
                let descriptor = entry.descriptor as usize;
                for slot in 0..self.config.max_blocks_per_file {
                    if let Some(block_index) = self.descriptors.get(descriptor).block(slot) {
                        self.bitmap.release(block_index);
                    }
                }
                self.descriptors.release(descriptor);
                self.write_entry_at(offset, RawDirectoryEntry::free_marker())?;
                log::debug!("directory: destroyed {name:?} (descriptor {descriptor})");
                return Ok(());
            }
        }
        Err(FsError::NotFound)
    }

    /// Resolves `name` to its descriptor index.
    pub(crate) fn resolve(&mut self, name: &str) -> Result<usize, FsError> {
        check_name(&self.config, name)?;
        let name_bytes = name.as_bytes();
        self.rewind_root()?;
        while let Some((_, entry)) = self.read_next_entry()? {
            if entry.matches(name_bytes) {
                return Ok(entry.descriptor as usize);
            }
        }
        Err(FsError::NotFound)
    }

    /// Lists every live file as `(name, size in bytes)`, in directory order.
    pub fn directory(&mut self) -> Result<Vec<(String, usize)>, FsError> {
        self.rewind_root()?;
        let mut entries = Vec::new();
        while let Some((_, entry)) = self.read_next_entry()? {
            if !entry.is_free() {
                let name = String::from_utf8_lossy(entry.name()).into_owned();
                let size = self.descriptors.get(entry.descriptor as usize).file_size();
                entries.push((name, size));
            }
        }
        Ok(entries)
    }
}

/// Low-level handle seek used internally by the name service; thin wrapper
/// kept here rather than in `oft.rs` so directory.rs does not need to
/// destructure `Volume` itself.
impl Volume {
    pub(crate) fn seek_handle(&mut self, handle: usize, pos: usize) -> Result<(), FsError> {
        let slot = self
            .oft
            .get_mut(handle)
            .ok_or(FsError::InvalidHandle { handle })?;
        let file = slot.as_open_mut().ok_or(FsError::InvalidHandle { handle })?;
        oft::seek(&mut self.device, &self.descriptors, &self.config, file, pos)
    }

    pub(crate) fn read_handle(&mut self, handle: usize, dst: &mut [u8]) -> Result<usize, FsError> {
        let slot = self
            .oft
            .get_mut(handle)
            .ok_or(FsError::InvalidHandle { handle })?;
        let file = slot.as_open_mut().ok_or(FsError::InvalidHandle { handle })?;
        oft::read(&mut self.device, &self.descriptors, &self.config, file, dst)
    }

    pub(crate) fn write_handle(&mut self, handle: usize, src: &[u8]) -> Result<usize, FsError> {
        let slot = self
            .oft
            .get_mut(handle)
            .ok_or(FsError::InvalidHandle { handle })?;
        let file = slot.as_open_mut().ok_or(FsError::InvalidHandle { handle })?;
        oft::write(
            &mut self.device,
            &mut self.descriptors,
            &mut self.bitmap,
            &self.config,
            file,
            src,
        )
    }

    pub(crate) fn tell_handle(&self, handle: usize) -> Result<usize, FsError> {
        let slot = self.oft.get(handle).ok_or(FsError::InvalidHandle { handle })?;
        Ok(slot.as_open().ok_or(FsError::InvalidHandle { handle })?.pos)
    }

    pub(crate) fn handle_eof(&self, handle: usize) -> Result<bool, FsError> {
        let slot = self.oft.get(handle).ok_or(FsError::InvalidHandle { handle })?;
        let file = slot.as_open().ok_or(FsError::InvalidHandle { handle })?;
        Ok(file.pos == file.size)
    }
}
