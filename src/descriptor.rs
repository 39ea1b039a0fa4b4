//! The descriptor table: one fixed-width record per file, packed across
//! `descriptor_blocks` blocks right after the bitmap block.
//!
//! Like the bitmap, the whole table is buffered in RAM for the lifetime of
//! a mount and flushed back to disk on unmount.

use static_assertions::const_assert;
use zerocopy::{AsBytes, FromBytes};

use crate::block::BlockDevice;
use crate::config::Config;
use crate::error::FsError;

/// Sentinel stored in `file_size` for a free descriptor, and in `block[i]`
/// for an unallocated block slot. Chosen so that filling descriptor blocks
/// with `0xFF` bytes at format time (see [`DescriptorTable::format`])
/// produces this value in every `i32` field, matching the persisted layout
/// of §6.
const FREE: i32 = -1;

/// The byte `FREE` serializes to, repeated across an entire descriptor
/// (`-1i32`'s four bytes, in every field). A descriptor block holding
/// nothing but free descriptors is therefore uniformly this byte, and can
/// be formatted with one [`BlockDevice::init_block`] call instead of
/// composing and writing a buffer.
const FREE_BYTE: u8 = 0xFF;

/// Number of direct block slots a descriptor carries. Fixed at compile
/// time because [`RawDescriptor`] must have a fixed `repr(C)` layout;
/// [`Config::max_blocks_per_file`](crate::config::Config::max_blocks_per_file)
/// is validated against this constant at mount time.
pub const MAX_BLOCKS_PER_FILE: usize = 3;

/// The on-disk descriptor record.
///
/// `file_size == -1` marks the descriptor free; otherwise the first
/// `ceil(file_size / block_size)` of the three `block*` fields are valid
/// block indices and the rest are `-1`. The fields are laid out as three
/// plain `i32`s rather than `[i32; MAX_BLOCKS_PER_FILE]` so the `repr(C)`
/// layout zerocopy relies on never depends on array-length support in the
/// derive; the on-disk bytes are identical either way.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, AsBytes, FromBytes)]
pub(crate) struct RawDescriptor {
    file_size: i32,
    block0: i32,
    block1: i32,
    block2: i32,
}

const_assert!(core::mem::size_of::<RawDescriptor>() == 4 * (1 + MAX_BLOCKS_PER_FILE));

impl RawDescriptor {
    fn free() -> Self {
        RawDescriptor {
            file_size: FREE,
            block0: FREE,
            block1: FREE,
            block2: FREE,
        }
    }

    pub(crate) fn is_free(&self) -> bool {
        self.file_size == FREE
    }

    pub(crate) fn file_size(&self) -> usize {
        debug_assert!(!self.is_free());
        self.file_size as usize
    }

    pub(crate) fn set_file_size(&mut self, size: usize) {
        self.file_size = size as i32;
    }

    fn block_slot(&self, slot: usize) -> &i32 {
        match slot {
            0 => &self.block0,
            1 => &self.block1,
            2 => &self.block2,
            _ => panic!("block slot {slot} out of range"),
        }
    }

    fn block_slot_mut(&mut self, slot: usize) -> &mut i32 {
        match slot {
            0 => &mut self.block0,
            1 => &mut self.block1,
            2 => &mut self.block2,
            _ => panic!("block slot {slot} out of range"),
        }
    }

    pub(crate) fn block(&self, slot: usize) -> Option<usize> {
        let raw = *self.block_slot(slot);
        if raw == FREE {
            None
        } else {
            Some(raw as usize)
        }
    }

    pub(crate) fn set_block(&mut self, slot: usize, value: Option<usize>) {
        *self.block_slot_mut(slot) = value.map_or(FREE, |v| v as i32);
    }

    fn mark_free(&mut self) {
        *self = RawDescriptor::free();
    }
}

/// The RAM-buffered descriptor table.
#[derive(Debug, Clone)]
pub(crate) struct DescriptorTable {
    descriptors: Vec<RawDescriptor>,
}

impl DescriptorTable {
    /// Builds a freshly formatted table: every descriptor free except
    /// descriptor 0, which is pre-assigned to the root directory with an
    /// empty body occupying `root_first_block`.
    pub(crate) fn format(config: &Config, root_first_block: usize) -> Self {
        let mut descriptors = vec![RawDescriptor::free(); config.total_descriptors()];
        descriptors[0].set_file_size(0);
        descriptors[0].set_block(0, Some(root_first_block));
        DescriptorTable { descriptors }
    }

    /// Writes the descriptor table back to `device`'s descriptor blocks.
    ///
    /// A block every one of whose descriptors is free is uniformly
    /// `FREE_BYTE`, so it is formatted with `init_block` rather than
    /// composed into a buffer and handed to `write_block`, the same
    /// distinction the reference draws between its one `write_block` call
    /// for the block holding the live root descriptor and its `init_block`
    /// loop over the rest.
    pub(crate) fn flush(&self, device: &mut BlockDevice, config: &Config) -> Result<(), FsError> {
        let per_block = config.descriptors_per_block();
        let mut buf = vec![0u8; device.block_size()];
        for b in 0..config.descriptor_blocks {
            let block_descriptors = &self.descriptors[b * per_block..(b + 1) * per_block];
            let block_index = config.descriptor_area_start() + b;
            if block_descriptors.iter().all(RawDescriptor::is_free) {
                device.init_block(block_index, FREE_BYTE)?;
                continue;
            }
            buf.fill(0);
            for (i, desc) in block_descriptors.iter().enumerate() {
                let desc_size = core::mem::size_of::<RawDescriptor>();
                buf[i * desc_size..(i + 1) * desc_size].copy_from_slice(desc.as_bytes());
            }
            device.write_block(block_index, &buf)?;
        }
        Ok(())
    }

    pub(crate) fn get(&self, index: usize) -> &RawDescriptor {
        &self.descriptors[index]
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> &mut RawDescriptor {
        &mut self.descriptors[index]
    }

    /// Returns the index of the first free descriptor.
    pub(crate) fn acquire_free(&mut self) -> Result<usize, FsError> {
        match self.descriptors.iter().position(RawDescriptor::is_free) {
            Some(index) => {
                self.descriptors[index].set_file_size(0);
                log::debug!("descriptor table: acquired descriptor {index}");
                Ok(index)
            }
            None => {
                log::warn!("descriptor table: too many files");
                Err(FsError::TooManyFiles)
            }
        }
    }

    /// Marks descriptor `index` free, dropping any block references it
    /// held. Callers are responsible for releasing the referenced blocks in
    /// the bitmap first.
    pub(crate) fn release(&mut self, index: usize) {
        log::debug!("descriptor table: released descriptor {index}");
        self.descriptors[index].mark_free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_leaves_root_live_and_everything_else_free() {
        let config = Config::default();
        let table = DescriptorTable::format(&config, config.data_area_start());
        assert!(!table.get(0).is_free());
        assert_eq!(table.get(0).file_size(), 0);
        assert_eq!(table.get(0).block(0), Some(config.data_area_start()));
        assert_eq!(table.get(0).block(1), None);
        for i in 1..config.total_descriptors() {
            assert!(table.get(i).is_free());
        }
    }

    #[test]
    fn acquire_free_finds_first_free_slot() {
        let config = Config::default();
        let mut table = DescriptorTable::format(&config, config.data_area_start());
        assert_eq!(table.acquire_free().unwrap(), 1);
        assert_eq!(table.acquire_free().unwrap(), 2);
    }

    #[test]
    fn release_makes_a_descriptor_reusable() {
        let config = Config::default();
        let mut table = DescriptorTable::format(&config, config.data_area_start());
        let d = table.acquire_free().unwrap();
        table.release(d);
        assert!(table.get(d).is_free());
        assert_eq!(table.acquire_free().unwrap(), d);
    }

    #[test]
    fn acquire_free_fails_once_the_table_is_full() {
        let config = Config::default();
        let mut table = DescriptorTable::format(&config, config.data_area_start());
        for _ in 1..config.total_descriptors() {
            table.acquire_free().unwrap();
        }
        assert_eq!(table.acquire_free(), Err(FsError::TooManyFiles));
    }

    #[test]
    fn format_byte_pattern_is_all_ones_except_the_root_entry() {
        // Mirrors the reference's "fill descriptor blocks with 0xFF" format step.
        let free = RawDescriptor::free();
        assert_eq!(free.as_bytes(), &[0xFFu8; 16]);
    }
}
