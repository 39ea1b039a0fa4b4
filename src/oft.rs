//! The open-file table and the buffered I/O engine built on top of it.
//!
//! Every live [`OftSlot::Open`] keeps exactly one data block buffered. The
//! `dirty` flag decides whether that buffer needs writing back before it is
//! replaced or the handle is closed; the reference implementation instead
//! inferred this from "are we at end-of-file", which gives a wrong answer
//! after a seek-to-end followed by a seek-back onto a block that was
//! written earlier in the same session (see `SPEC_FULL.md` §9).

use crate::block::BlockDevice;
use crate::config::Config;
use crate::descriptor::DescriptorTable;
use crate::error::FsError;

/// An open-file table entry.
#[derive(Debug, Clone)]
pub(crate) enum OftSlot {
    Free,
    Open(OpenFile),
}

#[derive(Debug, Clone)]
pub(crate) struct OpenFile {
    pub(crate) descriptor: usize,
    pub(crate) pos: usize,
    pub(crate) size: usize,
    pub(crate) buffer: Vec<u8>,
    /// Which logical block of the file `buffer` currently mirrors, if any.
    pub(crate) buffered_block: Option<usize>,
    /// Whether `buffer` holds bytes not yet written back to its block.
    pub(crate) dirty: bool,
}

impl OftSlot {
    pub(crate) fn is_free(&self) -> bool {
        matches!(self, OftSlot::Free)
    }

    pub(crate) fn as_open(&self) -> Option<&OpenFile> {
        match self {
            OftSlot::Open(f) => Some(f),
            OftSlot::Free => None,
        }
    }

    pub(crate) fn as_open_mut(&mut self) -> Option<&mut OpenFile> {
        match self {
            OftSlot::Open(f) => Some(f),
            OftSlot::Free => None,
        }
    }

    /// Consumes the slot, returning its `OpenFile` if it was occupied and
    /// leaving `OftSlot::Free` behind.
    pub(crate) fn take_open(&mut self) -> Option<OpenFile> {
        match core::mem::replace(self, OftSlot::Free) {
            OftSlot::Open(f) => Some(f),
            OftSlot::Free => None,
        }
    }
}

/// Returns the smallest free OFT slot, starting from index 0. Does not mark
/// it occupied; callers do that once they have fully built the
/// [`OpenFile`].
pub(crate) fn acquire_free_slot(table: &[OftSlot]) -> Result<usize, FsError> {
    match table.iter().position(OftSlot::is_free) {
        Some(index) => Ok(index),
        None => {
            log::warn!("open-file table: too many open files");
            Err(FsError::TooManyOpenFiles)
        }
    }
}

/// Binds a fresh OFT entry to `descriptor` and loads its first block, if
/// any.
pub(crate) fn open_descriptor(
    device: &BlockDevice,
    descriptors: &DescriptorTable,
    config: &Config,
    descriptor: usize,
) -> Result<OpenFile, FsError> {
    let desc = descriptors.get(descriptor);
    let size = desc.file_size();
    let mut buffer = vec![0u8; config.block_size];
    let buffered_block = match desc.block(0) {
        Some(block_index) => {
            device.read_block(block_index, &mut buffer)?;
            Some(0)
        }
        None => None,
    };
    Ok(OpenFile {
        descriptor,
        pos: 0,
        size,
        buffer,
        buffered_block,
        dirty: false,
    })
}

fn flush_if_dirty(
    device: &mut BlockDevice,
    descriptors: &DescriptorTable,
    file: &mut OpenFile,
) -> Result<(), FsError> {
    if !file.dirty {
        return Ok(());
    }
    let logical = file
        .buffered_block
        .expect("a dirty buffer always mirrors a real block");
    let block_index = descriptors
        .get(file.descriptor)
        .block(logical)
        .expect("a buffered block is always backed by an allocated block");
    device.write_block(block_index, &file.buffer)?;
    file.dirty = false;
    Ok(())
}

/// Seeks `file` to `pos`, flushing and reloading the buffer if the target
/// byte lives in a different block than the one currently buffered.
pub(crate) fn seek(
    device: &mut BlockDevice,
    descriptors: &DescriptorTable,
    config: &Config,
    file: &mut OpenFile,
    pos: usize,
) -> Result<(), FsError> {
    if pos > file.size {
        return Err(FsError::SeekOutOfRange);
    }
    let target_block = pos / config.block_size;
    if target_block >= config.max_blocks_per_file {
        // pos sits exactly at the end of a file already at its block quota
        // (pos == size == max_blocks_per_file * block_size): one past the
        // last real block, with no block[target_block] to load. The buffer
        // stays on whichever block it already mirrors.
        file.pos = pos;
        return Ok(());
    }
    if file.buffered_block != Some(target_block) {
        flush_if_dirty(device, descriptors, file)?;
        if let Some(block_index) = descriptors.get(file.descriptor).block(target_block) {
            device.read_block(block_index, &mut file.buffer)?;
            file.buffered_block = Some(target_block);
        } else {
            // No block backs this position (e.g. seeking to a zero-length
            // file's offset 0); leave the buffer as-is, it will be
            // established on the next write.
            file.buffered_block = None;
        }
    }
    file.pos = pos;
    Ok(())
}

/// Reads up to `dst.len()` bytes starting at `file.pos`. Never fails: a
/// request past the end of file is simply clamped, which may read zero
/// bytes.
pub(crate) fn read(
    device: &mut BlockDevice,
    descriptors: &DescriptorTable,
    config: &Config,
    file: &mut OpenFile,
    dst: &mut [u8],
) -> Result<usize, FsError> {
    let block_size = config.block_size;
    let remain = file.size - file.pos;
    let len = dst.len().min(remain);
    let mut copied = 0;
    while copied < len {
        let begin = file.pos % block_size;
        let n = (block_size - begin).min(len - copied);
        dst[copied..copied + n].copy_from_slice(&file.buffer[begin..begin + n]);
        file.pos += n;
        copied += n;
        if file.pos % block_size == 0 {
            advance_to_block(device, descriptors, file, file.pos / block_size)?;
        }
    }
    Ok(copied)
}

/// Makes sure `file.buffer` mirrors `block_no`, flushing the previously
/// buffered block first and allocating `block_no` if the descriptor does not
/// already have it. A freshly allocated block's buffer content is left
/// as-is, matching the reference, which never zero-initializes a new block.
fn ensure_write_block(
    device: &mut BlockDevice,
    descriptors: &mut DescriptorTable,
    bitmap: &mut crate::bitmap::Bitmap,
    file: &mut OpenFile,
    block_no: usize,
) -> Result<(), FsError> {
    if file.buffered_block == Some(block_no) {
        return Ok(());
    }
    flush_if_dirty(device, descriptors, file)?;
    match descriptors.get(file.descriptor).block(block_no) {
        Some(block_index) => {
            device.read_block(block_index, &mut file.buffer)?;
        }
        None => {
            let block_index = bitmap.acquire()?;
            descriptors.get_mut(file.descriptor).set_block(block_no, Some(block_index));
        }
    }
    file.buffered_block = Some(block_no);
    Ok(())
}

/// Writes up to `src.len()` bytes starting at `file.pos`, growing the file
/// and lazily allocating blocks as needed. Returns the number of bytes
/// actually written, which is less than `src.len()` exactly when the disk
/// or the file's three-block capacity runs out mid-write; that is not an
/// error (§7).
///
/// `file.pos` can land on a block that was never allocated: a zero-length
/// file's position 0, or a position exactly at the end of a block-aligned
/// file (reachable after `seek` to end of file). The very first such case,
/// position 0 with no block 0, is the reference's own "allocate block 0 up
/// front" step and is a hard failure if the disk is full; any later one is
/// equivalent to an ordinary block-boundary crossing and instead reports
/// zero bytes written.
pub(crate) fn write(
    device: &mut BlockDevice,
    descriptors: &mut DescriptorTable,
    bitmap: &mut crate::bitmap::Bitmap,
    config: &Config,
    file: &mut OpenFile,
    src: &[u8],
) -> Result<usize, FsError> {
    let block_size = config.block_size;
    let start_block = file.pos / block_size;
    if start_block >= config.max_blocks_per_file {
        // Already sitting at the file's block quota (pos == size ==
        // max_blocks_per_file * block_size): nothing more can be written.
        return Ok(0);
    }
    if start_block == 0 {
        ensure_write_block(device, descriptors, bitmap, file, start_block)?;
    } else if ensure_write_block(device, descriptors, bitmap, file, start_block).is_err() {
        return Ok(0);
    }

    let mut written = 0;
    while written < src.len() {
        let begin = file.pos % block_size;
        let n = (block_size - begin).min(src.len() - written);
        file.buffer[begin..begin + n].copy_from_slice(&src[written..written + n]);
        file.dirty = true;
        file.pos += n;
        written += n;
        if file.pos > file.size {
            file.size = file.pos;
            descriptors.get_mut(file.descriptor).set_file_size(file.size);
        }
        if file.pos % block_size == 0 {
            let next_block_no = file.pos / block_size;
            if next_block_no >= config.max_blocks_per_file {
                flush_if_dirty(device, descriptors, file)?;
                // File has reached its maximum size; stop without error.
                break;
            }
            if ensure_write_block(device, descriptors, bitmap, file, next_block_no).is_err() {
                // Disk is full; stop, reporting bytes written so far.
                break;
            }
        }
    }
    Ok(written)
}

/// Moves the buffer forward to `next_block_no` after a write/read crossed a
/// block boundary, flushing the old block first if it is dirty. Used only
/// by `read`; `write` inlines the same shape because it must also allocate.
fn advance_to_block(
    device: &mut BlockDevice,
    descriptors: &DescriptorTable,
    file: &mut OpenFile,
    next_block_no: usize,
) -> Result<(), FsError> {
    flush_if_dirty(device, descriptors, file)?;
    if file.pos < file.size {
        let block_index = descriptors
            .get(file.descriptor)
            .block(next_block_no)
            .expect("a readable position is always backed by an allocated block");
        device.read_block(block_index, &mut file.buffer)?;
        file.buffered_block = Some(next_block_no);
    }
    Ok(())
}

/// Closes `file`: flushes its buffer if dirty, mirrors its size into the
/// descriptor, and returns it to the free pool.
pub(crate) fn close(
    device: &mut BlockDevice,
    descriptors: &mut DescriptorTable,
    file: &OpenFile,
) -> Result<(), FsError> {
    if file.dirty {
        let logical = file
            .buffered_block
            .expect("a dirty buffer always mirrors a real block");
        let block_index = descriptors
            .get(file.descriptor)
            .block(logical)
            .expect("a buffered block is always backed by an allocated block");
        device.write_block(block_index, &file.buffer)?;
    }
    descriptors.get_mut(file.descriptor).set_file_size(file.size);
    Ok(())
}
