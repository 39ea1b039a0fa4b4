//! A single-volume, in-memory block file system: a flat namespace of
//! short-named files, each up to three fixed-size blocks, backed by a
//! block device that lives entirely in RAM for the lifetime of a mount.
//!
//! The public surface is [`Volume`]: [`Volume::mount`] formats a fresh
//! device and returns an owned value; every operation is a `&mut self`
//! method on it; [`Volume::unmount`] flushes the buffered bitmap and
//! descriptor table and consumes it. There is no support for mounting onto
//! a previously persisted device — the block device is volatile by design,
//! so every mount starts from an empty root directory.

mod bitmap;
mod block;
mod config;
mod descriptor;
mod directory;
mod error;
mod oft;

pub use block::BlockDevice;
pub use config::Config;
pub use error::FsError;

use bitmap::Bitmap;
use descriptor::DescriptorTable;
use directory::{ROOT_DESCRIPTOR, ROOT_OFT_SLOT};
use oft::OftSlot;

/// A mounted volume: the block device plus every piece of RAM-buffered
/// state built on top of it.
pub struct Volume {
    pub(crate) config: Config,
    pub(crate) device: BlockDevice,
    pub(crate) bitmap: Bitmap,
    pub(crate) descriptors: DescriptorTable,
    pub(crate) oft: Vec<OftSlot>,
}

impl Volume {
    /// Formats a fresh block device according to `config` and mounts it,
    /// binding OFT slot 0 to the (now empty) root directory.
    pub fn mount(config: Config) -> Result<Self, FsError> {
        config.validate()?;

        let mut device = BlockDevice::new(config.block_size, config.block_count);

        let bitmap = Bitmap::format(&config);
        bitmap.flush(&mut device)?;

        let descriptors = DescriptorTable::format(&config, config.data_area_start());
        descriptors.flush(&mut device, &config)?;

        let mut oft: Vec<OftSlot> = (0..config.oft_capacity).map(|_| OftSlot::Free).collect();
        let root = oft::open_descriptor(&device, &descriptors, &config, ROOT_DESCRIPTOR)?;
        oft[ROOT_OFT_SLOT] = OftSlot::Open(root);

        log::debug!(
            "mounted volume: {} blocks of {} bytes, {} descriptors, {} OFT slots",
            config.block_count,
            config.block_size,
            config.total_descriptors(),
            config.oft_capacity
        );

        Ok(Volume {
            config,
            device,
            bitmap,
            descriptors,
            oft,
        })
    }

    /// Convenience wrapper around [`Volume::mount`] with [`Config::default`].
    pub fn mount_default() -> Result<Self, FsError> {
        Self::mount(Config::default())
    }

    /// Flushes the buffered bitmap and descriptor table back to the block
    /// device and releases the root directory's OFT entry. Consumes the
    /// volume: nothing in this crate supports remounting the resulting
    /// device, since the block device itself is discarded with `self`.
    pub fn unmount(mut self) -> Result<(), FsError> {
        let root = self.oft[ROOT_OFT_SLOT]
            .as_open()
            .ok_or(FsError::NotMounted)?;
        oft::close(&mut self.device, &mut self.descriptors, root)?;
        self.bitmap.flush(&mut self.device)?;
        self.descriptors.flush(&mut self.device, &self.config)?;
        log::debug!("unmounted volume");
        Ok(())
    }

    /// The geometry this volume was mounted with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn check_user_handle(&self, handle: usize) -> Result<(), FsError> {
        if handle == ROOT_OFT_SLOT {
            return Err(FsError::InvalidHandle { handle });
        }
        Ok(())
    }

    /// Opens `name`, returning a handle for subsequent `read`/`write`/
    /// `seek`/`close` calls.
    pub fn open(&mut self, name: &str) -> Result<usize, FsError> {
        let descriptor = self.resolve(name)?;
        let handle = oft::acquire_free_slot(&self.oft)?;
        let file = oft::open_descriptor(&self.device, &self.descriptors, &self.config, descriptor)?;
        self.oft[handle] = OftSlot::Open(file);
        log::debug!("open: {name:?} -> handle {handle} (descriptor {descriptor})");
        Ok(handle)
    }

    /// Closes `handle`, flushing its buffer if dirty and mirroring its size
    /// back into the descriptor table.
    pub fn close(&mut self, handle: usize) -> Result<(), FsError> {
        self.check_user_handle(handle)?;
        let slot = self
            .oft
            .get_mut(handle)
            .ok_or(FsError::InvalidHandle { handle })?;
        let file = slot.take_open().ok_or(FsError::InvalidHandle { handle })?;
        oft::close(&mut self.device, &mut self.descriptors, &file)?;
        log::debug!("close: handle {handle}");
        Ok(())
    }

    /// Reads up to `buf.len()` bytes from `handle` at its current position,
    /// advancing it. Returns the number of bytes actually read, which is
    /// less than `buf.len()` exactly at end of file.
    pub fn read(&mut self, handle: usize, buf: &mut [u8]) -> Result<usize, FsError> {
        self.check_user_handle(handle)?;
        self.read_handle(handle, buf)
    }

    /// Writes up to `data.len()` bytes to `handle` at its current position,
    /// advancing it and growing the file as needed. Returns the number of
    /// bytes actually written, which is less than `data.len()` exactly when
    /// the disk or the file's block quota is exhausted; that is not an
    /// error.
    pub fn write(&mut self, handle: usize, data: &[u8]) -> Result<usize, FsError> {
        self.check_user_handle(handle)?;
        self.write_handle(handle, data)
    }

    /// Moves `handle`'s position to `pos`, which must lie within
    /// `0..=size`.
    pub fn seek(&mut self, handle: usize, pos: usize) -> Result<(), FsError> {
        self.check_user_handle(handle)?;
        self.seek_handle(handle, pos)
    }

    /// Returns `handle`'s current position.
    pub fn tell(&self, handle: usize) -> Result<usize, FsError> {
        self.check_user_handle(handle)?;
        self.tell_handle(handle)
    }

    /// Returns whether `handle`'s position is at end of file.
    pub fn eof(&self, handle: usize) -> Result<bool, FsError> {
        self.check_user_handle(handle)?;
        self.handle_eof(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all(vol: &mut Volume, handle: usize, data: &[u8]) -> usize {
        vol.write(handle, data).unwrap()
    }

    #[test]
    fn mount_starts_with_an_empty_root() {
        let mut vol = Volume::mount_default().unwrap();
        assert_eq!(vol.directory().unwrap(), Vec::<(String, usize)>::new());
    }

    #[test]
    fn create_then_reopen_round_trips_written_bytes() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("abc").unwrap();
        let h = vol.open("abc").unwrap();
        assert_eq!(write_all(&mut vol, h, b"123456"), 6);
        vol.seek(h, 0).unwrap();
        let mut buf = [0u8; 6];
        assert_eq!(vol.read(h, &mut buf).unwrap(), 6);
        assert_eq!(&buf, b"123456");
        vol.close(h).unwrap();
        vol.unmount().unwrap();
    }

    #[test]
    fn duplicate_create_fails() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("abc").unwrap();
        assert_eq!(vol.create("abc"), Err(FsError::AlreadyExists));
    }

    #[test]
    fn destroy_removes_from_directory_listing() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("a").unwrap();
        vol.create("b").unwrap();
        vol.destroy("a").unwrap();
        assert_eq!(vol.directory().unwrap(), vec![("b".to_string(), 0)]);
    }

    #[test]
    fn writing_past_three_blocks_truncates_to_capacity() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("f").unwrap();
        let h = vol.open("f").unwrap();
        let data = vec![b'x'; 1537];
        assert_eq!(write_all(&mut vol, h, &data), 1536);
        assert_eq!(vol.tell(h).unwrap(), 1536);
        assert!(vol.eof(h).unwrap());
        assert_eq!(vol.write(h, b"z").unwrap(), 0);
    }

    #[test]
    fn close_then_reopen_preserves_contents() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("f").unwrap();
        let h = vol.open("f").unwrap();
        write_all(&mut vol, h, b"hello");
        vol.close(h).unwrap();
        let h = vol.open("f").unwrap();
        let mut buf = [0u8; 5];
        assert_eq!(vol.read(h, &mut buf).unwrap(), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn overlong_name_is_rejected() {
        let mut vol = Volume::mount_default().unwrap();
        assert_eq!(vol.create("toolong"), Err(FsError::PathTooLong));
    }

    #[test]
    fn destroy_releases_blocks_back_to_the_bitmap() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("f").unwrap();
        let h = vol.open("f").unwrap();
        write_all(&mut vol, h, &vec![1u8; 1536]);
        vol.close(h).unwrap();
        vol.destroy("f").unwrap();
        assert_eq!(vol.open("f"), Err(FsError::NotFound));

        vol.create("g").unwrap();
        let h = vol.open("g").unwrap();
        assert_eq!(write_all(&mut vol, h, &vec![2u8; 1536]), 1536);
    }

    #[test]
    fn root_oft_slot_is_not_reachable_through_the_public_api() {
        let mut vol = Volume::mount_default().unwrap();
        assert_eq!(vol.close(0), Err(FsError::InvalidHandle { handle: 0 }));
    }

    #[test]
    fn seek_out_of_range_is_rejected() {
        let mut vol = Volume::mount_default().unwrap();
        vol.create("f").unwrap();
        let h = vol.open("f").unwrap();
        write_all(&mut vol, h, b"hi");
        assert_eq!(vol.seek(h, 3), Err(FsError::SeekOutOfRange));
    }

    #[test]
    fn too_many_open_files_is_reported() {
        let mut vol = Volume::mount_default().unwrap();
        let names = ["a", "b", "c", "d", "e"];
        for n in &names {
            vol.create(n).unwrap();
        }
        // oft_capacity defaults to 4, slot 0 is the root.
        for n in &names[..3] {
            vol.open(n).unwrap();
        }
        assert_eq!(vol.open("e"), Err(FsError::TooManyOpenFiles));
    }
}
