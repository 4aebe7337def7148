//! Traits and types for working with Block Devices.
//!
//! The emulated card keeps its sectors on something that implements
//! [`BlockDevice`]. The card never talks to that medium directly: it goes
//! through a [`SectorCache`], which holds every sector the host writes until
//! somebody asks for them to be flushed.

use alloc::collections::BTreeMap;

use crate::{debug, warn};

/// A standard 512 byte block (also known as a sector).
///
/// IBM PC formatted 5.25" and 3.5" floppy disks, IDE/SATA Hard Drives up to
/// about 2 TiB, and almost all SD/MMC cards have 512 byte blocks.
///
/// This library does not support devices with a block size other than 512
/// bytes.
pub type Block = [u8; BLOCK_LEN];

/// All our blocks are a fixed length of 512 bytes.
pub const BLOCK_LEN: usize = 512;

/// Sometimes we want `LEN` as a `u16` and the casts don't look nice.
pub const BLOCK_LEN_U16: u16 = 512;

/// Sometimes we want `LEN` as a `u64` and the casts don't look nice.
pub const BLOCK_LEN_U64: u64 = 512;

/// The linear index of a block. The first block on the medium is
/// `BlockIdx(0)`.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockIdx(pub u32);

impl BlockIdx {
    /// Convert a block index into a 64-bit byte offset from the start of the
    /// medium. Useful if your underlying medium actually works in bytes,
    /// like a disk image file does.
    pub fn into_bytes(self) -> u64 {
        u64::from(self.0) * BLOCK_LEN_U64
    }
}

/// A number of blocks.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlockCount(pub u32);

/// The shape of a medium, the way a hard disk image describes itself.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Geometry {
    /// Number of cylinders
    pub cylinders: u32,
    /// Number of heads
    pub heads: u32,
    /// Number of sectors on each track
    pub sectors_per_track: u32,
    /// Size of each sector, in bytes
    pub sector_size: u16,
}

impl Geometry {
    /// A geometry with one head and one sector per track, so the cylinder
    /// count is the sector count.
    pub const fn linear(count: BlockCount) -> Geometry {
        Geometry {
            cylinders: count.0,
            heads: 1,
            sectors_per_track: 1,
            sector_size: BLOCK_LEN_U16,
        }
    }

    /// The total number of sectors on the medium.
    pub fn total_sectors(&self) -> u64 {
        u64::from(self.cylinders)
            .saturating_mul(u64::from(self.heads))
            .saturating_mul(u64::from(self.sectors_per_track))
    }
}

/// Represents a medium that holds a number of 512 byte blocks.
///
/// All the APIs take `&self`. If the medium needs mutability to do its job,
/// handle that with an inner `RefCell`.
pub trait BlockDevice {
    /// The errors that the `BlockDevice` can return. Must be debug formattable.
    type Error: core::fmt::Debug;
    /// Read one block from the given block index.
    fn read(&self, block: &mut Block, block_idx: BlockIdx) -> Result<(), Self::Error>;
    /// Write one block to the given block index.
    fn write(&self, block: &Block, block_idx: BlockIdx) -> Result<(), Self::Error>;
    /// Describe the shape of the medium.
    fn geometry(&self) -> Result<Geometry, Self::Error>;
}

/// A write-back cache in front of a block device.
///
/// Writes land in the cache and stay there until [`SectorCache::flush`] is
/// called. Reads see cached sectors first. A sector is dirty exactly when
/// it is in the cache.
#[derive(Debug)]
pub struct SectorCache<D> {
    block_device: D,
    dirty: BTreeMap<BlockIdx, Block>,
}

impl<D> SectorCache<D>
where
    D: BlockDevice,
{
    /// Put an empty cache in front of a block device.
    pub fn new(block_device: D) -> SectorCache<D> {
        SectorCache {
            block_device,
            dirty: BTreeMap::new(),
        }
    }

    /// Ask the block device for its geometry.
    pub fn geometry(&self) -> Result<Geometry, D::Error> {
        self.block_device.geometry()
    }

    /// Read a sector, from the cache if we have it or the block device if
    /// we don't.
    pub fn read_sector(&self, block_idx: BlockIdx, block: &mut Block) -> Result<(), D::Error> {
        match self.dirty.get(&block_idx) {
            Some(cached) => {
                block.copy_from_slice(cached);
                Ok(())
            }
            None => self.block_device.read(block, block_idx),
        }
    }

    /// Write a sector into the cache. The block device is not touched.
    pub fn write_sector(&mut self, block_idx: BlockIdx, block: &Block) {
        self.dirty.insert(block_idx, *block);
    }

    /// Are there sectors that have not been written to the block device?
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// How many sectors are waiting to be written to the block device.
    pub fn dirty_sectors(&self) -> BlockCount {
        BlockCount(self.dirty.len() as u32)
    }

    /// Write every cached sector to the block device, lowest index first.
    ///
    /// Each sector leaves the cache only once the block device has accepted
    /// it, so if this fails the sectors not yet written are still dirty.
    pub fn flush(&mut self) -> Result<(), D::Error> {
        debug!("Flushing {} sectors", self.dirty.len());
        while let Some((&block_idx, block)) = self.dirty.first_key_value() {
            if let Err(e) = self.block_device.write(block, block_idx) {
                warn!("Failed to flush sector {}", block_idx.0);
                return Err(e);
            }
            self.dirty.remove(&block_idx);
        }
        Ok(())
    }

    /// Throw away anything in the cache and give back the block device.
    pub fn eject(self) -> D {
        if !self.dirty.is_empty() {
            debug!("Discarding {} unflushed sectors", self.dirty.len());
        }
        self.block_device
    }

    /// Access the block device
    pub fn block_device(&self) -> &D {
        &self.block_device
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
