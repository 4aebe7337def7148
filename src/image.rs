//! A medium backed by a raw disk image file.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::prelude::*;
use std::io::SeekFrom;
use std::path::Path;

use crate::blockdevice::{Block, BlockCount, BlockDevice, BlockIdx, Geometry, BLOCK_LEN_U64};
use crate::debug;

/// Heads we report for images that divide evenly into 16x32 tracks
const HEADS: u32 = 16;

/// Sectors per track we report for images that divide evenly into 16x32
/// tracks
const SECTORS_PER_TRACK: u32 = 32;

/// A headerless disk image on the host filesystem, one 512 byte sector
/// after another.
#[derive(Debug)]
pub struct ImageFile {
    file: RefCell<File>,
}

impl ImageFile {
    /// Open an image for reading and writing.
    pub fn open<P>(path: P) -> Result<ImageFile, std::io::Error>
    where
        P: AsRef<Path>,
    {
        debug!("Opening image");
        Ok(ImageFile {
            file: RefCell::new(OpenOptions::new().read(true).write(true).open(path)?),
        })
    }

    /// Wrap a file that is already open for reading and writing.
    pub fn from_file(file: File) -> ImageFile {
        ImageFile {
            file: RefCell::new(file),
        }
    }

    /// Give back the underlying file.
    pub fn into_inner(self) -> File {
        self.file.into_inner()
    }
}

impl BlockDevice for ImageFile {
    type Error = std::io::Error;

    fn read(&self, block: &mut Block, block_idx: BlockIdx) -> Result<(), Self::Error> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(block_idx.into_bytes()))?;
        file.read_exact(block)
    }

    fn write(&self, block: &Block, block_idx: BlockIdx) -> Result<(), Self::Error> {
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(block_idx.into_bytes()))?;
        file.write_all(block)?;
        file.flush()
    }

    fn geometry(&self) -> Result<Geometry, Self::Error> {
        let len = self.file.borrow().metadata()?.len();
        let num_blocks = u32::try_from(len / BLOCK_LEN_U64).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "image too large")
        })?;
        let per_cylinder = HEADS * SECTORS_PER_TRACK;
        if num_blocks % per_cylinder == 0 {
            Ok(Geometry {
                cylinders: num_blocks / per_cylinder,
                heads: HEADS,
                sectors_per_track: SECTORS_PER_TRACK,
                sector_size: crate::blockdevice::BLOCK_LEN_U16,
            })
        } else {
            Ok(Geometry::linear(BlockCount(num_blocks)))
        }
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
