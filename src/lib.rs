//! # sdmmc-emu
//!
//! > An SD/MMC card emulator written in Rust
//!
//! This crate emulates the card side of the SD/MMC SPI-mode protocol. The
//! host feeds the card one bus byte at a time with [`Card::write`] and drains
//! the card's answer one byte at a time with [`Card::read`]. It is meant to
//! be embedded in a cycle-driven machine emulator: every call is a single,
//! synchronous step, and pacing is entirely up to the caller.
//!
//! The emulated card presents itself as an SDHC card. It understands the
//! commands a typical SPI-mode driver needs to bring a card up and move
//! single 512-byte blocks in and out of it. Sector contents live in a
//! [`BlockDevice`] of your choosing, behind a write-back [`SectorCache`]:
//! writes only reach the medium when you call [`Card::commit`].
//!
//! ```rust
//! use sdmmc_emu::{Block, BlockDevice, BlockIdx, Card, Geometry};
//!
//! struct Blank;
//!
//! impl BlockDevice for Blank {
//!     type Error = ();
//!     fn read(&self, block: &mut Block, _idx: BlockIdx) -> Result<(), ()> {
//!         block.fill(0);
//!         Ok(())
//!     }
//!     fn write(&self, _block: &Block, _idx: BlockIdx) -> Result<(), ()> {
//!         Ok(())
//!     }
//!     fn geometry(&self) -> Result<Geometry, ()> {
//!         Ok(Geometry::linear(sdmmc_emu::BlockCount(2048)))
//!     }
//! }
//!
//! let mut card = Card::new();
//! card.bind(Blank).unwrap();
//! // CMD0, GO_IDLE_STATE
//! for b in [0x40, 0x00, 0x00, 0x00, 0x00, 0x95] {
//!     card.write(b);
//! }
//! assert_eq!(card.read(), 0x01);
//! assert_eq!(card.read(), 0xFF);
//! ```
//!
//! ## Features
//!
//! * `log`: Enabled by default. Generates log messages using the `log` crate.
//! * `defmt-log`: By turning off the default features and enabling the
//!   `defmt-log` feature you can configure this crate to log messages over defmt
//!   instead.
//! * `std`: Enabled by default. Provides [`ImageFile`], a medium backed by a
//!   raw disk image on the host filesystem.
//!
//! You cannot enable both the `log` feature and the `defmt-log` feature.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(missing_docs)]

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate hex_literal;

#[macro_use]
mod structure;

pub mod blockdevice;
pub mod bus;
#[cfg(feature = "std")]
pub mod image;
pub mod response;
pub mod sdcard;
pub mod sdmmc_proto;

use core::fmt::Debug;
use embedded_io::ErrorKind;

#[doc(inline)]
pub use blockdevice::{Block, BlockCount, BlockDevice, BlockIdx, Geometry, SectorCache};

#[doc(inline)]
pub use sdcard::{Card, CardOptions, CommandState};

#[doc(inline)]
pub use sdmmc_proto::{Cid, CsdV2, Status};

#[cfg(feature = "std")]
#[doc(inline)]
pub use image::ImageFile;

#[cfg(all(feature = "defmt-log", feature = "log"))]
compile_error!("Cannot enable both log and defmt-log");

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::debug! but does nothing at all
macro_rules! debug {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::trace! but does nothing at all
macro_rules! trace {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::warn! but does nothing at all
macro_rules! warn {
    ($($arg:tt)+) => {};
}

// ****************************************************************************
//
// Public Types
//
// ****************************************************************************

/// All the ways the management functions in this crate can fail.
///
/// Nothing that happens on the bus is ever reported here. Bad commands, bad
/// sector numbers and medium failures during a transfer are all reported to
/// the host as response bytes, just as a real card would.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error<E>
where
    E: core::fmt::Debug,
{
    /// The underlying block device threw an error.
    DeviceError(E),
    /// Bad block size - only 512 byte blocks supported
    BadBlockSize(u16),
    /// The sector count is zero, or not a whole number of 512 KiB units
    UnsupportedSectorCount(u64),
    /// The medium is bigger than an SDHC card can describe. Holds the
    /// capacity field that would have been reported.
    TooLarge(u32),
}

impl<E: Debug> embedded_io::Error for Error<E> {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceError(_) => ErrorKind::Other,
            Error::BadBlockSize(_) | Error::UnsupportedSectorCount(_) => ErrorKind::Unsupported,
            Error::TooLarge(_) => ErrorKind::OutOfMemory,
        }
    }
}

impl<E: Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::DeviceError(e) => write!(f, "block device error: {:?}", e),
            Error::BadBlockSize(size) => write!(f, "unsupported sector size {}", size),
            Error::UnsupportedSectorCount(count) => {
                write!(f, "sector count {} is not a multiple of 1024", count)
            }
            Error::TooLarge(c_size) => write!(f, "image too big (C_SIZE {})", c_size),
        }
    }
}

#[cfg(feature = "std")]
impl<E: Debug> std::error::Error for Error<E> {}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
