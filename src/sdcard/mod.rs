//! The emulated SD Card
//!
//! Implements the card side of the SD/MMC protocol in SPI mode, one bus byte
//! at a time.
//!
//! This is currently optimised for readability and debugability, not
//! performance.

mod command;
mod state;

pub use state::CommandState;

use state::Action;

use crate::blockdevice::{Block, BlockDevice, Geometry, SectorCache, BLOCK_LEN, BLOCK_LEN_U16};
use crate::response::ResponseQueue;
use crate::sdmmc_proto::*;
use crate::{debug, trace, warn, Error};

// =============================================================================
// Types and Implementations
// =============================================================================

/// Represents an SD Card sitting on an SPI bus.
///
/// The host side of the bus calls [`Card::write`] for every byte it clocks
/// out and [`Card::read`] for every byte it wants back. Without a medium
/// bound the card is absent: writes are ignored and reads see an idle line.
pub struct Card<D> {
    media: Option<SectorCache<D>>,
    options: CardOptions,
    /// The C_SIZE field of the CSD
    c_size: u16,
    /// Number of 512 byte sectors on the medium
    total_sectors: u32,
    status: Status,
    state: CommandState,
    /// Index of the command being received or executed
    current_command: u8,
    argument: [u8; 4],
    /// The block being received for a `WRITE_BLOCK`
    write_payload: Block,
    responses: ResponseQueue,
    /// CMD8 was seen since the last reset; needed before ACMD41 can finish
    /// initialisation
    if_cond_seen: bool,
    /// CMD55 was the last command, so this one is application specific
    app_command: bool,
}

impl<D> Default for Card<D>
where
    D: BlockDevice,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<D> Card<D>
where
    D: BlockDevice,
{
    /// Create a new card with nothing bound to it.
    ///
    /// Uses the default options.
    pub fn new() -> Card<D> {
        Self::new_with_options(CardOptions::default())
    }

    /// Create a new card with nothing bound to it, using the given options.
    pub fn new_with_options(options: CardOptions) -> Card<D> {
        let mut card = Card {
            media: None,
            options,
            c_size: 0,
            total_sectors: 0,
            status: Status::power_on(),
            state: CommandState::AwaitingCommand,
            current_command: 0,
            argument: [0; 4],
            write_payload: [0; BLOCK_LEN],
            responses: ResponseQueue::new(),
            if_cond_seen: false,
            app_command: false,
        };
        card.reset();
        card
    }

    /// Bind a medium to the card, as if inserting it into the slot.
    ///
    /// Anything already bound is unbound first, discarding unflushed writes.
    /// The medium must have 512 byte sectors, a whole number of 512 KiB
    /// units, and be no bigger than an SDHC card can describe. If it isn't,
    /// it is dropped and the card is left empty.
    pub fn bind(&mut self, block_device: D) -> Result<(), Error<D::Error>> {
        self.unbind();
        let cache = SectorCache::new(block_device);
        let geometry = cache.geometry().map_err(|e| {
            warn!("Failed to query geometry");
            Error::DeviceError(e)
        })?;
        let (total_sectors, c_size) = capacity(&geometry)?;
        debug!(
            "Bound medium with {} sectors, C_SIZE {}",
            total_sectors, c_size
        );
        self.media = Some(cache);
        self.total_sectors = total_sectors;
        self.c_size = c_size;
        self.reset();
        Ok(())
    }

    /// Remove the medium, as if ejecting it from the slot.
    ///
    /// Unflushed writes are thrown away; call [`Card::commit`] first if you
    /// want to keep them. Returns the medium, if there was one.
    pub fn unbind(&mut self) -> Option<D> {
        let block_device = self.media.take().map(|cache| {
            debug!("Unbinding medium");
            cache.eject()
        });
        self.total_sectors = 0;
        self.c_size = 0;
        self.reset();
        block_device
    }

    /// Put the card back to its power-on state.
    ///
    /// Any command or data block in progress is abandoned. The medium and
    /// any unflushed writes are kept.
    pub fn reset(&mut self) {
        self.status = Status::power_on();
        self.state = CommandState::AwaitingCommand;
        self.responses.clear();
        self.if_cond_seen = false;
        self.app_command = false;
    }

    /// Is there a medium bound to the card?
    pub fn is_bound(&self) -> bool {
        self.media.is_some()
    }

    /// Are there writes that have not reached the medium?
    pub fn is_dirty(&self) -> bool {
        self.media.as_ref().is_some_and(SectorCache::is_dirty)
    }

    /// Write any cached sectors out to the medium.
    ///
    /// Does nothing to the state of the bus protocol.
    pub fn commit(&mut self) -> Result<(), Error<D::Error>> {
        match self.media.as_mut() {
            Some(cache) => cache.flush().map_err(Error::DeviceError),
            None => Ok(()),
        }
    }

    /// Take the next response byte from the card.
    ///
    /// Returns `0xFF`, an idle line, when the card has nothing to say.
    pub fn read(&mut self) -> u8 {
        self.responses.pop().unwrap_or(IDLE_LINE)
    }

    /// Give the card one byte from the host.
    pub fn write(&mut self, byte: u8) {
        if self.media.is_none() {
            return;
        }
        let (next, action) = self.state.step(byte, self.current_command == CMD24);
        trace!("{:?} <- {:x}, now {:?}", self.state, byte, next);
        self.state = next;
        match action {
            Action::None => {}
            Action::StartCommand(index) => self.current_command = index,
            Action::Argument(idx) => self.argument[idx] = byte,
            Action::Execute => self.execute_command(),
            Action::Payload(idx) => self.write_payload[idx] = byte,
            Action::ExecuteData => self.write_single_block(),
        }
    }

    /// Clock one byte each way, the way a full-duplex SPI bus does.
    ///
    /// The card shifts its next response byte out while the host's byte is
    /// shifted in.
    pub fn exchange(&mut self, byte: u8) -> u8 {
        let out = self.read();
        self.write(byte);
        out
    }

    /// How many response bytes are waiting to be read
    pub fn pending(&self) -> usize {
        self.responses.len()
    }

    /// Where the card is in receiving a command
    pub fn state(&self) -> CommandState {
        self.state
    }

    /// The current R1 status
    pub fn status(&self) -> Status {
        self.status
    }

    /// The number of 512 byte sectors the card reports, or zero if nothing
    /// is bound.
    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    /// The C_SIZE field of the CSD
    pub fn capacity_field(&self) -> u16 {
        self.c_size
    }

    /// The CSD register this card sends for `SEND_CSD`
    pub fn csd(&self) -> CsdV2 {
        CsdV2::for_capacity(self.c_size)
    }

    /// The CID register this card sends for `SEND_CID`
    pub fn cid(&self) -> Cid {
        Cid::with_names(self.options.oem_id, self.options.product_name)
    }

    /// The options this card was built with
    pub fn options(&self) -> &CardOptions {
        &self.options
    }
}

/// Work out the sector count and C_SIZE for a medium, if we can present it
/// as an SDHC card.
fn capacity<E>(geometry: &Geometry) -> Result<(u32, u16), Error<E>>
where
    E: core::fmt::Debug,
{
    if geometry.sector_size != BLOCK_LEN_U16 {
        warn!("Image sector size {} not supported", geometry.sector_size);
        return Err(Error::BadBlockSize(geometry.sector_size));
    }
    let total_sectors = geometry.total_sectors();
    if total_sectors == 0 || total_sectors % 1024 != 0 {
        warn!("Image size not supported: {} sectors", total_sectors);
        return Err(Error::UnsupportedSectorCount(total_sectors));
    }
    // memory capacity = (C_SIZE + 1) * 512 KiB
    let c_size = (total_sectors >> 10) - 1;
    if c_size >= u64::from(C_SIZE_LIMIT) {
        warn!("Image size too big (>32 GiB)");
        return Err(Error::TooLarge(u32::try_from(c_size).unwrap_or(u32::MAX)));
    }
    // Both fit: C_SIZE is under 65375, so there are under 2**26 sectors
    Ok((total_sectors as u32, c_size as u16))
}

/// Options for the emulated card.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardOptions {
    /// The OEM/Application ID reported in the CID
    pub oem_id: [u8; 2],
    /// The product name reported in the CID
    pub product_name: [u8; 5],
}

impl Default for CardOptions {
    fn default() -> Self {
        CardOptions {
            oem_id: *b"  ",
            product_name: *b"FUSE\0",
        }
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
