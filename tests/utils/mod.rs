//! Useful library code for tests

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::prelude::*;

use embedded_hal::spi::SpiBus;
use sdmmc_emu::blockdevice::BLOCK_LEN;
use sdmmc_emu::sdmmc_proto::*;
use sdmmc_emu::{Block, BlockCount, BlockDevice, BlockIdx, Card, Geometry};

/// This file contains 2048 sectors (1 MiB). Every sector starts with its own
/// index as a big-endian `u32`; byte `j` after that holds `(31 * index + j)
/// mod 256`. See [`expected_sector`].
///
/// It will unpack to a Vec that is 1 MiB in size.
pub static DISK_SOURCE: &[u8] = include_bytes!("../disk.img.gz");

/// How many sectors are in [`DISK_SOURCE`]
pub const DISK_SECTORS: u32 = 2048;

/// SHA-256 of the whole unpacked [`DISK_SOURCE`]
pub static DISK_SHA256_SUM: &str =
    "5d6a5f127608c3326636a5c2581b7ecabbf7b519260e99790eea6a168e68a6f4";

#[derive(Debug)]
pub enum Error {
    /// Failed to read the source image
    Io(std::io::Error),
    /// Asked for a block we don't have
    OutOfBounds(BlockIdx),
    /// Asked for a block we've been told to fail on
    BadBlock(BlockIdx),
    /// Asked for the geometry when we've been told to fail
    NoGeometry,
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Implements the block device trait for a chunk of bytes in RAM.
///
/// The slice should be a multiple of `BLOCK_LEN` bytes in length. If it
/// isn't the trailing data is ignored.
pub struct RamDisk<T> {
    contents: RefCell<T>,
    geometry: Option<Geometry>,
    bad_blocks: Vec<BlockIdx>,
    fail_geometry: bool,
}

impl<T> RamDisk<T>
where
    T: AsMut<[u8]> + AsRef<[u8]>,
{
    pub fn new(contents: T) -> RamDisk<T> {
        RamDisk {
            contents: RefCell::new(contents),
            geometry: None,
            bad_blocks: Vec::new(),
            fail_geometry: false,
        }
    }

    /// Report this geometry, whatever size we actually are.
    pub fn with_geometry(mut self, geometry: Geometry) -> RamDisk<T> {
        self.geometry = Some(geometry);
        self
    }

    /// Fail every read and write of this block.
    pub fn with_bad_block(mut self, block_idx: BlockIdx) -> RamDisk<T> {
        self.bad_blocks.push(block_idx);
        self
    }

    /// Fail to report a geometry at all.
    pub fn without_geometry(mut self) -> RamDisk<T> {
        self.fail_geometry = true;
        self
    }

    /// A copy of one block, straight from RAM.
    pub fn block(&self, block_idx: BlockIdx) -> Block {
        let borrow = self.contents.borrow();
        let start_offset = block_idx.0 as usize * BLOCK_LEN;
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(&borrow.as_ref()[start_offset..start_offset + BLOCK_LEN]);
        block
    }

    pub fn into_inner(self) -> T {
        self.contents.into_inner()
    }
}

impl<T> BlockDevice for RamDisk<T>
where
    T: AsMut<[u8]> + AsRef<[u8]>,
{
    type Error = Error;

    fn read(&self, block: &mut Block, block_idx: BlockIdx) -> Result<(), Self::Error> {
        if self.bad_blocks.contains(&block_idx) {
            return Err(Error::BadBlock(block_idx));
        }
        let borrow = self.contents.borrow();
        let contents: &[u8] = borrow.as_ref();
        let start_offset = block_idx.0 as usize * BLOCK_LEN;
        let end_offset = start_offset + BLOCK_LEN;
        if end_offset > contents.len() {
            return Err(Error::OutOfBounds(block_idx));
        }
        block.copy_from_slice(&contents[start_offset..end_offset]);
        Ok(())
    }

    fn write(&self, block: &Block, block_idx: BlockIdx) -> Result<(), Self::Error> {
        if self.bad_blocks.contains(&block_idx) {
            return Err(Error::BadBlock(block_idx));
        }
        let mut borrow = self.contents.borrow_mut();
        let contents: &mut [u8] = borrow.as_mut();
        let start_offset = block_idx.0 as usize * BLOCK_LEN;
        let end_offset = start_offset + BLOCK_LEN;
        if end_offset > contents.len() {
            return Err(Error::OutOfBounds(block_idx));
        }
        contents[start_offset..end_offset].copy_from_slice(block);
        Ok(())
    }

    fn geometry(&self) -> Result<Geometry, Self::Error> {
        if self.fail_geometry {
            return Err(Error::NoGeometry);
        }
        if let Some(geometry) = self.geometry {
            return Ok(geometry);
        }
        let borrow = self.contents.borrow();
        let len_blocks = borrow.as_ref().len() / BLOCK_LEN;
        if len_blocks > u32::MAX as usize {
            panic!("Test disk too large! Only 2**32 blocks allowed");
        }
        Ok(Geometry::linear(BlockCount(len_blocks as u32)))
    }
}

/// Unpack the fixed, static, disk image.
fn unpack_disk(gzip_bytes: &[u8]) -> Result<Vec<u8>, Error> {
    let disk_cursor = std::io::Cursor::new(gzip_bytes);
    let mut gz_decoder = flate2::read::GzDecoder::new(disk_cursor);
    let mut output = Vec::with_capacity(DISK_SECTORS as usize * BLOCK_LEN);
    gz_decoder.read_to_end(&mut output)?;
    Ok(output)
}

/// Turn some gzipped bytes into a block device,
pub fn make_block_device(gzip_bytes: &[u8]) -> Result<RamDisk<Vec<u8>>, Error> {
    let data = unpack_disk(gzip_bytes)?;
    Ok(RamDisk::new(data))
}

/// A blank block device with this many sectors.
pub fn blank_block_device(sectors: u32) -> RamDisk<Vec<u8>> {
    RamDisk::new(vec![0u8; sectors as usize * BLOCK_LEN])
}

/// What sector `index` of [`DISK_SOURCE`] holds.
pub fn expected_sector(index: u32) -> Block {
    let mut block = [0u8; BLOCK_LEN];
    block[0..4].copy_from_slice(&index.to_be_bytes());
    for (j, b) in block.iter_mut().enumerate().skip(4) {
        *b = (index.wrapping_mul(31) as usize + j) as u8;
    }
    block
}

/// A block full of something recognisable.
pub fn test_pattern(seed: u8) -> Block {
    let mut block = [0u8; BLOCK_LEN];
    for (j, b) in block.iter_mut().enumerate() {
        *b = seed ^ (j as u8).rotate_left(3);
    }
    block
}

/// SHA-256 of some bytes, as a lower-case hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    format!("{:x}", Sha256::digest(data))
}

/// Send log output to the test harness, if anyone asks for it with
/// `RUST_LOG`.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A card bound to the unpacked test image.
pub fn make_card() -> Card<RamDisk<Vec<u8>>> {
    init_logging();
    let disk = make_block_device(DISK_SOURCE).unwrap();
    let mut card = Card::new();
    card.bind(disk).expect("bind test image");
    card
}

/// Feed a whole command frame into a card, byte by byte, with a dummy CRC.
pub fn send_command<D: BlockDevice>(card: &mut Card<D>, command: u8, arg: u32) {
    card.write(0x40 | command);
    for b in arg.to_be_bytes() {
        card.write(b);
    }
    card.write(0x01);
}

/// Read out everything the card has queued.
pub fn drain<D: BlockDevice>(card: &mut Card<D>) -> Vec<u8> {
    let mut out = Vec::new();
    while card.pending() > 0 {
        out.push(card.read());
    }
    out
}

/// Perform the 7-bit CRC used on the SD card
pub fn crc7(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for mut d in data.iter().cloned() {
        for _bit in 0..8 {
            crc <<= 1;
            if ((d & 0x80) ^ (crc & 0x80)) != 0 {
                crc ^= 0x09;
            }
            d <<= 1;
        }
    }
    (crc << 1) | 1
}

/// How many times the host polls before it gives up
const POLL_LIMIT: u32 = 512;

/// The ways the test host can give up on the card.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HostError {
    /// We didn't get a response when executing this command
    TimeoutCommand(u8),
    /// We didn't get a response when executing this application-specific command
    TimeoutACommand(u8),
    /// We didn't get a response when waiting for the card to not be busy
    TimeoutWaitNotBusy,
    /// We didn't get a response when reading data from the card
    TimeoutReadBuffer,
    /// The card sent this instead of a data start token
    ReadError(u8),
    /// The card sent this data response after a block write
    WriteError(u8),
    /// The card answered a command with this R1 status
    Rejected(u8),
    /// We got a bad response from Command 58
    Cmd58Error,
    /// Couldn't find the card
    CardNotFound,
}

/// The different types of card a host can find.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CardType {
    /// Didn't understand CMD8
    SD1,
    /// Understood CMD8, but is byte addressed
    SD2,
    /// A high-capacity card, block addressed
    SDHC,
}

/// A host-side SPI-mode driver, talking to the card through `SpiBus`.
pub struct Host<D>
where
    D: BlockDevice,
{
    card: Card<D>,
}

impl<D> Host<D>
where
    D: BlockDevice,
{
    pub fn new(card: Card<D>) -> Host<D> {
        Host { card }
    }

    pub fn card(&mut self) -> &mut Card<D> {
        &mut self.card
    }

    pub fn into_card(self) -> Card<D> {
        self.card
    }

    /// Initializes the card into a known state (or at least tries to).
    pub fn acquire(&mut self, host_capacity_support: bool) -> Result<CardType, HostError> {
        // Supply minimum of 74 clock cycles without CS asserted.
        for _ in 0..10 {
            self.send(0xFF);
        }
        let mut attempts = 32;
        loop {
            if attempts == 0 {
                return Err(HostError::CardNotFound);
            }
            if self.card_command(CMD0, 0)? == R1_IDLE_STATE {
                break;
            }
            attempts -= 1;
        }
        // Check card version
        let (card_type, arg) =
            if self.card_command(CMD8, 0x1AA)? == (R1_ILLEGAL_COMMAND | R1_IDLE_STATE) {
                (CardType::SD1, 0)
            } else {
                self.receive();
                self.receive();
                self.receive();
                if self.receive() != 0xAA {
                    return Err(HostError::TimeoutCommand(CMD8));
                }
                let arg = if host_capacity_support { ACMD41_HCS } else { 0 };
                (CardType::SD2, arg)
            };

        let mut attempts = 0;
        while self.card_acmd(ACMD41, arg)? != R1_READY_STATE {
            attempts += 1;
            if attempts == 16 {
                return Err(HostError::TimeoutACommand(ACMD41));
            }
        }

        if card_type == CardType::SD2 {
            if self.card_command(CMD58, 0)? != 0 {
                return Err(HostError::Cmd58Error);
            }
            let is_sdhc = (self.receive() & 0xC0) == 0xC0;
            // Discard other three bytes
            self.receive();
            self.receive();
            self.receive();
            if is_sdhc {
                return Ok(CardType::SDHC);
            }
        }
        Ok(card_type)
    }

    /// Read one block.
    pub fn read_block(&mut self, block_idx: BlockIdx) -> Result<Block, HostError> {
        let r1 = self.card_command(CMD17, block_idx.0)?;
        if r1 != R1_READY_STATE {
            return Err(HostError::Rejected(r1));
        }
        let mut block = [0u8; BLOCK_LEN];
        self.read_data(&mut block)?;
        Ok(block)
    }

    /// Write one block.
    pub fn write_block(&mut self, block_idx: BlockIdx, block: &Block) -> Result<(), HostError> {
        let r1 = self.card_command(CMD24, block_idx.0)?;
        if r1 != R1_READY_STATE {
            return Err(HostError::Rejected(r1));
        }
        let status = self.write_data(DATA_START_BLOCK, block)?;
        if (status & DATA_RES_MASK) != DATA_RES_ACCEPTED {
            return Err(HostError::WriteError(status));
        }
        self.wait_not_busy()
    }

    /// Read a 16 byte register with the given command.
    pub fn read_register(&mut self, command: u8) -> Result<[u8; 16], HostError> {
        let r1 = self.card_command(command, 0)?;
        if r1 != R1_READY_STATE {
            return Err(HostError::Rejected(r1));
        }
        let mut data = [0u8; 16];
        self.read_data(&mut data)?;
        Ok(data)
    }

    /// Read an arbitrary number of bytes from the card. Always fills the
    /// given buffer, so make sure it's the right size.
    ///
    /// Returns the CRC the card sent; the emulated card always sends zero.
    pub fn read_data(&mut self, buffer: &mut [u8]) -> Result<u16, HostError> {
        // Get first non-FF byte.
        let mut polls = 0;
        let status = loop {
            let s = self.receive();
            if s != 0xFF {
                break s;
            }
            polls += 1;
            if polls == POLL_LIMIT {
                return Err(HostError::TimeoutReadBuffer);
            }
        };
        if status != DATA_START_BLOCK {
            return Err(HostError::ReadError(status));
        }

        buffer.fill(0xFF);
        self.card.transfer_in_place(buffer).unwrap();

        let mut crc = u16::from(self.receive());
        crc <<= 8;
        crc |= u16::from(self.receive());
        Ok(crc)
    }

    /// Write an arbitrary number of bytes to the card, returning the data
    /// response token.
    pub fn write_data(&mut self, token: u8, buffer: &[u8]) -> Result<u8, HostError> {
        self.send(token);
        SpiBus::write(&mut self.card, buffer).unwrap();
        // We don't do CRCs, and nor does the card
        self.send(0x00);
        self.send(0x00);
        Ok(self.receive())
    }

    /// Perform an application-specific command.
    pub fn card_acmd(&mut self, command: u8, arg: u32) -> Result<u8, HostError> {
        self.card_command(CMD55, 0)?;
        self.card_command(command, arg)
    }

    /// Perform a command.
    pub fn card_command(&mut self, command: u8, arg: u32) -> Result<u8, HostError> {
        if command != CMD0 {
            self.wait_not_busy()?;
        }

        let mut buf = [
            0x40 | command,
            (arg >> 24) as u8,
            (arg >> 16) as u8,
            (arg >> 8) as u8,
            arg as u8,
            0,
        ];
        buf[5] = crc7(&buf[0..5]);

        for b in buf.iter() {
            self.send(*b);
        }

        for _ in 0..POLL_LIMIT {
            let result = self.receive();
            if (result & 0x80) == 0 {
                return Ok(result);
            }
        }

        Err(HostError::TimeoutCommand(command))
    }

    /// Receive a byte from the SD card by clocking in an 0xFF byte.
    pub fn receive(&mut self) -> u8 {
        self.transfer(0xFF)
    }

    /// Send a byte from the SD card.
    pub fn send(&mut self, out: u8) {
        let _ = self.transfer(out);
    }

    /// Send one byte and receive one byte.
    pub fn transfer(&mut self, out: u8) -> u8 {
        let mut buf = [out];
        self.card.transfer_in_place(&mut buf).unwrap();
        buf[0]
    }

    /// Spin until the card returns 0xFF, or we spin too many times and
    /// timeout.
    pub fn wait_not_busy(&mut self) -> Result<(), HostError> {
        for _ in 0..POLL_LIMIT {
            if self.receive() == 0xFF {
                return Ok(());
            }
        }
        Err(HostError::TimeoutWaitNotBusy)
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
