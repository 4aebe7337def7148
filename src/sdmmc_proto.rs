//! sdmmc-emu - Constants from the SD Specifications
//!
//! Command numbers and tokens follow the names used by SdFat, under the
//! following terms:
//!
//! > Copyright (c) 2011-2018 Bill Greiman
//! > This file is part of the SdFat library for SD memory cards.
//! >
//! > MIT License
//! >
//! > Permission is hereby granted, free of charge, to any person obtaining a
//! > copy of this software and associated documentation files (the "Software"),
//! > to deal in the Software without restriction, including without limitation
//! > the rights to use, copy, modify, merge, publish, distribute, sublicense,
//! > and/or sell copies of the Software, and to permit persons to whom the
//! > Software is furnished to do so, subject to the following conditions:
//! >
//! > The above copyright notice and this permission notice shall be included
//! > in all copies or substantial portions of the Software.
//! >
//! > THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
//! > OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//! > FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//! > AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//! > LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
//! > FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
//! > DEALINGS IN THE SOFTWARE.

use byteorder::{BigEndian, ByteOrder};

//==============================================================================

// SD Card Commands

/// GO_IDLE_STATE - init card in spi mode if CS low
pub const CMD0: u8 = 0x00;
/// SEND_IF_COND - verify SD Memory Card interface operating condition.*/
pub const CMD8: u8 = 0x08;
/// SEND_CSD - read the Card Specific Data (CSD register)
pub const CMD9: u8 = 0x09;
/// SEND_CID - read the card identification information (CID register)
pub const CMD10: u8 = 0x0A;
/// SEND_STATUS - read the card status register
pub const CMD13: u8 = 0x0D;
/// READ_SINGLE_BLOCK - read a single data block from the card
pub const CMD17: u8 = 0x11;
/// WRITE_BLOCK - write a single data block to the card
pub const CMD24: u8 = 0x18;
/// APP_CMD - escape for application specific command
pub const CMD55: u8 = 0x37;
/// READ_OCR - read the OCR register of a card
pub const CMD58: u8 = 0x3A;
/// CRC_ON_OFF - enable or disable CRC checking
pub const CMD59: u8 = 0x3B;

// Application specific commands, only valid straight after CMD55

/// SD_STATUS - read the SD status register
pub const ACMD13: u8 = 0x0D;
/// SEND_NUM_WR_BLOCKS - number of well-written blocks
pub const ACMD22: u8 = 0x16;
/// SET_WR_BLK_ERASE_COUNT - blocks to pre-erase before writing
pub const ACMD23: u8 = 0x17;
/// SD_SEND_OP_COMD - Sends host capacity support information and activates
/// the card's initialization process
pub const ACMD41: u8 = 0x29;
/// SET_CLR_CARD_DETECT - connect or disconnect the pull-up on CS
pub const ACMD42: u8 = 0x2A;
/// SEND_SCR - read the SD Configuration register
pub const ACMD51: u8 = 0x33;

/// Every command byte has a start bit of 0 and a transmission bit of 1 in
/// its top two bits.
pub const CMD_FRAME_MASK: u8 = 0xC0;

/// What the top two bits of a command byte must hold
pub const CMD_FRAME_START: u8 = 0x40;

/// The command index lives in the bottom six bits of the command byte
pub const CMD_INDEX_MASK: u8 = 0x3F;

//==============================================================================

/// status for card in the ready state
pub const R1_READY_STATE: u8 = 0x00;

/// status for card in the idle state
pub const R1_IDLE_STATE: u8 = 0x01;

/// status bit for illegal command
pub const R1_ILLEGAL_COMMAND: u8 = 0x04;

/// status bit for an argument out of range
pub const R1_PARAMETER_ERROR: u8 = 0x40;

/// start data token for read or write single block*/
pub const DATA_START_BLOCK: u8 = 0xFE;

/// data error token, sent instead of a data block when the read failed
pub const DATA_ERROR_TOKEN: u8 = 0x01;

/// mask for data response tokens after a write block operation
pub const DATA_RES_MASK: u8 = 0x1F;

/// write data accepted token
pub const DATA_RES_ACCEPTED: u8 = 0x05;

/// sent after the data response token once programming has finished
pub const PROGRAMMING_DONE: u8 = 0x01;

/// What the host sees on the data line when the card has nothing to say
pub const IDLE_LINE: u8 = 0xFF;

/// ACMD41 argument bit: the host supports high capacity cards
pub const ACMD41_HCS: u32 = 0x4000_0000;

/// OCR bit: card power up status
pub const OCR_POWER_UP_STATUS: u32 = 0x8000_0000;

/// OCR bit: card capacity status, set for SDHC and SDXC cards
pub const OCR_CCS: u32 = 0x4000_0000;

/// CMD8 response: the voltage range we accept (2.7-3.6V), without the check
/// pattern
pub const IF_COND_VOLTAGE_ACCEPTED: u32 = 0x0000_0100;

/// The largest C_SIZE an SDHC card may report, plus one (32 GiB minus 80 MiB)
pub const C_SIZE_LIMIT: u32 = 65375;

//==============================================================================

/// The R1 status byte that starts every response.
///
/// `IN_IDLE` stays put from one command to the next. `ILLEGAL_COMMAND` and
/// `PARAMETER_ERROR` only ever describe the command that was just executed.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
    /// The card is still initialising
    pub const IN_IDLE: Status = Status(R1_IDLE_STATE);
    /// The last command was not recognised
    pub const ILLEGAL_COMMAND: Status = Status(R1_ILLEGAL_COMMAND);
    /// The last command's argument was out of range
    pub const PARAMETER_ERROR: Status = Status(R1_PARAMETER_ERROR);

    /// The status of a card that has just powered up
    pub const fn power_on() -> Status {
        Status::IN_IDLE
    }

    /// The raw R1 byte
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Are all the bits in `flag` set?
    pub const fn contains(self, flag: Status) -> bool {
        (self.0 & flag.0) == flag.0
    }

    /// Set the bits in `flag`
    pub fn insert(&mut self, flag: Status) {
        self.0 |= flag.0;
    }

    /// Clear the bits in `flag`
    pub fn remove(&mut self, flag: Status) {
        self.0 &= !flag.0;
    }

    /// Drop the error bits, keeping only `IN_IDLE`
    pub fn clear_errors(&mut self) {
        self.0 &= R1_IDLE_STATE;
    }
}

impl Default for Status {
    fn default() -> Status {
        Status::power_on()
    }
}

/// Card Specific Data, version 2
///
/// This is the layout an SDHC card uses. The device size counts 512 KiB
/// units, less one.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CsdV2 {
    /// The 16-bytes of data in this Card Specific Data block
    pub data: [u8; 16],
}

impl CsdV2 {
    /// Create a new, empty, CSD
    pub fn new() -> CsdV2 {
        CsdV2::default()
    }

    /// Build the CSD we report for a card with the given C_SIZE.
    ///
    /// Everything not listed here is left as zero.
    pub fn for_capacity(c_size: u16) -> CsdV2 {
        let mut csd = CsdV2::new();
        // CSD_STRUCTURE = 1, version 2.0
        csd.data[0] = 0x40;
        // READ_BL_LEN = 9, 512 byte sectors
        csd.data[5] = 0x09;
        // C_SIZE is 22 bits; the top six are always zero for us
        BigEndian::write_u16(&mut csd.data[8..10], c_size);
        // WRITE_BL_LEN, spread across two bytes
        csd.data[12] = 0x10;
        csd.data[13] = 0x01;
        // Bit 0 is not used and always 1
        csd.data[15] = 0x01;
        csd
    }

    define_field!(csd_ver, u8, 0, 6, 2);
    define_field!(read_block_length, u8, 5, 0, 4);
    define_field!(device_size, u32, [(7, 0, 6), (8, 0, 8), (9, 0, 8)]);
    define_field!(crc, u8, 15, 0, 8);

    /// Returns the card capacity in bytes
    pub fn card_capacity_bytes(&self) -> u64 {
        (u64::from(self.device_size()) + 1) * 512 * 1024
    }

    /// Returns the card capacity in 512-byte blocks
    pub fn card_capacity_blocks(&self) -> u32 {
        (self.device_size() + 1) * 1024
    }
}

/// Card Identification register
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cid {
    /// The 16-bytes of data in this Card Identification block
    pub data: [u8; 16],
}

impl Cid {
    /// Create a new, empty, CID
    pub fn new() -> Cid {
        Cid::default()
    }

    /// Build a CID with the given OEM and product name and nothing else.
    pub fn with_names(oem_id: [u8; 2], product_name: [u8; 5]) -> Cid {
        let mut cid = Cid::new();
        cid.data[1..3].copy_from_slice(&oem_id);
        cid.data[3..8].copy_from_slice(&product_name);
        // Bit 0 is not used and always 1
        cid.data[15] = 0x01;
        cid
    }

    define_field!(manufacturer_id, u8, 0);
    define_field!(product_revision, u8, 8);
    define_field!(serial_number, u32, 9);
    define_field!(manufacture_date, u16, [(13, 0, 4), (14, 0, 8)]);
    define_field!(crc, u8, 15, 1, 7);

    /// The two character OEM/Application ID
    pub fn oem_id(&self) -> [u8; 2] {
        [self.data[1], self.data[2]]
    }

    /// The five character product name
    pub fn product_name(&self) -> [u8; 5] {
        let mut name = [0u8; 5];
        name.copy_from_slice(&self.data[3..8]);
        name
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
