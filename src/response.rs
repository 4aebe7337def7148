//! Responses waiting to be clocked out of the card.
//!
//! Every response starts with the R1 status byte. The longest one is a data
//! block: status, start token, 512 data bytes and a two byte CRC.

use byteorder::{BigEndian, ByteOrder};
use heapless::Deque;

use crate::blockdevice::Block;
use crate::sdmmc_proto::*;
use crate::warn;

/// The most bytes any single response can hold
pub const MAX_RESPONSE_LEN: usize = 1 + 1 + crate::blockdevice::BLOCK_LEN + 2;

/// A bounded FIFO of response bytes.
///
/// Building a new response throws away whatever the host has not read of the
/// old one, which is what happens on a real card when a new command arrives.
#[derive(Debug, Default)]
pub struct ResponseQueue {
    bytes: Deque<u8, MAX_RESPONSE_LEN>,
}

impl ResponseQueue {
    /// Create an empty queue
    pub const fn new() -> ResponseQueue {
        ResponseQueue {
            bytes: Deque::new(),
        }
    }

    /// Take the next byte, if there is one.
    pub fn pop(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }

    /// How many bytes are waiting
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Is there nothing waiting?
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    fn extend(&mut self, data: &[u8]) {
        let room = self.bytes.capacity() - self.bytes.len();
        if data.len() > room {
            warn!("Response overflow, dropped {} bytes", data.len() - room);
        }
        for &b in data.iter().take(room) {
            // Can't fail, we only take what fits
            let _ = self.bytes.push_back(b);
        }
    }

    /// R1: the status byte on its own.
    pub fn set_r1(&mut self, status: Status) {
        self.clear();
        self.extend(&[status.bits()]);
    }

    /// R3/R7: the status byte then a 32-bit value, most significant byte
    /// first.
    pub fn set_r7(&mut self, status: Status, value: u32) {
        let mut buf = [status.bits(), 0, 0, 0, 0];
        BigEndian::write_u32(&mut buf[1..], value);
        self.clear();
        self.extend(&buf);
    }

    /// The status byte, then a data block with a zero CRC.
    pub fn set_data_block(&mut self, status: Status, payload: &[u8]) {
        self.clear();
        self.extend(&[status.bits(), DATA_START_BLOCK]);
        self.extend(payload);
        self.extend(&[0x00, 0x00]);
    }

    /// A full sector, the answer to a successful single block read.
    pub fn set_sector(&mut self, status: Status, block: &Block) {
        self.set_data_block(status, block)
    }

    /// The status byte, then a data error token instead of the block.
    pub fn set_data_error(&mut self, status: Status) {
        self.clear();
        self.extend(&[status.bits(), DATA_ERROR_TOKEN]);
    }

    /// The data response token for an accepted block, then the end of
    /// busy.
    pub fn set_data_accepted(&mut self) {
        self.clear();
        self.extend(&[DATA_RES_ACCEPTED, PROGRAMMING_DONE]);
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
