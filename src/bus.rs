//! Lets an SPI-mode SD card driver talk straight to the emulated card.
//!
//! [`Card`] implements [`embedded_hal::spi::SpiBus`], so anything written
//! against that trait can be pointed at an emulated card instead of a real
//! one. Every word is a full-duplex exchange: see [`Card::exchange`].

use core::convert::Infallible;

use embedded_hal::spi::{ErrorType, SpiBus};

use crate::blockdevice::BlockDevice;
use crate::sdcard::Card;
use crate::sdmmc_proto::IDLE_LINE;

impl<D> ErrorType for Card<D>
where
    D: BlockDevice,
{
    type Error = Infallible;
}

impl<D> SpiBus<u8> for Card<D>
where
    D: BlockDevice,
{
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for word in words.iter_mut() {
            *word = self.exchange(IDLE_LINE);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        for &word in words {
            self.exchange(word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let len = read.len().max(write.len());
        for idx in 0..len {
            let out = self.exchange(write.get(idx).copied().unwrap_or(IDLE_LINE));
            if let Some(word) = read.get_mut(idx) {
                *word = out;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        for word in words.iter_mut() {
            *word = self.exchange(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
