//! Command dispatch, and what each command does.

use byteorder::{BigEndian, ByteOrder};

use super::Card;
use crate::blockdevice::{BlockDevice, BlockIdx, BLOCK_LEN};
use crate::sdmmc_proto::*;
use crate::{debug, warn};

impl<D> Card<D>
where
    D: BlockDevice,
{
    /// The argument of the current command
    fn argument(&self) -> u32 {
        BigEndian::read_u32(&self.argument)
    }

    /// Run a command once its CRC byte has arrived.
    pub(super) fn execute_command(&mut self) {
        // The error bits only ever describe the most recent command
        self.status.clear_errors();
        debug!(
            "{}CMD{} arg {:x}",
            if self.app_command { "A" } else { "" },
            self.current_command,
            self.argument()
        );

        // After APP_CMD, anything that isn't an application command is
        // treated as a standard command
        if core::mem::replace(&mut self.app_command, false) && self.execute_app_command() {
            return;
        }
        self.execute_standard_command();
    }

    /// Returns `false` if the current command isn't an application command.
    fn execute_app_command(&mut self) -> bool {
        match self.current_command {
            ACMD13 | ACMD22 | ACMD23 | ACMD42 | ACMD51 => {
                warn!("Unsupported application command {}", self.current_command);
                self.status.insert(Status::ILLEGAL_COMMAND);
                self.responses.set_r1(self.status);
            }
            ACMD41 => {
                // An SDHC card stays idle if the host skipped CMD8, or says
                // it can only handle standard capacity cards
                if self.if_cond_seen && (self.argument() & ACMD41_HCS) != 0 {
                    self.status.remove(Status::IN_IDLE);
                }
                self.responses.set_r1(self.status);
            }
            _ => return false,
        }
        true
    }

    fn execute_standard_command(&mut self) {
        match self.current_command {
            CMD0 => {
                self.status = Status::IN_IDLE;
                self.if_cond_seen = false;
                self.responses.set_r1(self.status);
            }
            CMD8 => {
                self.if_cond_seen = true;
                // Accept the voltage and echo the check pattern
                let pattern = u32::from(self.argument[3]);
                self.responses
                    .set_r7(self.status, IF_COND_VOLTAGE_ACCEPTED | pattern);
            }
            CMD9 => {
                let csd = self.csd();
                self.responses.set_data_block(self.status, &csd.data);
            }
            CMD10 => {
                let cid = self.cid();
                self.responses.set_data_block(self.status, &cid.data);
            }
            CMD17 => self.read_single_block(),
            // The data phase does the work
            CMD24 => self.responses.set_r1(self.status),
            CMD55 => {
                self.app_command = true;
                self.responses.set_r1(self.status);
            }
            CMD58 => {
                // Powered up, and high capacity
                self.responses
                    .set_r7(self.status, OCR_POWER_UP_STATUS | OCR_CCS);
            }
            _ => {
                warn!("Unknown command {}", self.current_command);
                self.status.insert(Status::ILLEGAL_COMMAND);
                self.responses.set_r1(self.status);
            }
        }
    }

    /// The sector the current command addresses, if it is on the card.
    ///
    /// Flags a parameter error and queues a bare R1 if it isn't.
    fn addressed_sector(&mut self) -> Option<BlockIdx> {
        let sector = self.argument();
        if sector >= self.total_sectors {
            warn!(
                "Sector {} out of range ({} sectors)",
                sector, self.total_sectors
            );
            self.status.insert(Status::PARAMETER_ERROR);
            self.responses.set_r1(self.status);
            return None;
        }
        Some(BlockIdx(sector))
    }

    fn read_single_block(&mut self) {
        let Some(block_idx) = self.addressed_sector() else {
            return;
        };
        let mut block = [0u8; BLOCK_LEN];
        let result = match self.media.as_ref() {
            Some(cache) => cache.read_sector(block_idx, &mut block).is_ok(),
            None => false,
        };
        if result {
            self.responses.set_sector(self.status, &block);
        } else {
            warn!("Failed to read sector {}", block_idx.0);
            self.responses.set_data_error(self.status);
        }
    }

    /// Run the data half of `WRITE_BLOCK`, once the whole block and its CRC
    /// have arrived.
    pub(super) fn write_single_block(&mut self) {
        let Some(block_idx) = self.addressed_sector() else {
            return;
        };
        match self.media.as_mut() {
            Some(cache) => {
                cache.write_sector(block_idx, &self.write_payload);
                self.responses.set_data_accepted();
            }
            None => {
                warn!("Nowhere to write sector {}", block_idx.0);
                self.responses.set_data_error(self.status);
            }
        }
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
