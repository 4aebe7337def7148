//! Where the card is in receiving a command, or the data block that follows
//! one.

use crate::blockdevice::BLOCK_LEN;
use crate::sdmmc_proto::{CMD_FRAME_MASK, CMD_FRAME_START, CMD_INDEX_MASK, DATA_START_BLOCK};

/// The phases of the byte-level state machine.
///
/// A command is six bytes on the wire: the command byte, four argument
/// bytes and a CRC. A `WRITE_BLOCK` command is followed by a data phase: a
/// start token, 512 bytes of payload and a two byte CRC.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum CommandState {
    /// Looking for a byte that starts a command
    #[default]
    AwaitingCommand,
    /// Waiting for argument bits 31..24
    AwaitingArg0,
    /// Waiting for argument bits 23..16
    AwaitingArg1,
    /// Waiting for argument bits 15..8
    AwaitingArg2,
    /// Waiting for argument bits 7..0
    AwaitingArg3,
    /// Waiting for the (ignored) command CRC
    AwaitingCrc,
    /// Skipping bytes until the data start token turns up
    AwaitingDataToken,
    /// Collecting the data block
    AwaitingData {
        /// How many payload bytes we have so far
        received: usize,
    },
    /// Waiting for the first (ignored) data CRC byte
    AwaitingDataCrc1,
    /// Waiting for the second (ignored) data CRC byte
    AwaitingDataCrc2,
}

/// What the card has to do as a result of taking one byte from the bus.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    /// Nothing beyond the change of state
    None,
    /// A new command has started, with this index
    StartCommand(u8),
    /// Store this byte of the argument
    Argument(usize),
    /// The command is complete; run it
    Execute,
    /// Store this byte of the data block
    Payload(usize),
    /// The data block is complete; run the data half of the command
    ExecuteData,
}

/// Pull the command index out of a command byte, if it is one.
pub(crate) fn command_index(byte: u8) -> Option<u8> {
    if (byte & CMD_FRAME_MASK) == CMD_FRAME_START {
        Some(byte & CMD_INDEX_MASK)
    } else {
        None
    }
}

impl CommandState {
    /// The transition table.
    ///
    /// `expects_data` says whether the command currently being received has
    /// a data phase; it is only looked at when leaving `AwaitingCrc`.
    pub(crate) fn step(self, byte: u8, expects_data: bool) -> (CommandState, Action) {
        use CommandState::*;
        match self {
            AwaitingCommand => match command_index(byte) {
                Some(index) => (AwaitingArg0, Action::StartCommand(index)),
                None => (AwaitingCommand, Action::None),
            },
            AwaitingArg0 => (AwaitingArg1, Action::Argument(0)),
            AwaitingArg1 => (AwaitingArg2, Action::Argument(1)),
            AwaitingArg2 => (AwaitingArg3, Action::Argument(2)),
            AwaitingArg3 => (AwaitingCrc, Action::Argument(3)),
            AwaitingCrc if expects_data => (AwaitingDataToken, Action::Execute),
            AwaitingCrc => (AwaitingCommand, Action::Execute),
            AwaitingDataToken if byte == DATA_START_BLOCK => {
                (AwaitingData { received: 0 }, Action::None)
            }
            AwaitingDataToken => (AwaitingDataToken, Action::None),
            AwaitingData { received } if received + 1 == BLOCK_LEN => {
                (AwaitingDataCrc1, Action::Payload(received))
            }
            AwaitingData { received } => (
                AwaitingData {
                    received: received + 1,
                },
                Action::Payload(received),
            ),
            AwaitingDataCrc1 => (AwaitingDataCrc2, Action::None),
            AwaitingDataCrc2 => (AwaitingCommand, Action::ExecuteData),
        }
    }

    /// Is the card part way through a data block?
    pub fn in_data_phase(self) -> bool {
        matches!(
            self,
            CommandState::AwaitingDataToken
                | CommandState::AwaitingData { .. }
                | CommandState::AwaitingDataCrc1
                | CommandState::AwaitingDataCrc2
        )
    }
}


// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
