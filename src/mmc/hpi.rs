use log::{debug, info, warn};

use crate::err::MmcError;

use super::{
    cmd::{parse_r1, CmdResponse, MmcCommand, ResponseType},
    constant::*,
    regs::{CmdFlags, IrqStatus, RegisterBus},
    MmcHost, TransferState,
};

// Status request with the HPI bit set in the argument
const HPI_ARG_FLAG: u32 = 1;

#[derive(Debug, Default)]
pub(crate) struct HpiState {
    /// EXT_CSD HPI feature bits captured at init.
    pub support: u8,
    paused: bool,
    remaining_size: u32,
    src_addr: u64,
    dest: u32,
}

/// Result of a pause request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpiPause {
    /// The write was interrupted; `remaining` bytes are left for resume.
    Paused { remaining: u32 },
    /// Nothing was in flight, the current state is reported unchanged.
    Idle(TransferState),
}

impl<B: RegisterBus> MmcHost<B> {
    pub fn hpi_supported(&self) -> bool {
        self.hpi.support & DEVICE_HPI_SUPPORT != 0
    }

    pub fn hpi_paused(&self) -> bool {
        self.hpi.paused
    }

    /// Interrupt the SDMA write of `src` to block `dest` that is in flight.
    ///
    /// The card is stopped with HPI, the number of sectors it committed is
    /// read back from EXT_CSD and the tail of the request is remembered for
    /// [`MmcHost::resume_sdma_write_hpi`]. `src` must be the buffer the write
    /// was started with.
    pub fn pause_sdma_write_hpi(&mut self, src: &[u8], dest: u32) -> Result<HpiPause, MmcError> {
        self.hpi.paused = false;

        if self.state != TransferState::InProgress {
            return Ok(HpiPause::Idle(self.state));
        }
        if !self.hpi_supported() {
            return Err(MmcError::DeviceNotSupportHpi);
        }
        let total = u32::try_from(src.len()).map_err(|_| MmcError::InvalidParameter)? / BLK_SIZE;
        dest.checked_add(total.saturating_sub(1))
            .ok_or(MmcError::InvalidParameter)?;

        // The card is about to be stopped, keep the ISR out of it
        self.bus.write32(SRS14, 0);
        self.multi_block = false;
        self.transfer_complete = false;

        let result = self.interrupt_programming().and_then(|_| self.read_ext_csd());
        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        let ext_csd = match result {
            Ok(ext_csd) => ext_csd,
            Err(e) => {
                warn!("HPI pause failed: {}", e);
                self.state = TransferState::Fail;
                return Err(MmcError::TransferFail);
            }
        };

        let programmed = ext_csd.correctly_programmed_sectors().min(total);
        let remaining = total - programmed;

        self.hpi.remaining_size = remaining * BLK_SIZE;
        self.hpi.src_addr = src.as_ptr() as u64 + (programmed * BLK_SIZE) as u64;
        // Nothing left to resume once the card committed the last block
        self.hpi.dest = if remaining == 0 { dest } else { dest + programmed };
        self.hpi.paused = true;
        self.state = TransferState::InitSuccess;

        info!(
            "HPI paused write after {} of {} sectors",
            programmed, total
        );
        Ok(HpiPause::Paused {
            remaining: self.hpi.remaining_size,
        })
    }

    /// Restart the write stopped by [`MmcHost::pause_sdma_write_hpi`].
    ///
    /// Returns `Success` when the card had already committed everything,
    /// `InProgress` once the remaining sectors are queued.
    ///
    /// # Safety
    ///
    /// The buffer handed to the pause call is read by the controller again.
    /// It must still be valid and unchanged, and stay so until
    /// `transfer_status()` leaves `InProgress`.
    pub unsafe fn resume_sdma_write_hpi(&mut self) -> Result<TransferState, MmcError> {
        if !self.hpi.paused {
            return Err(MmcError::DeviceIsNotInHpiMode);
        }
        self.hpi.paused = false;

        if self.hpi.remaining_size == 0 {
            return Ok(TransferState::Success);
        }

        debug!(
            "HPI resume: {} bytes to block {:#x}",
            self.hpi.remaining_size, self.hpi.dest
        );
        self.state = TransferState::InitSuccess;
        self.sdma_write_raw(self.hpi.src_addr, self.hpi.dest, self.hpi.remaining_size)?;
        Ok(self.state)
    }

    fn interrupt_programming(&self) -> Result<(), MmcError> {
        let hpi_arg = self.rca_arg() | HPI_ARG_FLAG;

        if self.hpi.support & HPI_WITH_CMD12_SUPPORT != 0 {
            let resp = self.send_cmd(MmcCommand::new(
                MMC_CMD_12_STOP_TRANSMISSION,
                hpi_arg,
                ResponseType::R1b,
            ));
            debug!("HPI CMD12: {:?}", resp);
        } else {
            let status = MmcCommand::new(MMC_CMD_13_SEND_STATUS, hpi_arg, ResponseType::R1);
            let mut resp = self.send_cmd(status);
            let mut budget = self.poll_budget();
            while resp == Ok(CmdResponse::Busy) && budget > 0 {
                budget -= 1;
                resp = self.send_cmd(status);
            }
            debug!("HPI CMD13: {:?}", resp);

            let stop = self.send_cmd(MmcCommand::new(
                MMC_CMD_12_STOP_TRANSMISSION,
                self.rca_arg(),
                ResponseType::R1b,
            ));
            debug!("HPI stop: {:?}", stop);
        }

        self.wait_hpi_status()
    }

    // Abort-type CMD13 until the card leaves programming
    fn wait_hpi_status(&self) -> Result<(), MmcError> {
        let flags = CmdFlags::ABORT_CMD | CmdFlags::R1_48;
        let done = IrqStatus::COMMAND_COMPLETE | IrqStatus::ERROR_INTERRUPT;

        for _ in 0..self.poll_budget() {
            self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
            self.wait_not_inhibited()?;
            self.issue_cmd(MMC_CMD_13_SEND_STATUS, self.rca_arg() | HPI_ARG_FLAG, flags);

            let status = self.wait_for(SRS12, |v| v & done.bits() != 0)?;
            let status = IrqStatus::from_bits_truncate(status);
            if status.has_error() {
                return Err(MmcError::TransferFail);
            }
            match parse_r1(self.response())? {
                CmdResponse::Success => return Ok(()),
                CmdResponse::Busy => continue,
            }
        }
        Err(MmcError::Timeout)
    }
}
