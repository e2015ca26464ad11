use log::{debug, trace};

use crate::err::MmcError;

use super::{
    constant::*,
    regs::{CmdFlags, IrqStatus, PresentState, RegisterBus},
    MmcHost,
};

/// Expected response format of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    NoResp,
    R1,
    R1b,
    R2,
    R3,
    R4,
    R5,
    R5b,
    R6,
    R7,
}

impl ResponseType {
    /// SRS03 response length and check bits.
    pub fn flags(&self) -> CmdFlags {
        match self {
            ResponseType::NoResp => CmdFlags::empty(),
            ResponseType::R2 => CmdFlags::RESP_LENGTH_136 | CmdFlags::CRC_CHECK_EN,
            ResponseType::R3 | ResponseType::R4 => CmdFlags::RESP_LENGTH_48,
            ResponseType::R1 | ResponseType::R5 | ResponseType::R6 | ResponseType::R7 => {
                CmdFlags::R1_48
            }
            ResponseType::R1b | ResponseType::R5b => {
                CmdFlags::RESP_LENGTH_48B | CmdFlags::CRC_CHECK_EN | CmdFlags::INDEX_CHECK_EN
            }
        }
    }

    fn carries_card_status(&self) -> bool {
        matches!(self, ResponseType::R1 | ResponseType::R1b)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MmcCommand {
    pub opcode: u8,
    pub arg: u32,
    pub resp_type: ResponseType,
}

impl MmcCommand {
    pub fn new(opcode: u8, arg: u32, resp_type: ResponseType) -> Self {
        Self {
            opcode,
            arg,
            resp_type,
        }
    }

    fn raw(&self) -> u32 {
        ((self.opcode as u32) << CMD_SHIFT) | self.resp_type.flags().bits()
    }
}

/// Outcome of a command that completed without a controller error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdResponse {
    Success,
    /// R1 status without READY_FOR_DATA.
    Busy,
}

impl CmdResponse {
    /// Treat a busy card as a failed command.
    pub fn ready(self) -> Result<(), MmcError> {
        match self {
            CmdResponse::Success => Ok(()),
            CmdResponse::Busy => Err(MmcError::TransferFail),
        }
    }
}

/// Decode an R1 card status word.
pub(crate) fn parse_r1(status: u32) -> Result<CmdResponse, MmcError> {
    if status & CARD_STATUS_ALL_ERRORS_MASK != 0 {
        debug!("card status error: {:#x}", status);
        return Err(MmcError::ResponseError);
    }
    if status & CARD_STATUS_READY_FOR_DATA != 0 {
        Ok(CmdResponse::Success)
    } else {
        Ok(CmdResponse::Busy)
    }
}

impl<B: RegisterBus> MmcHost<B> {
    /// Send a command and poll for its completion.
    pub fn send_cmd(&self, cmd: MmcCommand) -> Result<CmdResponse, MmcError> {
        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        let result = self.exec_cmd(&cmd);
        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }

    fn exec_cmd(&self, cmd: &MmcCommand) -> Result<CmdResponse, MmcError> {
        trace!("CMD{} arg {:#x} {:?}", cmd.opcode, cmd.arg, cmd.resp_type);

        self.wait_clear(SRS09, PresentState::CMD_INHIBIT_CMD.bits())?;

        self.bus.write32(SRS02, cmd.arg);
        self.bus.write32(SRS03, cmd.raw());

        // No response to wait for
        if matches!(
            cmd.opcode,
            MMC_CMD_0_GO_IDLE_STATE | MMC_CMD_4_SET_DSR | MMC_CMD_15_GOTO_INACTIVE_STATE
        ) {
            return Ok(CmdResponse::Success);
        }

        let status = self.wait_for(SRS12, |v| {
            v & (IrqStatus::COMMAND_COMPLETE | IrqStatus::ERROR_INTERRUPT).bits() != 0
        })?;
        let status = IrqStatus::from_bits_truncate(status);

        if status.has_error() || !status.contains(IrqStatus::COMMAND_COMPLETE) {
            debug!("CMD{} failed: {:?}", cmd.opcode, status);
            return Err(MmcError::TransferFail);
        }

        if cmd.resp_type.carries_card_status() {
            parse_r1(self.bus.read32(SRS04))
        } else {
            Ok(CmdResponse::Success)
        }
    }

    /// Start a command without waiting for completion.
    pub(crate) fn issue_cmd(&self, opcode: u8, arg: u32, flags: CmdFlags) {
        self.bus.write32(SRS02, arg);
        self.bus
            .write32(SRS03, ((opcode as u32) << CMD_SHIFT) | flags.bits());
    }

    pub(crate) fn rca_arg(&self) -> u32 {
        self.rca << RCA_SHIFT
    }

    pub(crate) fn response(&self) -> u32 {
        self.bus.read32(SRS04)
    }

    /// Wait for DAT0 release, then poll CMD13 until the card reports ready.
    pub(crate) fn check_device_status(&self, resp: CmdResponse) -> Result<(), MmcError> {
        self.wait_set(SRS09, PresentState::DAT0_SIGNAL_LEVEL.bits())?;

        let mut resp = resp;
        let mut budget = self.poll_budget();
        while resp == CmdResponse::Busy {
            if budget == 0 {
                return Err(MmcError::Timeout);
            }
            budget -= 1;
            resp = self.send_cmd(MmcCommand::new(
                MMC_CMD_13_SEND_STATUS,
                self.rca_arg(),
                ResponseType::R1,
            ))?;
        }
        Ok(())
    }

    /// CMD6 on an eMMC device, followed by the busy check.
    pub(crate) fn mmc_switch(&self, arg: u32) -> Result<(), MmcError> {
        let resp = self.send_cmd(MmcCommand::new(MMC_CMD_6_SWITCH, arg, ResponseType::R1b))?;
        self.check_device_status(resp)
    }

    /// Poll CMD13 until the card answers ready, ignoring transient failures.
    pub(crate) fn wait_card_ready(&self) -> Result<(), MmcError> {
        let cmd = MmcCommand::new(MMC_CMD_13_SEND_STATUS, self.rca_arg(), ResponseType::R1);
        for _ in 0..self.poll_budget() {
            if let Ok(CmdResponse::Success) = self.send_cmd(cmd) {
                return Ok(());
            }
        }
        Err(MmcError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmc::sim::SimBus;

    #[test]
    fn response_flag_table() {
        assert_eq!(ResponseType::NoResp.flags().bits(), 0);
        assert_eq!(ResponseType::R2.flags().bits(), 0x0009_0000);
        assert_eq!(ResponseType::R3.flags().bits(), 0x0002_0000);
        assert_eq!(ResponseType::R7.flags().bits(), 0x001A_0000);
        assert_eq!(ResponseType::R1b.flags().bits(), 0x001B_0000);
    }

    #[test]
    fn r1_status_decoding() {
        assert_eq!(parse_r1(0x900), Ok(CmdResponse::Success));
        assert_eq!(parse_r1(0x800), Ok(CmdResponse::Busy));
        assert_eq!(parse_r1(0x900 | 1 << 31), Err(MmcError::ResponseError));
    }

    #[test]
    fn go_idle_does_not_wait_for_response() {
        let sim = SimBus::mmc();
        let host = MmcHost::new(&sim);

        let resp = host.send_cmd(MmcCommand::new(MMC_CMD_0_GO_IDLE_STATE, 0, ResponseType::NoResp));

        assert_eq!(resp, Ok(CmdResponse::Success));
        assert_eq!(sim.reg(SRS03), 0);
        assert_eq!(sim.commands(), vec![(0, 0)]);
    }

    #[test]
    fn failed_command_is_reported() {
        let sim = SimBus::mmc();
        sim.fail_command(MMC_CMD_9_SEND_CSD);
        let host = MmcHost::new(&sim);

        let resp = host.send_cmd(MmcCommand::new(MMC_CMD_9_SEND_CSD, 1 << 16, ResponseType::R2));

        assert_eq!(resp, Err(MmcError::TransferFail));
        assert_eq!(sim.reg(SRS12) & SRS12_ERROR_STATUS_MASK, 0);
    }

    #[test]
    fn card_status_error_is_not_a_transfer_failure() {
        let sim = SimBus::mmc();
        sim.set_status_errors(1 << 31);
        let host = MmcHost::new(&sim);

        let resp = host.send_cmd(MmcCommand::new(MMC_CMD_13_SEND_STATUS, 1 << 16, ResponseType::R1));

        assert_eq!(resp, Err(MmcError::ResponseError));
        assert_eq!(
            host.check_device_status(CmdResponse::Busy),
            Err(MmcError::ResponseError)
        );
    }

    #[test]
    fn busy_card_is_polled_until_ready() {
        let sim = SimBus::mmc();
        sim.set_busy_polls(3);
        let host = MmcHost::new(&sim);

        host.check_device_status(CmdResponse::Busy).unwrap();

        let polls = sim
            .commands()
            .iter()
            .filter(|(op, _)| *op == MMC_CMD_13_SEND_STATUS)
            .count();
        assert_eq!(polls, 4);
    }
}
