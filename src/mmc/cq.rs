use log::{debug, info, warn};

use crate::{delay_cycles, err::MmcError};

use super::{
    block::DataDirection,
    cmd::{parse_r1, CmdResponse, ResponseType},
    constant::*,
    regs::{CqIrqStatus, IrqStatus, RegisterBus},
    MmcHost, TransferState,
};

const CQ_LIST_WORDS: usize = CQ_HOST_NUMBER_OF_TASKS * CQ_TASK_DESC_WORDS;
const CQ_MAX_TASK_BLOCKS: u32 = 0xFFFF;
const CQ_MAX_TRANSFER: u32 = SIZE_1GB - CQ_HOST_NUMBER_OF_TASKS as u32 * BLK_SIZE;
const CQ_MAX_SINGLE_TASK: u32 = SIZE_32MB - BLK_SIZE;

/// Task descriptor list: one 128-bit task descriptor followed by one
/// 128-bit transfer descriptor per slot.
#[repr(C, align(1024))]
pub(crate) struct TaskDescriptorList {
    words: [u32; CQ_LIST_WORDS],
}

impl TaskDescriptorList {
    pub(crate) const fn new() -> Self {
        Self {
            words: [0; CQ_LIST_WORDS],
        }
    }

    pub(crate) fn slot(&self, task_id: u8) -> &[u32] {
        let start = task_id as usize * CQ_TASK_DESC_WORDS;
        &self.words[start..start + CQ_TASK_DESC_WORDS]
    }

    fn slot_mut(&mut self, task_id: u8) -> &mut [u32] {
        let start = task_id as usize * CQ_TASK_DESC_WORDS;
        &mut self.words[start..start + CQ_TASK_DESC_WORDS]
    }

    fn set_data_task(
        &mut self,
        task_id: u8,
        dir: DataDirection,
        blocks: u32,
        card_addr: u32,
        buf_addr: u64,
    ) {
        let mut flags = CQ_DESC_VALID | CQ_DESC_END | CQ_DESC_ACT_TASK | CQ_DESC_INT;
        flags |= match dir {
            DataDirection::Write => 1 << CQ_DESC_CONTEXT_SHIFT,
            DataDirection::Read => CQ_DESC_DATA_DIR_READ,
        };

        // The transfer descriptor length field is 16 bits, 0 meaning 64 KiB
        let bytes = blocks * BLK_SIZE;
        let len = if bytes > 0xFFFF { 0 } else { bytes };

        let slot = self.slot_mut(task_id);
        slot[0] = flags | (blocks << 16);
        slot[1] = card_addr;
        slot[2] = 0;
        slot[3] = 0;
        slot[4] = CQ_DESC_VALID | CQ_DESC_ACT_TRAN | CQ_DESC_END | (len << 16);
        slot[5] = buf_addr as u32;
        slot[6] = (buf_addr >> 32) as u32;
        slot[7] = 0;
    }

    fn set_direct_command(&mut self, opcode: u8, arg: u32, resp_type: ResponseType) {
        let resp = match resp_type {
            ResponseType::NoResp => CQ_DESC_DCMD_RESP_TYPE_NO_RESP,
            ResponseType::R1b => CQ_DESC_DCMD_RESP_TYPE_R1B,
            _ => CQ_DESC_DCMD_RESP_TYPE_R1_R4_R5,
        };

        let slot = self.slot_mut(CQ_DCMD_TASK_ID);
        slot[0] = CQ_DESC_VALID
            | CQ_DESC_END
            | CQ_DESC_ACT_TASK
            | CQ_DESC_INT
            | ((opcode as u32 & 0x3F) << 16)
            | resp
            | CQ_DESC_DCMD_CMD_TIMING;
        slot[1] = arg;
        slot[2] = 0;
        slot[3] = 0;
        slot[4] = CQ_DESC_VALID | CQ_DESC_END | CQ_DESC_ACT_NOP;
        slot[5] = 0;
        slot[6] = 0;
        slot[7] = 0;
    }

    fn base_addr(&self) -> u64 {
        self.words.as_ptr() as u64
    }
}

impl<B: RegisterBus> MmcHost<B> {
    /// Enable command queuing in the device and in the host.
    ///
    /// The task descriptor list lives inside the host, which must stay put
    /// while queuing is enabled.
    pub fn cq_init(&mut self) -> Result<(), MmcError> {
        self.cq_initialised = false;
        self.ensure_idle()?;

        let ext_csd = self
            .read_ext_csd()
            .map_err(|_| MmcError::CqInitFailure)?;
        if ext_csd.cq_support() != 1 {
            warn!("device has no command queue");
            return Err(MmcError::DeviceNotSupportCq);
        }
        debug!("device queue depth {}", ext_csd.byte(EXT_CSD_CQ_DEPTH_OFFSET) as u32 + 1);

        self.bus.modify32(CQRS02, |v| {
            (v & !CQRS02_TASK_DESCRIPTOR_SIZE_128) | CQRS02_TASK_DESCRIPTOR_SIZE_128
        });
        let base = self.cq_desc.base_addr();
        self.bus.write32(CQRS08, base as u32);
        self.bus.write32(CQRS09, (base >> 32) as u32);

        self.mmc_switch(MMC_CQ_ENABLE)
            .map_err(|_| MmcError::CqInitFailure)?;

        let ext_csd = self
            .read_ext_csd()
            .map_err(|_| MmcError::CqInitFailure)?;
        if !ext_csd.cq_enabled() {
            return Err(MmcError::CqInitFailure);
        }

        self.bus.write32(CQRS16, (1 << 16) | CQ_IDLE_TIME);
        self.bus.write32(
            CQRS05,
            CQRS05_TASK_CLEARED_STAT_EN | CQRS05_RESP_ERR_STAT_EN | CQRS05_TASK_COMPLETE_STAT_EN,
        );
        self.bus.write32(CQRS04, u32::MAX);
        self.bus.write32(CQRS17, self.rca);
        self.bus.set_bits32(CQRS02, CQRS02_COMMAND_QUEUING_ENABLE);
        self.bus
            .write32(CQRS06, CQRS06_TASK_COMPLETE_INT_SIG_EN | CQRS06_RESP_ERR_INT_SIG_EN);

        self.cq_wait_card_ready()
            .map_err(|_| MmcError::CqInitFailure)?;

        self.cq_initialised = true;
        info!("command queue enabled");
        Ok(())
    }

    /// Issue a direct command through the reserved DCMD slot.
    pub fn cq_direct_command(
        &mut self,
        opcode: u8,
        arg: u32,
        resp_type: ResponseType,
    ) -> Result<CmdResponse, MmcError> {
        if !self.cq_initialised {
            return Err(MmcError::CqNotInitialised);
        }
        if self.state == TransferState::InProgress {
            return Err(MmcError::TransferInProgress);
        }
        self.direct_command(opcode, arg, resp_type)
    }

    fn direct_command(
        &mut self,
        opcode: u8,
        arg: u32,
        resp_type: ResponseType,
    ) -> Result<CmdResponse, MmcError> {
        self.bus.set_bits32(CQRS02, CQRS02_DIRECT_CMD_ENABLE);
        self.cq_desc.set_direct_command(opcode, arg, resp_type);

        let result = self.cq_execute_task(CQ_DCMD_TASK_ID);
        let response = self.bus.read32(CQRS18);
        self.bus.clear_bits32(CQRS02, CQRS02_DIRECT_CMD_ENABLE);

        result?;
        match resp_type {
            ResponseType::NoResp => Ok(CmdResponse::Success),
            _ => parse_r1(response),
        }
    }

    // Ring one doorbell and poll for its completion
    fn cq_execute_task(&self, task_id: u8) -> Result<(), MmcError> {
        self.bus.write32(CQRS10, 1 << task_id);
        delay_cycles(DELAY_COUNT);

        self.wait_for(SRS12, |v| {
            v & (IrqStatus::ERROR_INTERRUPT | IrqStatus::CMD_QUEUING).bits() != 0
        })?;
        let status = IrqStatus::from_bits_truncate(self.bus.read32(SRS12));
        self.bus.write32(SRS12, status.bits());

        if status.contains(IrqStatus::ERROR_INTERRUPT) {
            return Err(MmcError::TransferFail);
        }

        let cq = CqIrqStatus::from_bits_truncate(self.bus.read32(CQRS04));
        self.bus.write32(CQRS04, cq.bits());
        if cq.contains(CqIrqStatus::RESP_ERR) {
            return Err(MmcError::TransferFail);
        }
        if !cq.contains(CqIrqStatus::TASK_COMPLETE) {
            return Err(MmcError::TransferFail);
        }

        let done = self.bus.read32(CQRS11);
        self.bus.write32(CQRS11, done);
        if task_id == CQ_DCMD_TASK_ID && done & (1 << task_id) == 0 {
            return Err(MmcError::TransferFail);
        }
        Ok(())
    }

    fn cq_wait_card_ready(&mut self) -> Result<(), MmcError> {
        for _ in 0..self.poll_budget() {
            let arg = self.rca_arg();
            if self.direct_command(MMC_CMD_13_SEND_STATUS, arg, ResponseType::R1)?
                == CmdResponse::Success
            {
                return Ok(());
            }
        }
        Err(MmcError::Timeout)
    }

    fn check_cq_request(&self, len: usize, card_addr: u32, max: u32) -> Result<u32, MmcError> {
        if !self.cq_initialised {
            return Err(MmcError::CqNotInitialised);
        }
        if self.state == TransferState::InProgress {
            return Err(MmcError::TransferInProgress);
        }
        let size = u32::try_from(len).map_err(|_| MmcError::InvalidParameter)?;
        if size == 0 || size % BLK_SIZE != 0 || size > max {
            return Err(MmcError::InvalidParameter);
        }
        // The last block must still be addressable
        card_addr
            .checked_add(size / BLK_SIZE - 1)
            .ok_or(MmcError::InvalidParameter)?;
        Ok(size)
    }

    // Spread the transfer over consecutive slots, 0xFFFF blocks per task.
    // A maximum size request fills slot 31 as well; DCMD is refused while
    // the queue is busy, so the slot is free for data until it drains.
    fn start_cq(
        &mut self,
        dir: DataDirection,
        buf_addr: u64,
        card_addr: u32,
        size: u32,
    ) -> Result<(), MmcError> {
        self.cq_wait_card_ready()?;

        let mut remaining = size / BLK_SIZE;
        let mut buf = buf_addr;
        let mut arg = card_addr;
        let mut doorbell = 0u32;
        let mut tasks = 0u32;

        for task_id in 0..CQ_HOST_NUMBER_OF_TASKS as u8 {
            if remaining == 0 {
                break;
            }
            let blocks = remaining.min(CQ_MAX_TASK_BLOCKS);
            self.cq_desc.set_data_task(task_id, dir, blocks, arg, buf);

            remaining -= blocks;
            doorbell |= 1 << task_id;
            tasks += 1;
            if remaining == 0 {
                break;
            }
            buf += (blocks * BLK_SIZE) as u64;
            arg += blocks;
        }

        self.arm_cq(doorbell, tasks);
        debug!("CQ {:?}: {} tasks, doorbell {:#x}", dir, tasks, doorbell);
        Ok(())
    }

    fn arm_cq(&mut self, doorbell: u32, tasks: u32) {
        self.cq_task_count = tasks;
        self.bus.write32(
            SRS14,
            SRS14_CMD_QUEUING_SIG_EN | SRS14_COMMAND_TIMEOUT_ERR_SIG_EN | SRS14_DATA_TIMEOUT_ERR_SIG_EN,
        );
        self.state = TransferState::InProgress;
        self.bus.write32(CQRS10, doorbell);
    }

    /// Queue a write of `src` starting at block `dest`.
    ///
    /// # Safety
    ///
    /// `src` is read by the controller after this call returns and must stay
    /// valid until `transfer_status()` leaves `InProgress`.
    pub unsafe fn cq_write(&mut self, src: &[u8], dest: u32) -> Result<(), MmcError> {
        let size = self.check_cq_request(src.len(), dest, CQ_MAX_TRANSFER)?;
        self.start_cq(DataDirection::Write, src.as_ptr() as u64, dest, size)
    }

    /// Queue a read of `dest.len()` bytes starting at block `src`.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::cq_write`], with `dest` written by the controller.
    pub unsafe fn cq_read(&mut self, src: u32, dest: &mut [u8]) -> Result<(), MmcError> {
        let size = self.check_cq_request(dest.len(), src, CQ_MAX_TRANSFER)?;
        self.start_cq(DataDirection::Read, dest.as_mut_ptr() as u64, src, size)
    }

    /// Queue a write as a single task in slot `task_id`.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::cq_write`].
    pub unsafe fn cq_single_task_write(
        &mut self,
        src: &[u8],
        dest: u32,
        task_id: u8,
    ) -> Result<(), MmcError> {
        let size = self.check_cq_request(src.len(), dest, CQ_MAX_SINGLE_TASK)?;
        self.start_single_task(DataDirection::Write, src.as_ptr() as u64, dest, size, task_id)
    }

    /// Queue a read as a single task in slot `task_id`.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::cq_read`].
    pub unsafe fn cq_single_task_read(
        &mut self,
        src: u32,
        dest: &mut [u8],
        task_id: u8,
    ) -> Result<(), MmcError> {
        let size = self.check_cq_request(dest.len(), src, CQ_MAX_SINGLE_TASK)?;
        self.start_single_task(DataDirection::Read, dest.as_mut_ptr() as u64, src, size, task_id)
    }

    fn start_single_task(
        &mut self,
        dir: DataDirection,
        buf_addr: u64,
        card_addr: u32,
        size: u32,
        task_id: u8,
    ) -> Result<(), MmcError> {
        if task_id >= CQ_DCMD_TASK_ID {
            return Err(MmcError::InvalidParameter);
        }
        self.cq_wait_card_ready()?;

        self.cq_desc
            .set_data_task(task_id, dir, size / BLK_SIZE, card_addr, buf_addr);
        self.arm_cq(1 << task_id, 1);
        Ok(())
    }
}
