use bitflags::bitflags;

/// 32-bit access to the controller register file by byte offset.
pub trait RegisterBus {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);

    fn modify32(&self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read32(offset);
        self.write32(offset, f(value));
    }

    fn set_bits32(&self, offset: usize, bits: u32) {
        self.modify32(offset, |v| v | bits);
    }

    fn clear_bits32(&self, offset: usize, bits: u32) {
        self.modify32(offset, |v| v & !bits);
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// Memory-mapped register file at a fixed base address.
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    base_addr: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base_addr` must point at the controller register file and stay mapped
    /// for the lifetime of the returned value.
    pub const unsafe fn new(base_addr: usize) -> Self {
        Self { base_addr }
    }

    pub fn base_addr(&self) -> usize {
        self.base_addr
    }
}

impl RegisterBus for Mmio {
    fn read32(&self, offset: usize) -> u32 {
        unsafe { core::ptr::read_volatile((self.base_addr + offset) as *const u32) }
    }

    fn write32(&self, offset: usize, value: u32) {
        unsafe { core::ptr::write_volatile((self.base_addr + offset) as *mut u32, value) }
    }
}

bitflags! {
    /// SRS12 interrupt status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqStatus: u32 {
        const RESPONSE_ERROR = 0x0800_0000;
        const TUNING_ERROR = 0x0400_0000;
        const ADMA_ERROR = 0x0200_0000;
        const AUTO_CMD_ERROR = 0x0100_0000;
        const CURRENT_LIMIT_ERROR = 0x0080_0000;
        const DATA_END_BIT_ERROR = 0x0040_0000;
        const DATA_CRC_ERROR = 0x0020_0000;
        const DATA_TIMEOUT_ERROR = 0x0010_0000;
        const COMMAND_INDEX_ERROR = 0x0008_0000;
        const COMMAND_END_BIT_ERROR = 0x0004_0000;
        const COMMAND_CRC_ERROR = 0x0002_0000;
        const COMMAND_TIMEOUT_ERROR = 0x0001_0000;
        const ERROR_INTERRUPT = 0x0000_8000;
        const CMD_QUEUING = 0x0000_4000;
        const RETUNING_EVENT = 0x0000_1000;
        const CARD_INTERRUPT = 0x0000_0100;
        const CARD_REMOVAL = 0x0000_0080;
        const CARD_INSERTION = 0x0000_0040;
        const BUFFER_READ_READY = 0x0000_0020;
        const BUFFER_WRITE_READY = 0x0000_0010;
        const DMA_INTERRUPT = 0x0000_0008;
        const BLOCK_GAP_EVENT = 0x0000_0004;
        const TRANSFER_COMPLETE = 0x0000_0002;
        const COMMAND_COMPLETE = 0x0000_0001;
    }
}

impl IrqStatus {
    pub fn has_error(&self) -> bool {
        self.bits() & super::constant::SRS12_ERROR_STATUS_MASK != 0
    }
}

bitflags! {
    /// SRS09 present state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PresentState: u32 {
        const CMD_SIGNAL_LEVEL = 0x0100_0000;
        const DAT3_SIGNAL_LEVEL = 1 << 23;
        const DAT2_SIGNAL_LEVEL = 1 << 22;
        const DAT1_SIGNAL_LEVEL = 1 << 21;
        const DAT0_SIGNAL_LEVEL = 1 << 20;
        const CARD_STATE_STABLE = 0x0002_0000;
        const CARD_INSERTED = 0x0001_0000;
        const BUFF_READ_EN = 0x0000_0800;
        const BUFF_WRITE_EN = 0x0000_0400;
        const CMD_INHIBIT_DAT = 0x0000_0002;
        const CMD_INHIBIT_CMD = 0x0000_0001;
    }
}

impl PresentState {
    pub const DAT_LINES: PresentState = PresentState::DAT0_SIGNAL_LEVEL
        .union(PresentState::DAT1_SIGNAL_LEVEL)
        .union(PresentState::DAT2_SIGNAL_LEVEL)
        .union(PresentState::DAT3_SIGNAL_LEVEL);
}

bitflags! {
    /// SRS03 command and transfer mode bits below the command index.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CmdFlags: u32 {
        const ABORT_CMD = 0x3 << 22;
        const DATA_PRESENT = 0x0020_0000;
        const INDEX_CHECK_EN = 0x0010_0000;
        const CRC_CHECK_EN = 0x0008_0000;
        const RESP_LENGTH_136 = 0x1 << 16;
        const RESP_LENGTH_48 = 0x2 << 16;
        const RESP_LENGTH_48B = 0x3 << 16;
        const RESP_INTER_DISABLE = 0x0000_0100;
        const RESP_ERR_CHECK_EN = 0x0000_0080;
        const RESPONSE_CHECK_TYPE_R5 = 0x1 << 6;
        const MULTI_BLOCK_SEL = 0x0000_0020;
        const TRANS_DIRECT_READ = 0x1 << 4;
        const BLOCK_COUNT_ENABLE = 0x0000_0002;
        const DMA_ENABLE = 0x0000_0001;
    }
}

impl CmdFlags {
    /// Short response with CRC and index checks, as used by R1/R5/R6/R7.
    pub const R1_48: CmdFlags = CmdFlags::RESP_LENGTH_48
        .union(CmdFlags::CRC_CHECK_EN)
        .union(CmdFlags::INDEX_CHECK_EN);

    /// Polled single block: response checked by the controller, no response interrupt.
    pub const PIO_BLOCK: CmdFlags = CmdFlags::DATA_PRESENT
        .union(CmdFlags::BLOCK_COUNT_ENABLE)
        .union(CmdFlags::RESP_ERR_CHECK_EN)
        .union(CmdFlags::RESP_INTER_DISABLE)
        .union(CmdFlags::R1_48);

    /// DMA data transfer with R1 response.
    pub const DMA_BLOCK: CmdFlags = CmdFlags::DATA_PRESENT
        .union(CmdFlags::BLOCK_COUNT_ENABLE)
        .union(CmdFlags::R1_48)
        .union(CmdFlags::DMA_ENABLE);
}

bitflags! {
    /// CQRS04 command queue interrupt status.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CqIrqStatus: u32 {
        const TASK_CLEARED = 0x0000_0008;
        const RESP_ERR = 0x0000_0004;
        const TASK_COMPLETE = 0x0000_0002;
        const HALT_COMPLETE = 0x0000_0001;
    }
}
