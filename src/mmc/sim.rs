//! Register-level model of the controller with an attached card, for tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::ops::Range;

use super::{
    block::AdmaDescriptor,
    constant::*,
    phy::{MMC_TUNING_PATTERN_4BIT, MMC_TUNING_PATTERN_8BIT},
    regs::{CmdFlags, CqIrqStatus, IrqStatus, PresentState, RegisterBus},
};

const R1_READY: u32 = 0x900;
const R1_APP_CMD: u32 = 0x920;
const R1_BUSY: u32 = 0x800;
const OCR_WINDOW: u32 = 0x00FF_8000;
const SD_RCA: u32 = 0x1234;
const SDIO_RCA: u32 = 0x0001;
const SDIO_CIS_BASE: u32 = 0x1000;
const SDIO_CIS: [u8; 11] = [0x21, 2, 0x0C, 0, 0x20, 4, 0x96, 0x02, 0x49, 0x43, 0xFF];
const SD_TUNING_READS_TO_LOCK: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CardKind {
    Mmc,
    Sd,
    Sdio,
}

#[derive(Debug, Clone, Copy)]
enum WriteTarget {
    Block(u32),
    Sdio(u8, u32),
}

struct SimState {
    kind: CardKind,
    regs: HashMap<usize, u32>,
    commands: Vec<(u8, u32)>,
    writes: Vec<(usize, u32)>,
    phy_writes: Vec<(u8, u8)>,
    failing: Vec<u8>,
    busy_polls: u32,
    status_errors: u32,
    card_inserted: bool,
    reset_stuck: bool,
    phy_delay: u32,
    phy_window: Range<u32>,
    tune_window: Range<u32>,
    sd_tuning_locks: bool,
    tuning_reads: u32,
    mmc_ocr: u32,
    ext_csd: [u8; 512],
    sd_unsupported: Option<u8>,
    dat_stuck_high: bool,
    cmd11_pending: bool,
    app_cmd: bool,
    blocks: HashMap<u32, Vec<u32>>,
    sdio_blocks: HashMap<(u8, u32), Vec<u32>>,
    cccr: HashMap<u32, u8>,
    read_fifo: VecDeque<u32>,
    write_target: Option<(WriteTarget, usize)>,
    write_buf: Vec<u32>,
}

pub(crate) struct SimBus {
    state: RefCell<SimState>,
}

fn default_ext_csd() -> [u8; 512] {
    let mut ext_csd = [0u8; 512];
    ext_csd[EXT_CSD_ES_SUPPORT_OFFSET] = DEVICE_HPI_SUPPORT;
    ext_csd[EXT_CSD_REVISION_OFFSET] = 8;
    ext_csd[EXT_CSD_CARD_TYPE_OFFSET] = DEVICE_SUPPORT_HS400
        | DEVICE_SUPPORT_HS200
        | DEVICE_SUPPORT_DDR
        | DEVICE_SUPPORT_SDR_50MHZ
        | DEVICE_SUPPORT_SDR_25MHZ;
    ext_csd[EXT_CSD_SECTOR_COUNT_OFFSET..EXT_CSD_SECTOR_COUNT_OFFSET + 4]
        .copy_from_slice(&0x00E9_0000u32.to_le_bytes());
    ext_csd[EXT_CSD_CQ_DEPTH_OFFSET] = 31;
    ext_csd[EXT_CSD_CQ_SUPPORT_OFFSET] = 1;
    ext_csd
}

fn default_cccr() -> HashMap<u32, u8> {
    let mut cccr = HashMap::new();
    cccr.insert(CCCR_INT_ENABLE, 0x03);
    cccr.insert(CCCR_CIS_POINTER, (SDIO_CIS_BASE & 0xFF) as u8);
    cccr.insert(CCCR_CIS_POINTER + 1, ((SDIO_CIS_BASE >> 8) & 0xFF) as u8);
    cccr.insert(CCCR_CIS_POINTER + 2, ((SDIO_CIS_BASE >> 16) & 0xFF) as u8);
    cccr.insert(CCCR_HIGH_SPEED, SDIO_CCCR_13_SHS);
    cccr.insert(CCCR_UHSI_SUPPORT, SDIO_CCCR_14_SSDR50);
    for (i, b) in SDIO_CIS.iter().enumerate() {
        cccr.insert(SDIO_CIS_BASE + i as u32, *b);
    }
    cccr
}

impl SimBus {
    fn new(kind: CardKind) -> Self {
        let mut regs = HashMap::new();
        regs.insert(
            SRS16,
            SRS16_64BIT_SUPPORT
                | SRS16_VOLTAGE_1_8V_SUPPORT
                | SRS16_VOLTAGE_3_0V_SUPPORT
                | SRS16_VOLTAGE_3_3V_SUPPORT
                | SRS16_TIMEOUT_CLOCK_UNIT_MHZ
                | (200 << 8)
                | 50,
        );
        regs.insert(
            SRS17,
            SRS17_SDR50_SUPPORTED | SRS17_SDR104_SUPPORTED | SRS17_DDR50_SUPPORTED,
        );
        regs.insert(SRS18, 0x0040_0040);

        Self {
            state: RefCell::new(SimState {
                kind,
                regs,
                commands: Vec::new(),
                writes: Vec::new(),
                phy_writes: Vec::new(),
                failing: Vec::new(),
                busy_polls: 0,
                status_errors: 0,
                card_inserted: true,
                reset_stuck: false,
                phy_delay: 0,
                phy_window: 0..u32::MAX,
                tune_window: 0..u32::MAX,
                sd_tuning_locks: true,
                tuning_reads: 0,
                mmc_ocr: 0xC0FF_8080,
                ext_csd: default_ext_csd(),
                sd_unsupported: None,
                dat_stuck_high: false,
                cmd11_pending: false,
                app_cmd: false,
                blocks: HashMap::new(),
                sdio_blocks: HashMap::new(),
                cccr: default_cccr(),
                read_fifo: VecDeque::new(),
                write_target: None,
                write_buf: Vec::new(),
            }),
        }
    }

    pub fn mmc() -> Self {
        Self::new(CardKind::Mmc)
    }

    pub fn sd() -> Self {
        Self::new(CardKind::Sd)
    }

    pub fn sdio() -> Self {
        Self::new(CardKind::Sdio)
    }

    pub fn reg(&self, offset: usize) -> u32 {
        let st = self.state.borrow();
        match offset {
            SRS09 => st.present_state(),
            _ => st.reg(offset),
        }
    }

    /// Store a register value directly, without any write side effects.
    pub fn set_reg(&self, offset: usize, value: u32) {
        self.state.borrow_mut().regs.insert(offset, value);
    }

    pub fn commands(&self) -> Vec<(u8, u32)> {
        self.state.borrow().commands.clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.state.borrow().writes.clone()
    }

    pub fn phy_writes(&self) -> Vec<(u8, u8)> {
        self.state.borrow().phy_writes.clone()
    }

    pub fn clear_log(&self) {
        let mut st = self.state.borrow_mut();
        st.commands.clear();
        st.writes.clear();
        st.phy_writes.clear();
    }

    pub fn fail_command(&self, opcode: u8) {
        self.state.borrow_mut().failing.push(opcode);
    }

    /// The next `polls` status requests report a busy card.
    pub fn set_busy_polls(&self, polls: u32) {
        self.state.borrow_mut().busy_polls = polls;
    }

    /// Error bits reported in every following status response.
    pub fn set_status_errors(&self, bits: u32) {
        self.state.borrow_mut().status_errors = bits;
    }

    pub fn set_card_inserted(&self, inserted: bool) {
        self.state.borrow_mut().card_inserted = inserted;
    }

    pub fn stick_soft_reset(&self) {
        self.state.borrow_mut().reset_stuck = true;
    }

    pub fn set_phy_window(&self, window: Range<u32>) {
        self.state.borrow_mut().phy_window = window;
    }

    pub fn set_tune_window(&self, window: Range<u32>) {
        self.state.borrow_mut().tune_window = window;
    }

    pub fn set_sd_tuning_locks(&self, locks: bool) {
        self.state.borrow_mut().sd_tuning_locks = locks;
    }

    pub fn set_mmc_ocr(&self, ocr: u32) {
        self.state.borrow_mut().mmc_ocr = ocr;
    }

    pub fn set_ext_csd_byte(&self, offset: usize, value: u8) {
        self.state.borrow_mut().ext_csd[offset] = value;
    }

    pub fn ext_csd_byte(&self, offset: usize) -> u8 {
        self.state.borrow().ext_csd[offset]
    }

    pub fn set_sd_unsupported_function(&self, function: u8) {
        self.state.borrow_mut().sd_unsupported = Some(function);
    }

    pub fn set_dat_lines_stuck_high(&self, stuck: bool) {
        self.state.borrow_mut().dat_stuck_high = stuck;
    }

    pub fn cccr(&self, addr: usize) -> u8 {
        self.state.borrow().cccr_byte(addr as u32)
    }
}

impl RegisterBus for SimBus {
    fn read32(&self, offset: usize) -> u32 {
        let mut st = self.state.borrow_mut();
        match offset {
            SRS09 => st.present_state(),
            SRS08 => st.read_fifo.pop_front().unwrap_or(0),
            _ => st.reg(offset),
        }
    }

    fn write32(&self, offset: usize, value: u32) {
        let mut st = self.state.borrow_mut();
        st.writes.push((offset, value));

        match offset {
            // Write one to clear
            SRS12 | CQRS04 | CQRS11 => {
                let v = st.reg(offset) & !value;
                st.set(offset, v);
            }
            HRS00 => {
                let v = if st.reset_stuck {
                    value
                } else {
                    value & !HRS0_SOFTWARE_RESET
                };
                st.set(HRS00, v);
            }
            HRS04 => {
                if value & HRS_PHY_WRITE_REQUEST != 0 {
                    let line = (value & 0xFF) as u8;
                    let delay = ((value >> 8) & 0xFF) as u8;
                    st.phy_writes.push((line, delay));
                    st.phy_delay = delay as u32;
                    st.set(HRS04, value | HRS_PHY_ACKNOWLEDGE_REQUEST);
                } else {
                    st.set(HRS04, value);
                }
            }
            HRS06 => st.set(HRS06, value & !HRS6_EMMC_TUNE_REQUEST),
            SRS11 => {
                let mut v = value & !SRS11_RESET_DATA_CMD_LINE;
                if v & SRS11_INT_CLOCK_ENABLE != 0 {
                    v |= SRS11_INT_CLOCK_STABLE;
                } else {
                    v &= !SRS11_INT_CLOCK_STABLE;
                }
                if v & SRS11_SD_CLOCK_ENABLE != 0 {
                    st.cmd11_pending = false;
                }
                st.set(SRS11, v);
            }
            SRS15 => {
                if value & SRS15_EXECUTE_TUNING != 0 {
                    st.tuning_reads = 0;
                }
                st.set(SRS15, value);
            }
            SRS08 => st.push_write_word(value),
            SRS03 => {
                st.set(SRS03, value);
                st.execute(value);
            }
            CQRS10 => st.ring_doorbell(value),
            _ => st.set(offset, value),
        }
    }
}

impl SimState {
    fn reg(&self, offset: usize) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    fn set(&mut self, offset: usize, value: u32) {
        self.regs.insert(offset, value);
    }

    fn raise(&mut self, status: IrqStatus) {
        let v = self.reg(SRS12) | status.bits();
        self.set(SRS12, v);
    }

    fn respond(&mut self, value: u32) {
        self.set(SRS04, value);
    }

    fn present_state(&self) -> u32 {
        let mut v = PresentState::CARD_STATE_STABLE | PresentState::CMD_SIGNAL_LEVEL;
        if self.card_inserted {
            v |= PresentState::CARD_INSERTED;
        }
        let clock_off = self.reg(SRS11) & SRS11_SD_CLOCK_ENABLE == 0;
        let lines_low = self.cmd11_pending && clock_off && !self.dat_stuck_high;
        if !lines_low {
            v |= PresentState::DAT_LINES;
        }
        v.bits()
    }

    fn cccr_byte(&self, addr: u32) -> u8 {
        self.cccr.get(&addr).copied().unwrap_or(0)
    }

    fn cccr_store(&mut self, addr: u32, data: u8) {
        match addr {
            CCCR_ABORT | CCCR_UHSI_SUPPORT => {}
            CCCR_IO_ENABLE => {
                self.cccr.insert(CCCR_IO_ENABLE, data);
                self.cccr.insert(CCCR_IO_READY, data);
            }
            CCCR_HIGH_SPEED => {
                let shs = self.cccr_byte(CCCR_HIGH_SPEED) & SDIO_CCCR_13_SHS;
                self.cccr.insert(CCCR_HIGH_SPEED, shs | (data & !SDIO_CCCR_13_SHS));
            }
            _ => {
                self.cccr.insert(addr, data);
            }
        }
    }

    fn ext_csd_words(&self) -> Vec<u32> {
        self.ext_csd
            .chunks(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn switch_status(&self, arg: u32) -> Vec<u32> {
        let function = (arg & 0xF) as u8;
        let code = if self.sd_unsupported == Some(function) {
            0xF
        } else {
            function
        };
        let mut words = vec![0u32; 16];
        words[4] = code as u32 | (1 << 8);
        words
    }

    fn start_read(&mut self, words: Vec<u32>) {
        self.read_fifo = words.into();
        self.raise(
            IrqStatus::COMMAND_COMPLETE
                | IrqStatus::BUFFER_READ_READY
                | IrqStatus::TRANSFER_COMPLETE,
        );
    }

    fn start_write(&mut self, target: WriteTarget) {
        let srs01 = self.reg(SRS01);
        let words = ((srs01 & 0xFFF) / WORD_SIZE) as usize * (srs01 >> 16).max(1) as usize;
        self.write_target = Some((target, words));
        self.write_buf.clear();
        self.raise(IrqStatus::COMMAND_COMPLETE | IrqStatus::BUFFER_WRITE_READY);
    }

    fn push_write_word(&mut self, word: u32) {
        let Some((target, expected)) = self.write_target else {
            return;
        };
        self.write_buf.push(word);
        if self.write_buf.len() < expected {
            return;
        }

        let data = core::mem::take(&mut self.write_buf);
        match target {
            WriteTarget::Block(addr) => {
                self.blocks.insert(addr, data);
            }
            WriteTarget::Sdio(function, addr) => {
                self.sdio_blocks.insert((function, addr), data);
            }
        }
        self.write_target = None;
        self.raise(IrqStatus::TRANSFER_COMPLETE);
    }

    fn dma_len(&self) -> usize {
        let srs01 = self.reg(SRS01);
        let blocks = (srs01 >> BLOCK_COUNT_SHIFT).max(1);
        ((srs01 & 0xFFF) * blocks) as usize
    }

    // Memory ranges the selected DMA engine walks
    fn dma_segments(&self) -> Vec<(u64, usize)> {
        let addr = self.reg(SRS22) as u64 | (self.reg(SRS23) as u64) << 32;
        if self.reg(SRS10) & SRS10_DMA_SELECT_MASK != SRS10_DMA_SELECT_ADMA2 {
            return vec![(addr, self.dma_len())];
        }

        let table = addr as *const AdmaDescriptor;
        let mut segments = Vec::new();
        for i in 0..ADMA_MAX_DESCRIPTORS {
            // SAFETY: the host keeps its descriptor table in place while the
            // command that uses it is issued
            let desc = unsafe { table.add(i).read() };
            let base = desc.addr_lo as u64 | (desc.addr_hi as u64) << 32;
            segments.push((base, desc.len() as usize));
            if desc.is_end() {
                break;
            }
        }
        segments
    }

    fn dma_to_card(&mut self, card_addr: u32) {
        let mut data = Vec::new();
        for (addr, len) in self.dma_segments() {
            // SAFETY: DMA buffers stay valid until the transfer completes
            data.extend_from_slice(unsafe { std::slice::from_raw_parts(addr as *const u8, len) });
        }
        data.truncate(self.dma_len());

        for (i, block) in data.chunks(BLK_SIZE as usize).enumerate() {
            let words = block
                .chunks(4)
                .map(|w| u32::from_le_bytes(w.try_into().unwrap()))
                .collect();
            self.blocks.insert(card_addr.wrapping_add(i as u32), words);
        }
    }

    fn dma_from_card(&self, card_addr: u32) {
        let len = self.dma_len();
        let mut data = Vec::with_capacity(len);
        for i in 0..(len / BLK_SIZE as usize) as u32 {
            match self.blocks.get(&card_addr.wrapping_add(i)) {
                Some(words) => words.iter().for_each(|w| data.extend_from_slice(&w.to_le_bytes())),
                None => data.resize(data.len() + BLK_SIZE as usize, 0),
            }
        }

        let mut rest = &data[..];
        for (addr, len) in self.dma_segments() {
            let n = len.min(rest.len());
            // SAFETY: as above, and the destination is not aliased by the model
            unsafe { std::ptr::copy_nonoverlapping(rest.as_ptr(), addr as *mut u8, n) };
            rest = &rest[n..];
        }
    }

    fn data_error(&mut self) {
        self.raise(
            IrqStatus::COMMAND_COMPLETE | IrqStatus::ERROR_INTERRUPT | IrqStatus::DATA_CRC_ERROR,
        );
    }

    fn execute(&mut self, command: u32) {
        let opcode = ((command >> CMD_SHIFT) & 0x3F) as u8;
        let arg = self.reg(SRS02);
        let dma = command & CmdFlags::DMA_ENABLE.bits() != 0;
        let app = core::mem::take(&mut self.app_cmd);

        self.commands.push((opcode, arg));

        if self.failing.contains(&opcode) {
            self.raise(IrqStatus::ERROR_INTERRUPT | IrqStatus::COMMAND_TIMEOUT_ERROR);
            return;
        }

        match (self.kind, opcode) {
            (_, MMC_CMD_0_GO_IDLE_STATE) => return,
            (CardKind::Mmc, MMC_CMD_1_SEND_OP_COND) => {
                let ocr = self.mmc_ocr;
                self.respond(ocr);
            }
            (_, MMC_CMD_2_ALL_SEND_CID) | (_, MMC_CMD_9_SEND_CSD) => {
                self.respond(0x1234_5678);
                self.set(SRS05, 0x9ABC_DEF0);
                self.set(SRS06, 0x0F0F_0F0F);
                self.set(SRS07, 0x00F0_F0F0);
            }
            (CardKind::Mmc, MMC_CMD_3_SET_RELATIVE_ADDR) => self.respond(R1_READY),
            (CardKind::Sd, MMC_CMD_3_SET_RELATIVE_ADDR) => self.respond(SD_RCA << 16 | 0x500),
            (CardKind::Sdio, MMC_CMD_3_SET_RELATIVE_ADDR) => self.respond(SDIO_RCA << 16),
            (CardKind::Sdio, SD_CMD_5) => {
                let ocr = if arg == 0 {
                    OCR_WINDOW
                } else {
                    SDCARD_R4_CARD_READY | OCR_WINDOW | (arg & SDCARD_REG_OCR_S18R)
                };
                self.respond(ocr);
            }
            (CardKind::Mmc, MMC_CMD_6_SWITCH) => {
                if (arg >> 24) & 0x3 == 0x3 {
                    let index = ((arg >> 16) & 0xFF) as usize;
                    self.ext_csd[index] = (arg >> 8) as u8;
                }
                self.respond(R1_READY);
            }
            (CardKind::Sd, MMC_CMD_6_SWITCH) if !app => {
                self.respond(R1_READY);
                let status = self.switch_status(arg);
                self.start_read(status);
                return;
            }
            (CardKind::Mmc, MMC_CMD_8_SEND_EXT_CSD) => {
                self.respond(R1_READY);
                let words = self.ext_csd_words();
                self.start_read(words);
                return;
            }
            (_, SD_CMD_8_SEND_IF_COND) => self.respond(arg),
            (_, SD_CMD_11_VOLTAGE_SWITCH) => {
                self.cmd11_pending = true;
                self.respond(R1_READY);
            }
            (_, MMC_CMD_13_SEND_STATUS) => {
                let status = if self.busy_polls > 0 {
                    self.busy_polls -= 1;
                    R1_BUSY
                } else {
                    R1_READY
                };
                self.respond(status | self.status_errors);
            }
            (_, MMC_CMD_17_READ_SINGLE_BLOCK) | (_, MMC_CMD_18_READ_MULTIPLE_BLOCK) => {
                self.respond(R1_READY);
                if !self.phy_window.contains(&self.phy_delay) {
                    self.data_error();
                    return;
                }
                if dma {
                    self.dma_from_card(arg);
                    self.raise(IrqStatus::COMMAND_COMPLETE | IrqStatus::TRANSFER_COMPLETE);
                } else {
                    let words = self
                        .blocks
                        .get(&arg)
                        .cloned()
                        .unwrap_or_else(|| vec![0; BLK_WORDS]);
                    self.start_read(words);
                }
                return;
            }
            (_, SD_CMD_19_SEND_TUNING_BLK) => {
                self.respond(R1_READY);
                self.tuning_reads += 1;
                let srs15 = self.reg(SRS15);
                if self.tuning_reads >= SD_TUNING_READS_TO_LOCK && srs15 & SRS15_EXECUTE_TUNING != 0 {
                    let mut v = srs15 & !SRS15_EXECUTE_TUNING;
                    if self.sd_tuning_locks {
                        v |= SRS15_SAMPLING_CLOCK_SELECT;
                    }
                    self.set(SRS15, v);
                }
                self.start_read(vec![0; 16]);
                return;
            }
            (_, MMC_CMD_21_SEND_TUNE_BLK) => {
                self.respond(R1_READY);
                let value = (self.reg(HRS06) & HRS6_EMMC_TUNE_VALUE_MASK) >> 8;
                if !self.tune_window.contains(&value) {
                    self.data_error();
                    return;
                }
                let pattern = if self.reg(SRS10) & SRS10_EXTENDED_DATA_TRANSFER_WIDTH != 0 {
                    MMC_TUNING_PATTERN_8BIT.to_vec()
                } else {
                    MMC_TUNING_PATTERN_4BIT.to_vec()
                };
                self.start_read(pattern);
                return;
            }
            (_, MMC_CMD_24_WRITE_SINGLE_BLOCK) | (_, MMC_CMD_25_WRITE_MULTI_BLOCK) => {
                self.respond(R1_READY);
                if dma {
                    self.dma_to_card(arg);
                    self.raise(IrqStatus::COMMAND_COMPLETE | IrqStatus::TRANSFER_COMPLETE);
                } else {
                    self.start_write(WriteTarget::Block(arg));
                }
                return;
            }
            (CardKind::Sd, SD_ACMD_41_SEND_OP_COND) if app => {
                let ocr = if arg == 0 {
                    OCR_WINDOW
                } else {
                    SDCARD_REG_OCR_READY
                        | SDCARD_ACMD41_HCS
                        | OCR_WINDOW
                        | (arg & SDCARD_REG_OCR_S18R)
                };
                self.respond(ocr);
            }
            (CardKind::Sd, SD_ACMD_51) if app => {
                self.respond(R1_READY);
                self.start_read(vec![0x0235_8000, 0]);
                return;
            }
            (CardKind::Sdio, SDIO_CMD_52_IO_RW_DIRECT) => {
                let addr = (arg >> 9) & 0x1_FFFF;
                if arg >> 31 == 1 {
                    self.cccr_store(addr, arg as u8);
                }
                let data = self.cccr_byte(addr);
                self.respond(0x1000 | data as u32);
            }
            (CardKind::Sdio, SDIO_CMD_53_IO_RW_EXTENDED) => {
                self.respond(0x1000);
                let function = ((arg >> 28) & 0x7) as u8;
                let addr = (arg >> 9) & 0x1_FFFF;
                if arg >> 31 == 1 {
                    self.start_write(WriteTarget::Sdio(function, addr));
                } else {
                    let words = self
                        .sdio_blocks
                        .get(&(function, addr))
                        .cloned()
                        .unwrap_or_else(|| vec![0; BLK_WORDS]);
                    self.start_read(words);
                }
                return;
            }
            (_, SD_CMD_55) => {
                self.respond(R1_APP_CMD);
                self.app_cmd = true;
            }
            _ => self.respond(R1_READY),
        }

        self.raise(IrqStatus::COMMAND_COMPLETE);
    }

    fn ring_doorbell(&mut self, doorbell: u32) {
        if doorbell & (1 << CQ_DCMD_TASK_ID) != 0 {
            self.set(CQRS18, R1_READY);
        }
        let done = self.reg(CQRS11) | doorbell;
        self.set(CQRS11, done);
        let cq = self.reg(CQRS04) | CqIrqStatus::TASK_COMPLETE.bits();
        self.set(CQRS04, cq);
        self.set(CQRS10, 0);
        self.raise(IrqStatus::CMD_QUEUING);
    }
}
