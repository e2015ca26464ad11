use log::{debug, warn};

use crate::err::MmcError;

use super::{
    constant::*,
    regs::{CmdFlags, IrqStatus, RegisterBus},
    MmcHost, TransferState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataDirection {
    Read,
    Write,
}

/// One 64-bit ADMA2 descriptor, padded to 128 bits.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmaDescriptor {
    pub attributes: u32,
    pub addr_lo: u32,
    pub addr_hi: u32,
    reserved: u32,
}

impl AdmaDescriptor {
    /// Transfer descriptor for `len` bytes at `addr`; 64 KiB is encoded as 0.
    pub fn transfer(addr: u64, len: u32, last: bool) -> Self {
        let mut attributes = ADMA2_DESCRIPTOR_TYPE_TRAN
            | ADMA2_DESCRIPTOR_VAL
            | ADMA2_DESCRIPTOR_INT
            | ((len & 0xFFFF) << 16);
        if last {
            attributes |= ADMA2_DESCRIPTOR_END;
        }
        Self {
            attributes,
            addr_lo: addr as u32,
            addr_hi: (addr >> 32) as u32,
            reserved: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        self.attributes & ADMA2_DESCRIPTOR_END != 0
    }

    pub fn len(&self) -> u32 {
        match self.attributes >> 16 {
            0 => SIZE_64KB,
            len => len,
        }
    }
}

#[repr(C, align(8))]
pub(crate) struct AdmaTable {
    entries: [AdmaDescriptor; ADMA_MAX_DESCRIPTORS],
}

impl AdmaTable {
    pub(crate) const fn new() -> Self {
        Self {
            entries: [AdmaDescriptor {
                attributes: 0,
                addr_lo: 0,
                addr_hi: 0,
                reserved: 0,
            }; ADMA_MAX_DESCRIPTORS],
        }
    }

    /// Split `size` bytes at `addr` into 64 KiB descriptors.
    pub(crate) fn build(&mut self, addr: u64, size: u32) -> Result<usize, MmcError> {
        let count = size.div_ceil(SIZE_64KB) as usize;
        if count == 0 || count > ADMA_MAX_DESCRIPTORS {
            return Err(MmcError::InvalidParameter);
        }

        let mut offset = 0u32;
        for (i, entry) in self.entries[..count].iter_mut().enumerate() {
            let len = (size - offset).min(SIZE_64KB);
            *entry = AdmaDescriptor::transfer(addr + offset as u64, len, i == count - 1);
            offset += len;
        }
        Ok(count)
    }

    pub(crate) fn entries(&self) -> &[AdmaDescriptor] {
        &self.entries
    }

    fn base_addr(&self) -> u64 {
        self.entries.as_ptr() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DmaEngine {
    Sdma(u64),
    Adma2,
}

impl<B: RegisterBus> MmcHost<B> {
    /// Polled single block read at block address `src_addr`.
    pub fn single_block_read(
        &mut self,
        src_addr: u32,
        dst: &mut [u32; BLK_WORDS],
    ) -> Result<(), MmcError> {
        self.ensure_idle()?;
        self.read_block(MMC_CMD_17_READ_SINGLE_BLOCK, src_addr, dst)
    }

    /// Polled single block write at block address `dst_addr`.
    pub fn single_block_write(
        &mut self,
        src: &[u32; BLK_WORDS],
        dst_addr: u32,
    ) -> Result<(), MmcError> {
        self.ensure_idle()?;

        self.wait_card_ready()?;
        self.reset_lines()?;

        let result = self.pio_write(MMC_CMD_24_WRITE_SINGLE_BLOCK, dst_addr, src);
        let result = result.and_then(|_| {
            self.wait_card_ready()?;
            self.reset_lines()
        });

        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }

    pub(crate) fn read_block(
        &self,
        cmd: u8,
        arg: u32,
        dst: &mut [u32; BLK_WORDS],
    ) -> Result<(), MmcError> {
        self.wait_card_ready()?;
        self.reset_lines()?;

        let result = self.pio_read(dst, cmd, arg).and_then(|_| {
            self.wait_card_ready()?;
            self.reset_lines()
        });

        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }

    /// Single polled data block of `buf.len()` words read through the buffer port.
    pub(crate) fn pio_read(&self, buf: &mut [u32], cmd: u8, arg: u32) -> Result<(), MmcError> {
        self.pio_read_with(buf, cmd, arg, CmdFlags::empty())
    }

    pub(crate) fn pio_read_with(
        &self,
        buf: &mut [u32],
        cmd: u8,
        arg: u32,
        extra: CmdFlags,
    ) -> Result<(), MmcError> {
        let size = (buf.len() * WORD_SIZE as usize) as u32;

        self.bus.write32(SRS12, SRS12_STATUS_CLEAR);
        self.bus.write32(SRS01, size | (1 << BLOCK_COUNT_SHIFT));

        self.wait_not_inhibited()?;
        self.issue_cmd(cmd, arg, CmdFlags::PIO_BLOCK | CmdFlags::TRANS_DIRECT_READ | extra);

        let status = self.wait_for(SRS12, |v| {
            v & (IrqStatus::BUFFER_READ_READY | IrqStatus::ERROR_INTERRUPT).bits() != 0
        })?;
        if status & IrqStatus::BUFFER_READ_READY.bits() != 0 {
            for word in buf.iter_mut() {
                *word = self.bus.read32(SRS08);
            }
        }

        self.check_data_errors()
    }

    /// Single polled 512-byte block written through the buffer port.
    pub(crate) fn pio_write(
        &self,
        cmd: u8,
        arg: u32,
        src: &[u32; BLK_WORDS],
    ) -> Result<(), MmcError> {
        self.pio_write_with(cmd, arg, src, CmdFlags::empty())
    }

    pub(crate) fn pio_write_with(
        &self,
        cmd: u8,
        arg: u32,
        src: &[u32; BLK_WORDS],
        extra: CmdFlags,
    ) -> Result<(), MmcError> {
        self.bus.write32(SRS12, SRS12_STATUS_CLEAR);
        self.bus.write32(SRS01, BLK_SIZE | (1 << BLOCK_COUNT_SHIFT));

        self.wait_not_inhibited()?;
        self.issue_cmd(cmd, arg, CmdFlags::PIO_BLOCK | extra);

        let status = self.wait_for(SRS12, |v| {
            v & (IrqStatus::BUFFER_WRITE_READY | IrqStatus::ERROR_INTERRUPT).bits() != 0
        })?;
        if status & IrqStatus::BUFFER_WRITE_READY.bits() != 0 {
            for word in src {
                self.bus.write32(SRS08, *word);
            }
            self.wait_for(SRS12, |v| {
                v & (IrqStatus::TRANSFER_COMPLETE | IrqStatus::ERROR_INTERRUPT).bits() != 0
            })?;
        }

        self.check_data_errors()
    }

    fn check_data_errors(&self) -> Result<(), MmcError> {
        let status = self.bus.read32(SRS12);
        if status & SRS12_ERROR_STATUS_MASK != 0 {
            debug!("data transfer error: {:#x}", status);
            self.bus.write32(SRS12, SRS12_STATUS_CLEAR);
            return Err(MmcError::ErrorInterrupt);
        }
        Ok(())
    }

    pub(crate) fn check_dma_request(&self, len: usize) -> Result<u32, MmcError> {
        self.ensure_idle()?;
        let size = u32::try_from(len).map_err(|_| MmcError::InvalidParameter)?;
        if size == 0 || size % BLK_SIZE != 0 || size > SIZE_32MB - BLK_SIZE {
            return Err(MmcError::InvalidParameter);
        }
        Ok(size)
    }

    /// Start an SDMA read of `dst.len()` bytes from block `src_addr`.
    ///
    /// Completion is reported through the interrupt handler.
    ///
    /// # Safety
    ///
    /// `dst` is written by the controller after this call returns. It must
    /// stay valid and untouched until `transfer_status()` leaves `InProgress`.
    pub unsafe fn sdma_read(&mut self, src_addr: u32, dst: &mut [u8]) -> Result<(), MmcError> {
        let size = self.check_dma_request(dst.len())?;
        self.start_dma(
            DataDirection::Read,
            src_addr,
            size,
            DmaEngine::Sdma(dst.as_mut_ptr() as u64),
            false,
        )
    }

    /// Start an SDMA write of `src` to block `dst_addr`.
    ///
    /// # Safety
    ///
    /// `src` is read by the controller after this call returns. It must stay
    /// valid until `transfer_status()` leaves `InProgress`.
    pub unsafe fn sdma_write(&mut self, src: &[u8], dst_addr: u32) -> Result<(), MmcError> {
        let size = self.check_dma_request(src.len())?;
        self.start_dma(
            DataDirection::Write,
            dst_addr,
            size,
            DmaEngine::Sdma(src.as_ptr() as u64),
            false,
        )
    }

    /// Start an ADMA2 read of `dst.len()` bytes from block `src_addr`.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::sdma_read`]. The descriptor table lives inside the
    /// host, so the host must not move until the transfer finishes either.
    pub unsafe fn adma2_read(&mut self, src_addr: u32, dst: &mut [u8]) -> Result<(), MmcError> {
        let size = self.check_dma_request(dst.len())?;
        self.adma_table.build(dst.as_mut_ptr() as u64, size)?;
        self.start_dma(DataDirection::Read, src_addr, size, DmaEngine::Adma2, false)
    }

    /// Start an ADMA2 write of `src` to block `dst_addr`.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::adma2_read`].
    pub unsafe fn adma2_write(&mut self, src: &[u8], dst_addr: u32) -> Result<(), MmcError> {
        let size = self.check_dma_request(src.len())?;
        self.adma_table.build(src.as_ptr() as u64, size)?;
        self.start_dma(DataDirection::Write, dst_addr, size, DmaEngine::Adma2, false)
    }

    pub(crate) fn sdma_write_raw(
        &mut self,
        src: u64,
        dst_addr: u32,
        size: u32,
    ) -> Result<(), MmcError> {
        self.check_dma_request(size as usize)?;
        self.start_dma(DataDirection::Write, dst_addr, size, DmaEngine::Sdma(src), false)
    }

    // Program the DMA engine and issue the single or multi block command.
    // With `preset_count` the card already got CMD23, so no CMD12 follows.
    pub(crate) fn start_dma(
        &mut self,
        dir: DataDirection,
        card_addr: u32,
        size: u32,
        engine: DmaEngine,
        preset_count: bool,
    ) -> Result<(), MmcError> {
        let block_count = (size - 1) / BLK_SIZE + 1;

        self.wait_card_ready()?;

        let irq_enable = match engine {
            DmaEngine::Sdma(addr) => {
                self.select_dma(SRS10_DMA_SELECT_SDMA, addr);
                self.bus.write32(
                    SRS01,
                    BLK_SIZE | (block_count << BLOCK_COUNT_SHIFT) | SRS1_DMA_BUFF_SIZE_512KB,
                );
                SRS14_COMMAND_COMPLETE_SIG_EN
                    | SRS14_TRANSFER_COMPLETE_SIG_EN
                    | SRS14_DMA_INTERRUPT_SIG_EN
                    | SRS14_DATA_TIMEOUT_ERR_SIG_EN
            }
            DmaEngine::Adma2 => {
                let table = self.adma_table.base_addr();
                self.select_dma(SRS10_DMA_SELECT_ADMA2, table);
                self.bus
                    .write32(SRS01, BLK_SIZE | (block_count << BLOCK_COUNT_SHIFT));
                SRS14_COMMAND_COMPLETE_SIG_EN
                    | SRS14_TRANSFER_COMPLETE_SIG_EN
                    | SRS14_DATA_TIMEOUT_ERR_SIG_EN
                    | SRS14_ADMA_ERROR_SIG_EN
            }
        };
        self.bus.write32(SRS14, irq_enable);

        let multi_block = block_count > 1;
        let mut flags = CmdFlags::DMA_BLOCK;
        if dir == DataDirection::Read {
            flags |= CmdFlags::TRANS_DIRECT_READ;
        }
        if multi_block {
            flags |= CmdFlags::MULTI_BLOCK_SEL;
        }

        let cmd = match (dir, multi_block) {
            (DataDirection::Read, true) => MMC_CMD_18_READ_MULTIPLE_BLOCK,
            (DataDirection::Read, false) => MMC_CMD_17_READ_SINGLE_BLOCK,
            (DataDirection::Write, true) => MMC_CMD_25_WRITE_MULTI_BLOCK,
            (DataDirection::Write, false) => MMC_CMD_24_WRITE_SINGLE_BLOCK,
        };

        if let Err(e) = self.wait_not_inhibited() {
            warn!("DMA {:?} not started: {}", dir, e);
            return Err(e);
        }

        self.multi_block = multi_block && !preset_count;
        self.transfer_complete = false;
        self.state = TransferState::InProgress;
        debug!(
            "DMA {:?} {} blocks at {:#x} via {:?}",
            dir, block_count, card_addr, engine
        );
        self.issue_cmd(cmd, card_addr, flags);
        Ok(())
    }

    pub(crate) fn select_dma(&self, select: u32, addr: u64) {
        self.bus
            .modify32(SRS10, |v| (v & !SRS10_DMA_SELECT_MASK) | select);
        self.bus.write32(SRS22, addr as u32);
        self.bus.write32(SRS23, (addr >> 32) as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmc::config::{CardType, MmcConfig};
    use crate::mmc::sim::SimBus;

    fn ready_host(sim: &SimBus) -> MmcHost<&SimBus> {
        let mut host = MmcHost::new(sim);
        host.init(MmcConfig::new(CardType::Mmc)).unwrap();
        sim.clear_log();
        host
    }

    fn run_to_completion(host: &mut MmcHost<&SimBus>) {
        for _ in 0..16 {
            if host.transfer_status() != TransferState::InProgress {
                return;
            }
            host.handle_interrupt();
        }
    }

    #[test]
    fn adma_table_splits_into_64k_chunks() {
        let mut table = AdmaTable::new();

        let count = table.build(0x8000_0000, 3 * SIZE_64KB + 1024).unwrap();

        assert_eq!(count, 4);
        let entries = &table.entries()[..count];
        assert_eq!(entries[0].len(), SIZE_64KB);
        assert_eq!(entries[0].attributes & 0xFFFF_0000, 0);
        assert_eq!(entries[3].len(), 1024);
        assert_eq!(entries[3].addr_lo, 0x8003_0000);
        assert!(entries[3].is_end());
        assert!(!entries[2].is_end());
        assert_eq!(entries[1].attributes & 0xFFFF, 0x25);
    }

    #[test]
    fn pio_write_then_read_back() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let mut block = [0u32; BLK_WORDS];
        for (i, w) in block.iter_mut().enumerate() {
            *w = 0xA5A5_0000 | i as u32;
        }

        host.single_block_write(&block, 42).unwrap();
        let mut back = [0u32; BLK_WORDS];
        host.single_block_read(42, &mut back).unwrap();

        assert_eq!(back, block);
        assert!(sim.commands().contains(&(MMC_CMD_24_WRITE_SINGLE_BLOCK, 42)));
    }

    #[test]
    fn read_error_is_reported() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        sim.fail_command(MMC_CMD_17_READ_SINGLE_BLOCK);

        let mut buf = [0u32; BLK_WORDS];
        assert_eq!(host.single_block_read(7, &mut buf), Err(MmcError::ErrorInterrupt));
    }

    #[test]
    fn bad_dma_sizes_touch_nothing() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let mut buf = [0u8; 700];

        for len in [0usize, 700] {
            let r = unsafe { host.sdma_read(0, &mut buf[..len]) };
            assert_eq!(r, Err(MmcError::InvalidParameter));
        }
        assert!(sim.writes().is_empty());
        assert_eq!(host.transfer_status(), TransferState::InitSuccess);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn oversized_buffer_is_not_truncated() {
        let sim = SimBus::mmc();
        let host = ready_host(&sim);

        assert_eq!(
            host.check_dma_request((1usize << 32) + 512),
            Err(MmcError::InvalidParameter)
        );
        assert_eq!(host.check_dma_request(1024), Ok(1024));
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + i / 512) as u8).collect()
    }

    #[test]
    fn sdma_round_trip() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let src = pattern(6 * 512);

        unsafe { host.sdma_write(&src, 0x300).unwrap() };
        run_to_completion(&mut host);
        assert_eq!(host.transfer_status(), TransferState::Success);

        let mut back = vec![0u8; src.len()];
        unsafe { host.sdma_read(0x300, &mut back).unwrap() };
        run_to_completion(&mut host);
        assert_eq!(host.transfer_status(), TransferState::Success);
        assert_eq!(back, src);

        let mut block = [0u32; BLK_WORDS];
        host.single_block_read(0x302, &mut block).unwrap();
        assert_eq!(block[0], u32::from_le_bytes(src[1024..1028].try_into().unwrap()));
    }

    #[test]
    fn adma2_round_trip_across_descriptors() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let src = pattern(160 * 512);

        unsafe { host.adma2_write(&src, 0x1000).unwrap() };
        assert_eq!(host.adma_table.entries()[0].len(), SIZE_64KB);
        assert!(host.adma_table.entries()[1].is_end());
        run_to_completion(&mut host);
        assert_eq!(host.transfer_status(), TransferState::Success);

        let mut back = vec![0u8; src.len()];
        unsafe { host.adma2_read(0x1000, &mut back).unwrap() };
        run_to_completion(&mut host);
        assert_eq!(host.transfer_status(), TransferState::Success);
        assert_eq!(back, src);
    }

    #[test]
    fn single_block_sdma_completes_on_transfer_complete() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let buf = [0u8; 512];

        unsafe { host.sdma_write(&buf, 5).unwrap() };
        assert_eq!(host.transfer_status(), TransferState::InProgress);
        assert_eq!(sim.reg(SRS01), 512 | 1 << 16 | SRS1_DMA_BUFF_SIZE_512KB);
        assert_eq!(sim.reg(SRS22), buf.as_ptr() as u64 as u32);

        run_to_completion(&mut host);

        assert_eq!(host.transfer_status(), TransferState::Success);
        assert!(!sim.commands().iter().any(|(op, _)| *op == MMC_CMD_12_STOP_TRANSMISSION));
    }

    #[test]
    fn multi_block_sdma_sends_stop() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let mut buf = [0u8; 4 * 512];

        unsafe { host.sdma_read(100, &mut buf).unwrap() };
        let again = unsafe { host.sdma_read(100, &mut buf) };
        assert_eq!(again, Err(MmcError::TransferInProgress));

        run_to_completion(&mut host);

        assert_eq!(host.transfer_status(), TransferState::Success);
        assert_eq!(sim.reg(SRS01) >> 16, 4);
        let cmds = sim.commands();
        assert!(cmds.contains(&(MMC_CMD_18_READ_MULTIPLE_BLOCK, 100)));
        assert!(cmds.contains(&(MMC_CMD_12_STOP_TRANSMISSION, RCA_VALUE << 16)));
    }

    #[test]
    fn adma2_points_controller_at_table() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let buf = [0u8; 2 * 512];

        unsafe { host.adma2_write(&buf, 9).unwrap() };

        assert_eq!(sim.reg(SRS10) & SRS10_DMA_SELECT_MASK, SRS10_DMA_SELECT_ADMA2);
        assert_eq!(sim.reg(SRS01), 512 | 2 << 16);
        let table = host.adma_table.entries().as_ptr() as u64;
        assert_eq!(sim.reg(SRS22), table as u32);
        assert_eq!(host.adma_table.entries()[0].len(), 1024);

        run_to_completion(&mut host);
        assert_eq!(host.transfer_status(), TransferState::Success);
    }
}
