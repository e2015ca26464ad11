use log::{debug, warn};

use crate::err::MmcError;

use super::{
    block::{DataDirection, DmaEngine},
    cmd::{MmcCommand, ResponseType},
    constant::*,
    MmcHost,
    regs::RegisterBus,
};

// CMD23 argument bit marking a packed command
const SET_BLOCK_COUNT_PACKED: u32 = 1 << 30;

fn packed_count_arg(blocks: u32) -> u32 {
    blocks | SET_BLOCK_COUNT_PACKED
}

impl<B: RegisterBus> MmcHost<B> {
    /// Start a packed write of `src` to block `dest`.
    ///
    /// `src` holds the packed header block followed by the packed data, so
    /// it must span at least two blocks. The block count is preset with
    /// CMD23, no stop command follows.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::sdma_write`].
    pub unsafe fn packed_write(&mut self, src: &[u8], dest: u32) -> Result<(), MmcError> {
        let size = self.check_dma_request(src.len())?;
        let blocks = size / BLK_SIZE;
        if blocks <= 1 {
            return Err(MmcError::DataSizeIsNotMultiBlock);
        }

        self.set_packed_count(blocks)?;
        self.start_dma(
            DataDirection::Write,
            dest,
            size,
            DmaEngine::Sdma(src.as_ptr() as u64),
            true,
        )
    }

    /// Start a packed read from block `src` into `dest`.
    ///
    /// The packed header is written to the card first, then the data of all
    /// packed entries is read in one DMA transfer.
    ///
    /// # Safety
    ///
    /// As for [`MmcHost::sdma_read`].
    pub unsafe fn packed_read(
        &mut self,
        src: u32,
        dest: &mut [u8],
        header: &[u32; BLK_WORDS],
    ) -> Result<(), MmcError> {
        let size = self.check_dma_request(dest.len())?;
        let blocks = size / BLK_SIZE;
        if blocks <= 1 {
            return Err(MmcError::DataSizeIsNotMultiBlock);
        }

        self.wait_card_ready()?;
        self.set_packed_count(1)?;
        let header_result = self.pio_write(MMC_CMD_25_WRITE_MULTI_BLOCK, src, header);
        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        if let Err(e) = header_result {
            warn!("packed header rejected: {}", e);
            return Err(MmcError::ErrorInterrupt);
        }

        self.set_packed_count(blocks)?;
        self.start_dma(
            DataDirection::Read,
            src,
            size,
            DmaEngine::Sdma(dest.as_mut_ptr() as u64),
            true,
        )
    }

    fn set_packed_count(&self, blocks: u32) -> Result<(), MmcError> {
        debug!("CMD23 packed, {} blocks", blocks);
        self.send_cmd(MmcCommand::new(
            MMC_CMD_23_SET_BLOCK_COUNT,
            packed_count_arg(blocks),
            ResponseType::R1,
        ))?
        .ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mmc::config::{CardType, MmcConfig};
    use crate::mmc::sim::SimBus;
    use crate::mmc::TransferState;

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
    fn packed_write_presets_count_without_stop() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let buf = [0u8; 3 * 512];

        unsafe { host.packed_write(&buf, 0x40).unwrap() };

        let cmds = sim.commands();
        assert_eq!(cmds[cmds.len() - 1], (MMC_CMD_25_WRITE_MULTI_BLOCK, 0x40));
        assert!(cmds.contains(&(MMC_CMD_23_SET_BLOCK_COUNT, 3 | 1 << 30)));
        assert_eq!(sim.reg(SRS01), 512 | 3 << 16 | SRS1_DMA_BUFF_SIZE_512KB);

        run_to_completion(&mut host);

        assert_eq!(host.transfer_status(), TransferState::Success);
        assert!(!sim
            .commands()
            .iter()
            .any(|(op, _)| *op == MMC_CMD_12_STOP_TRANSMISSION));
    }

    #[test]
    fn packed_write_needs_multiple_blocks() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let buf = [0u8; 512];

        let r = unsafe { host.packed_write(&buf, 0) };

        assert_eq!(r, Err(MmcError::DataSizeIsNotMultiBlock));
        assert!(sim.commands().is_empty());
        assert_eq!(host.transfer_status(), TransferState::InitSuccess);
    }

    #[test]
    fn packed_read_sends_header_then_reads() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        let mut header = [0u32; BLK_WORDS];
        header[0] = 0x0000_0201;
        let mut buf = [0u8; 2 * 512];

        unsafe { host.packed_read(0x80, &mut buf, &header).unwrap() };

        let cmds: Vec<_> = sim
            .commands()
            .into_iter()
            .filter(|(op, _)| *op != MMC_CMD_13_SEND_STATUS)
            .collect();
        assert_eq!(
            cmds,
            vec![
                (MMC_CMD_23_SET_BLOCK_COUNT, 1 | 1 << 30),
                (MMC_CMD_25_WRITE_MULTI_BLOCK, 0x80),
                (MMC_CMD_23_SET_BLOCK_COUNT, 2 | 1 << 30),
                (MMC_CMD_18_READ_MULTIPLE_BLOCK, 0x80),
            ]
        );
        assert_eq!(sim.reg(SRS22), buf.as_ptr() as u64 as u32);

        run_to_completion(&mut host);
        assert_eq!(host.transfer_status(), TransferState::Success);
    }

    #[test]
    fn rejected_header_aborts_packed_read() {
        let sim = SimBus::mmc();
        let mut host = ready_host(&sim);
        sim.fail_command(MMC_CMD_25_WRITE_MULTI_BLOCK);
        let header = [0u32; BLK_WORDS];
        let mut buf = [0u8; 2 * 512];

        let r = unsafe { host.packed_read(0, &mut buf, &header) };

        assert_eq!(r, Err(MmcError::ErrorInterrupt));
        assert_eq!(host.transfer_status(), TransferState::InitSuccess);
    }
}
