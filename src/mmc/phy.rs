use log::{debug, info, warn};

use crate::err::MmcError;

use super::{
    cmd::{MmcCommand, ResponseType},
    config::{BusWidth, ClockRate},
    constant::*,
    regs::RegisterBus,
    CmdResponse, MmcHost,
};

/// Input delay lines of the SD/eMMC PHY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyDelay {
    HighSpeed,
    DefaultSpeed,
    UhsSdr12,
    UhsSdr25,
    UhsSdr50,
    UhsDdr50,
    MmcLegacy,
    MmcSdr,
    MmcDdr,
    SdClk,
    HsSdClk,
    DataStrobe,
}

impl PhyDelay {
    pub fn addr(&self) -> u8 {
        match self {
            PhyDelay::HighSpeed => UIS_ADDR_HIGH_SPEED,
            PhyDelay::DefaultSpeed => UIS_ADDR_DEFAULT_SPEED,
            PhyDelay::UhsSdr12 => UIS_ADDR_UHSI_SDR12,
            PhyDelay::UhsSdr25 => UIS_ADDR_UHSI_SDR25,
            PhyDelay::UhsSdr50 => UIS_ADDR_UHSI_SDR50,
            PhyDelay::UhsDdr50 => UIS_ADDR_UHSI_DDR50,
            PhyDelay::MmcLegacy => UIS_ADDR_MMC_LEGACY,
            PhyDelay::MmcSdr => UIS_ADDR_MMC_SDR,
            PhyDelay::MmcDdr => UIS_ADDR_MMC_DDR,
            PhyDelay::SdClk => UIS_ADDR_SDCLK,
            PhyDelay::HsSdClk => UIS_ADDR_HS_SDCLK,
            PhyDelay::DataStrobe => UIS_ADDR_DAT_STROBE,
        }
    }
}

pub(crate) const MMC_TUNING_PATTERN_4BIT: [u32; 16] = [
    0x00ff0fff, 0xccc3ccff, 0xffcc3cc3, 0xeffefffe, 0xddffdfff, 0xfbfffbff, 0xff7fffbf, 0xefbdf777,
    0xf0fff0ff, 0x3cccfc0f, 0xcfcc33cc, 0xeeffefff, 0xfdfffdff, 0xffbfffdf, 0xfff7ffbb, 0xde7b7ff7,
];

pub(crate) const MMC_TUNING_PATTERN_8BIT: [u32; 32] = [
    0xff00ffff, 0x0000ffff, 0xccccffff, 0xcccc33cc, 0xcc3333cc, 0xffffcccc, 0xffffeeff, 0xffeeeeff,
    0xffddffff, 0xddddffff, 0xbbffffff, 0xbbffffff, 0xffffffbb, 0xffffff77, 0x77ff7777, 0xffeeddbb,
    0x00ffffff, 0x00ffffff, 0xccffff00, 0xcc33cccc, 0x3333cccc, 0xffcccccc, 0xffeeffff, 0xeeeeffff,
    0xddffffff, 0xddffffff, 0xffffffdd, 0xffffffbb, 0xffffbbbb, 0xffff77ff, 0xff7777ff, 0xeeddbb77,
];

const SD_TUNING_BLOCK_WORDS: usize = 16;
// Delay positions swept by PHY training
const PHY_MAX_DELAYS: usize = 32;

/// Centre of the first longest run of passing positions.
pub fn longest_valid_window(ok: &[bool]) -> usize {
    let mut pos = 0;
    let mut length = 0;
    let mut curr = 0;

    for (i, passed) in ok.iter().enumerate() {
        if *passed {
            curr += 1;
            if curr > length {
                pos = i + 1 - curr;
                length = curr;
            }
        } else {
            curr = 0;
        }
    }

    pos + length / 2
}

impl<B: RegisterBus> MmcHost<B> {
    pub(crate) fn phy_write_set(&self, line: PhyDelay, delay: u8) -> Result<(), MmcError> {
        self.wait_clear(HRS04, HRS_PHY_ACKNOWLEDGE_REQUEST)?;

        let cfg = line.addr() as u32 | ((delay as u32) << 8);
        self.bus.write32(HRS04, cfg);
        self.bus.set_bits32(HRS04, HRS_PHY_WRITE_REQUEST);

        self.wait_set(HRS04, HRS_PHY_ACKNOWLEDGE_REQUEST)?;

        self.bus.write32(HRS04, cfg & !HRS_PHY_WRITE_REQUEST);
        self.bus.write32(HRS04, 0);
        Ok(())
    }

    // Sweep the input delay line with single block reads and settle in the
    // middle of the longest passing window
    pub(crate) fn phy_training(&self, line: PhyDelay, clk_khz: u32) -> Result<(), MmcError> {
        let max_delay: u32 = if clk_khz <= ClockRate::MHZ_12_5 {
            20
        } else {
            (ClockRate::MHZ_200 / clk_khz.max(1)) * 2
        };

        let max_delay = (max_delay as usize).min(PHY_MAX_DELAYS);
        let mut buf = [0u32; BLK_WORDS];
        let mut ok = [false; PHY_MAX_DELAYS];

        self.bus.set_bits32(SRS11, SRS11_RESET_DATA_CMD_LINE);

        for (delay, passed) in ok[..max_delay].iter_mut().enumerate() {
            self.phy_write_set(line, delay as u8)?;

            *passed = self.read_tune_block(&mut buf, MMC_CMD_17_READ_SINGLE_BLOCK).is_ok();
            if *passed {
                self.bus.set_bits32(SRS11, SRS11_RESET_DATA_CMD_LINE);
            } else {
                self.recover_to_transfer_state()?;
            }
        }

        let delay = longest_valid_window(&ok[..max_delay]);
        debug!("PHY {:?}: delay {} of {}", line, delay, max_delay);
        self.phy_write_set(line, delay as u8)?;

        let result = self.read_tune_block(&mut buf, MMC_CMD_17_READ_SINGLE_BLOCK);
        self.bus.set_bits32(SRS11, SRS11_RESET_DATA_CMD_LINE);
        result
    }

    fn recover_to_transfer_state(&self) -> Result<(), MmcError> {
        let cmd = MmcCommand::new(MMC_CMD_13_SEND_STATUS, self.rca_arg(), ResponseType::R1);
        let mut failed = true;

        for _ in 0..self.poll_budget() {
            if failed {
                self.reset_lines()?;
            }
            let resp = self.send_cmd(cmd);
            failed = resp.is_err();
            if resp == Ok(CmdResponse::Success)
                && self.response() & DEVICE_STATE_MASK == DEVICE_STATE_TRANS
            {
                return Ok(());
            }
        }
        Err(MmcError::Timeout)
    }

    /// Polled read of one tuning or probe block into `buf`.
    pub(crate) fn read_tune_block(&self, buf: &mut [u32], cmd: u8) -> Result<(), MmcError> {
        self.pio_read(buf, cmd, 0)?;
        self.bus.write32(SRS12, SRS12_STATUS_CLEAR);
        Ok(())
    }

    /// Switch function status read (SD CMD6, 64 bytes).
    pub(crate) fn cmd6_single_block_read(
        &self,
        arg: u32,
        buf: &mut [u32; 16],
    ) -> Result<(), MmcError> {
        let result = self.pio_read(buf, MMC_CMD_6_SWITCH, arg);
        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }

    fn host_mmc_tune(&self, value: u8) -> Result<(), MmcError> {
        self.bus.modify32(HRS06, |v| {
            (v & !HRS6_EMMC_TUNE_VALUE_MASK) | ((value as u32) << 8) | HRS6_EMMC_TUNE_REQUEST
        });
        self.wait_clear(HRS06, HRS6_EMMC_TUNE_REQUEST)?;
        Ok(())
    }

    /// HS200 sampling point search with CMD21.
    pub(crate) fn execute_tuning_mmc(&self, width: BusWidth) -> Result<(), MmcError> {
        let pattern: &[u32] = match width {
            BusWidth::Bit4 => &MMC_TUNING_PATTERN_4BIT,
            _ => &MMC_TUNING_PATTERN_8BIT,
        };
        let mut read = [0u32; 32];
        let read = &mut read[..pattern.len()];
        let mut ok = [false; TUNING_POSITIONS];

        for (j, passed) in ok.iter_mut().enumerate() {
            self.host_mmc_tune(j as u8)?;
            read.fill(0);

            *passed = self.read_tune_block(read, MMC_CMD_21_SEND_TUNE_BLK).is_ok()
                && read[..] == pattern[..];
            if !*passed {
                self.bus.set_bits32(SRS11, SRS11_RESET_DATA_CMD_LINE);
            }
        }

        let pos = longest_valid_window(&ok);
        info!("eMMC tuning value {}", pos);
        self.host_mmc_tune(pos as u8)?;
        self.read_tune_block(read, MMC_CMD_21_SEND_TUNE_BLK)
    }

    /// SD UHS-I tuning driven by the host tuning engine (CMD19).
    pub(crate) fn sd_tuning(&self) -> Result<(), MmcError> {
        let mut buf = [0u32; SD_TUNING_BLOCK_WORDS];

        let mut srs15 = self.bus.read32(SRS15);
        srs15 = (srs15 & !SRS15_SAMPLING_CLOCK_SELECT) | SRS15_EXECUTE_TUNING;
        self.bus.write32(SRS15, srs15);

        let mut result = Ok(());
        let mut remaining = SD_TUNING_ITERATIONS;
        while srs15 & SRS15_EXECUTE_TUNING != 0 {
            result = self.read_tune_block(&mut buf, SD_CMD_19_SEND_TUNING_BLK);
            if remaining == 0 || result.is_err() {
                break;
            }
            srs15 = self.bus.read32(SRS15);
            remaining -= 1;
        }

        result?;
        if srs15 & SRS15_SAMPLING_CLOCK_SELECT == 0 {
            warn!("SD tuning did not lock a sampling point");
            return Err(MmcError::SdCardTuningFailed);
        }
        Ok(())
    }
}
