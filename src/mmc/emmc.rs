use log::{debug, info, warn};

use crate::{delay_cycles, err::MmcError};

use super::{
    cmd::{MmcCommand, ResponseType},
    config::{BusMode, BusVoltage, BusWidth, ClockRate, MmcTiming},
    constant::*,
    phy::PhyDelay,
    regs::RegisterBus,
    CmdResponse, MmcHost,
};

/// eMMC extended CSD register, 512 bytes as read from the buffer port.
#[derive(Clone)]
pub struct ExtCsd([u32; BLK_WORDS]);

impl ExtCsd {
    pub fn from_words(words: [u32; BLK_WORDS]) -> Self {
        Self(words)
    }

    pub fn byte(&self, offset: usize) -> u8 {
        self.0[offset / 4].to_le_bytes()[offset % 4]
    }

    fn u32_at(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.byte(offset),
            self.byte(offset + 1),
            self.byte(offset + 2),
            self.byte(offset + 3),
        ])
    }

    pub fn device_type(&self) -> u8 {
        self.byte(EXT_CSD_CARD_TYPE_OFFSET)
    }

    pub fn hs_timing(&self) -> u8 {
        self.byte(EXT_CSD_HS_TIMING_OFFSET)
    }

    pub fn revision(&self) -> u8 {
        self.byte(EXT_CSD_REVISION_OFFSET)
    }

    pub fn strobe_support(&self) -> u8 {
        self.byte(EXT_CSD_ES_SUPPORT_OFFSET)
    }

    /// HPI capability bits share the strobe support byte on this device family.
    pub fn hpi_features(&self) -> u8 {
        self.byte(EXT_CSD_ES_SUPPORT_OFFSET)
    }

    pub fn sector_count(&self) -> u32 {
        self.u32_at(EXT_CSD_SECTOR_COUNT_OFFSET)
    }

    pub fn cq_support(&self) -> u8 {
        self.byte(EXT_CSD_CQ_SUPPORT_OFFSET)
    }

    pub fn cq_enabled(&self) -> bool {
        self.byte(EXT_CSD_CQ_MODE_EN_OFFSET) == 1
    }

    pub fn correctly_programmed_sectors(&self) -> u32 {
        self.u32_at(EXT_CSD_CORRECTLY_PRG_SECTORS_OFFSET)
    }
}

impl core::fmt::Debug for ExtCsd {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExtCsd")
            .field("rev", &self.revision())
            .field("device_type", &format_args!("{:#x}", self.device_type()))
            .field("hs_timing", &self.hs_timing())
            .field("sectors", &self.sector_count())
            .finish()
    }
}

fn width_arg(width: BusWidth) -> u32 {
    match width {
        BusWidth::Bit1 => 0,
        BusWidth::Bit4 => MMC_DATA_WIDTH_4BIT,
        BusWidth::Bit8 => MMC_DATA_WIDTH_8BIT,
    }
}

impl<B: RegisterBus> MmcHost<B> {
    /// Read the device EXT_CSD register (CMD8).
    pub fn read_ext_csd(&self) -> Result<ExtCsd, MmcError> {
        let mut words = [0u32; BLK_WORDS];
        self.read_block(MMC_CMD_8_SEND_EXT_CSD, 0, &mut words)?;
        Ok(ExtCsd(words))
    }

    pub(crate) fn mmc_bring_up(&mut self, bus_mode: BusMode) -> Result<(), MmcError> {
        self.mmccard_oper_config()?;

        self.send_cmd(MmcCommand::new(SD_CMD_16, BLK_SIZE, ResponseType::R1))?
            .ready()?;

        let ext_csd = self.read_ext_csd()?;
        debug!("{:?}", ext_csd);
        let device_type = ext_csd.device_type();

        self.hpi.support = ext_csd.hpi_features();
        if self.hpi.support & DEVICE_HPI_SUPPORT != 0 {
            if let Err(e) = self.mmc_switch(MMC_HPI_ENABLE) {
                warn!("HPI enable failed: {}", e);
            }
        }

        match bus_mode {
            BusMode::MmcHs400 { enhanced_strobe } => {
                if device_type & DEVICE_SUPPORT_HS400 == 0
                    || (enhanced_strobe && ext_csd.strobe_support() != 1)
                {
                    return Err(MmcError::DeviceNotSupportHs400);
                }
                self.set_device_hs400_mode(enhanced_strobe)
                    .map_err(|_| MmcError::Hs400ModeSetupFailure)?;
            }
            BusMode::MmcHs200 { width } => {
                if device_type & DEVICE_SUPPORT_HS200 == 0 {
                    return Err(MmcError::DeviceNotSupportHs200);
                }
                self.device_set_hs_timing(MmcTiming::Hs200, width)
                    .map_err(|_| MmcError::ModeNotSupportDataWidth)?;
                self.execute_tuning_mmc(width)
                    .map_err(|_| MmcError::TransferFail)?;
            }
            BusMode::MmcDdr { dual_width } => {
                if device_type & DEVICE_SUPPORT_DDR == 0 {
                    return Err(MmcError::DeviceNotSupportDdr);
                }
                let width = if dual_width == MMC_DUAL_DATA_WIDTH_8BIT {
                    BusWidth::Bit8
                } else {
                    BusWidth::Bit4
                };
                self.device_set_hs_timing(MmcTiming::Ddr, width)
                    .map_err(|_| MmcError::ModeNotSupportDataWidth)?;
                self.bus.set_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);
            }
            BusMode::MmcSdr { width } => {
                if device_type & (DEVICE_SUPPORT_SDR_50MHZ | DEVICE_SUPPORT_SDR_25MHZ) == 0 {
                    return Err(MmcError::DeviceNotSupportSdr);
                }
                self.device_set_hs_timing(MmcTiming::Sdr, width)
                    .map_err(|_| MmcError::DataWidthError)?;
                if device_type & DEVICE_SUPPORT_SDR_50MHZ != 0 {
                    self.bus.set_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);
                }
            }
            BusMode::MmcLegacy { width } => {
                self.device_set_hs_timing(MmcTiming::Legacy, width)
                    .map_err(|_| MmcError::ClockDividerError)?;
            }
            BusMode::Sd { .. } => return Err(MmcError::InvalidParameter),
        }

        let ext_csd = self.read_ext_csd()?;
        if ext_csd.hs_timing() == 0 && !matches!(bus_mode, BusMode::MmcLegacy { .. }) {
            warn!("device did not latch HS_TIMING");
            return Err(MmcError::ClockDividerError);
        }

        info!(
            "eMMC rev {} ready, {} sectors, {:?}",
            ext_csd.revision(),
            ext_csd.sector_count(),
            bus_mode
        );
        Ok(())
    }

    // CMD1 negotiation, identification and selection
    fn mmccard_oper_config(&mut self) -> Result<(), MmcError> {
        self.send_cmd(MmcCommand::new(MMC_CMD_1_SEND_OP_COND, 0, ResponseType::R3))
            .map_err(|_| MmcError::OpCondError)?;
        let ocr = self.response();

        let oper = match self.config.bus_voltage {
            BusVoltage::V1_8 => {
                if ocr & MMC_DEVICE_LOW_POWER == 0 {
                    return Err(MmcError::DeviceNotSupportLowPower);
                }
                MMC_DEVICE_LOW_VOLT_SET
            }
            BusVoltage::V3_3 => MMC_DEVICE_3_3V_VOLT_SET,
        };

        let mut ready = false;
        for _ in 0..self.poll_budget() {
            self.send_cmd(MmcCommand::new(MMC_CMD_1_SEND_OP_COND, oper, ResponseType::R3))
                .map_err(|_| MmcError::OpCondError)?;
            if self.response() & BUSY_BIT_MASK != 0 {
                ready = true;
                break;
            }
        }
        if !ready {
            return Err(MmcError::OpCondError);
        }
        delay_cycles(DELAY_COUNT);

        self.send_cmd(MmcCommand::new(MMC_CMD_2_ALL_SEND_CID, 0, ResponseType::R2))
            .map_err(|_| MmcError::CidResponseError)?;

        let set_rca = MmcCommand::new(MMC_CMD_3_SET_RELATIVE_ADDR, self.rca_arg(), ResponseType::R1);
        let mut assigned = false;
        for _ in 0..self.poll_budget() {
            if let Ok(CmdResponse::Success) = self.send_cmd(set_rca) {
                assigned = true;
                break;
            }
        }
        if !assigned {
            return Err(MmcError::RcaError);
        }

        self.send_cmd(MmcCommand::new(MMC_CMD_9_SEND_CSD, self.rca_arg(), ResponseType::R2))?;

        self.send_cmd(MmcCommand::new(
            MMC_CMD_7_SELECT_DESELECT_CARD,
            self.rca_arg(),
            ResponseType::R1,
        ))
        .and_then(CmdResponse::ready)
        .map_err(|_| MmcError::CardSelectError)?;

        // Back to a 1-bit bus until the bus mode is chosen
        self.mmc_switch(MMC_DW_CSD)
            .map_err(|_| MmcError::DataWidthError)?;

        self.phy_training(PhyDelay::MmcLegacy, ClockRate::KHZ_400)?;
        self.set_data_timeout(DATA_TIMEOUT_VALUE)?;

        self.init_complete = true;
        debug!("eMMC selected, rca {:#x}", self.rca);
        Ok(())
    }

    pub(crate) fn set_host_data_width(&self, width: BusWidth) {
        self.bus.modify32(SRS10, |v| match width {
            BusWidth::Bit4 => v | SRS10_DATA_WIDTH_4BIT,
            BusWidth::Bit8 => v | SRS10_EXTENDED_DATA_TRANSFER_WIDTH,
            BusWidth::Bit1 => v & !(SRS10_DATA_WIDTH_4BIT | SRS10_EXTENDED_DATA_TRANSFER_WIDTH),
        });
    }

    // Switch device timing and width, then follow with the host side
    fn device_set_hs_timing(&self, timing: MmcTiming, width: BusWidth) -> Result<(), MmcError> {
        let clk = self.config.clk_rate;
        self.set_host_data_width(width);

        let (hs_timing, host_mode, phy) = match timing {
            MmcTiming::Legacy => {
                if clk > ClockRate::MHZ_26 {
                    return Err(MmcError::TransferFail);
                }
                (MMC_LEGACY_MODE, MODE_LEGACY, Some(PhyDelay::MmcLegacy))
            }
            MmcTiming::Sdr => (MMC_HS_MODE, MODE_SDR, Some(PhyDelay::MmcSdr)),
            MmcTiming::Ddr => (MMC_HS_MODE, MODE_DDR, Some(PhyDelay::MmcDdr)),
            MmcTiming::Hs200 => {
                if width == BusWidth::Bit1 {
                    return Err(MmcError::TransferFail);
                }
                (MMC_HS200_MODE, MODE_HS200, None)
            }
        };

        match timing {
            MmcTiming::Ddr => {
                let dual = match width {
                    BusWidth::Bit8 => MMC_DUAL_DATA_WIDTH_8BIT,
                    BusWidth::Bit4 => MMC_DUAL_DATA_WIDTH_4BIT,
                    BusWidth::Bit1 => return Err(MmcError::TransferFail),
                };
                self.mmc_switch(hs_timing)?;
                self.mmc_switch(MMC_DW_CSD | (dual << 8))?;
            }
            MmcTiming::Legacy => {
                self.mmc_switch(MMC_DW_CSD | (width_arg(width) << 8))?;
            }
            _ => {
                self.mmc_switch(MMC_DW_CSD | (width_arg(width) << 8))?;
                self.mmc_switch(hs_timing)?;
            }
        }

        self.set_host_mode(host_mode);
        self.set_host_sdclk(clk)?;
        if let Some(line) = phy {
            self.phy_training(line, clk)
                .map_err(|_| MmcError::TransferFail)?;
        }
        Ok(())
    }

    // HS400 goes through HS200 tuning (plain) or straight from HS (enhanced strobe)
    fn set_device_hs400_mode(&self, enhanced_strobe: bool) -> Result<(), MmcError> {
        let clk = self.config.clk_rate;
        self.bus.set_bits32(SRS10, SRS10_EXTENDED_DATA_TRANSFER_WIDTH);

        if !enhanced_strobe {
            self.mmc_switch(MMC_DW_CSD | (MMC_DATA_WIDTH_8BIT << 8))?;
            self.mmc_switch(MMC_HS200_MODE)?;

            self.set_host_mode(MODE_HS200);
            self.set_host_sdclk(clk)?;
            if let Err(e) = self.execute_tuning_mmc(BusWidth::Bit8) {
                warn!("HS200 tuning before HS400 failed: {}", e);
            }
            self.read_ext_csd()?;
        }

        self.mmc_switch(MMC_HS_MODE)?;
        self.set_host_sdclk(ClockRate::MHZ_50)?;
        self.bus.set_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);

        let dual = if enhanced_strobe {
            MMC_ES_DUAL_DATA_WIDTH_8BIT
        } else {
            MMC_DUAL_DATA_WIDTH_8BIT
        };
        self.mmc_switch(MMC_DW_CSD | (dual << 8))?;

        self.set_host_mode(MODE_DDR);
        self.set_host_sdclk(ClockRate::MHZ_50)?;
        self.read_ext_csd()?;

        self.mmc_switch(MMC_HS400_MODE)?;
        self.set_host_mode(if enhanced_strobe {
            MODE_HS400_ES
        } else {
            MODE_HS400
        });
        self.set_host_sdclk(clk)?;

        let mut probe = [0u32; BLK_WORDS];
        self.read_block(MMC_CMD_17_READ_SINGLE_BLOCK, 0, &mut probe)
            .map_err(|_| MmcError::TransferFail)
    }
}
