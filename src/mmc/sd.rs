use log::{debug, info, warn};

use crate::{delay_cycles, err::MmcError};

use super::{
    cmd::{MmcCommand, ResponseType},
    config::{BusMode, BusWidth, SpeedMode},
    constant::*,
    phy::PhyDelay,
    regs::{PresentState, RegisterBus},
    MmcHost,
};

const SWITCH_STATUS_WORDS: usize = 16;
const SWITCH_STATUS_NOT_SUPPORTED: u8 = 0xF;

/// 64-byte SD switch function status returned by CMD6.
pub(crate) struct SwitchStatus([u32; SWITCH_STATUS_WORDS]);

impl SwitchStatus {
    fn byte(&self, offset: usize) -> u8 {
        self.0[offset / 4].to_le_bytes()[offset % 4]
    }

    /// Function selected (or 0xF) for the given group.
    fn status_code(&self, group: u8) -> u8 {
        let b = self.byte(16 + ((group as usize - 1) >> 1));
        if group % 2 == 1 {
            b & 0xF
        } else {
            b >> 4
        }
    }

    fn version(&self) -> u8 {
        self.byte(17)
    }

    fn busy(&self, group: u8, function: u8) -> bool {
        let offset = 28 + 2 * (group as usize - 1);
        let bits = u16::from_be_bytes([self.byte(offset), self.byte(offset + 1)]);
        bits & (1 << function) != 0
    }
}

/// Voltage window the card is asked for, and the matching host bus voltage.
pub(crate) fn pick_card_voltage(ocr: u32) -> (u32, u32) {
    if ocr & SDCARD_REG_OCR_3_3_3_4 != 0 {
        (SDCARD_REG_OCR_3_3_3_4, SRS10_SET_3_3V_BUS_VOLTAGE)
    } else if ocr & SDCARD_REG_OCR_3_2_3_3 != 0 {
        (SDCARD_REG_OCR_3_2_3_3, SRS10_SET_3_3V_BUS_VOLTAGE)
    } else if ocr & SDCARD_REG_OCR_3_0_3_1 != 0 {
        (SDCARD_REG_OCR_3_0_3_1, SRS10_SET_3_0V_BUS_VOLTAGE)
    } else if ocr & SDCARD_REG_OCR_2_9_3_0 != 0 {
        (SDCARD_REG_OCR_2_9_3_0, SRS10_SET_3_0V_BUS_VOLTAGE)
    } else {
        (SDCARD_REG_OCR_3_3_3_4, SRS10_SET_3_3V_BUS_VOLTAGE)
    }
}

fn access_mode(mode: SpeedMode) -> u8 {
    match mode {
        SpeedMode::SdHighSpeed | SpeedMode::SdSdr25 => SDCARD_SWITCH_ACCESS_MODE_SDR25,
        SpeedMode::SdSdr50 => SDCARD_SWITCH_ACCESS_MODE_SDR50,
        SpeedMode::SdSdr104 => SDCARD_SWITCH_ACCESS_MODE_SDR104,
        SpeedMode::SdDdr50 => SDCARD_SWITCH_ACCESS_MODE_DDR50,
        _ => SDCARD_SWITCH_ACCESS_MODE_SDR12,
    }
}

impl<B: RegisterBus> MmcHost<B> {
    /// Host advertises 1.8V and at least one UHS-I mode.
    pub(crate) fn is_uhsi_supported(&self) -> bool {
        if self.bus.read32(SRS16) & SRS16_VOLTAGE_1_8V_SUPPORT == 0 {
            return false;
        }
        self.bus.read32(SRS17)
            & (SRS17_SDR50_SUPPORTED | SRS17_SDR104_SUPPORTED | SRS17_DDR50_SUPPORTED)
            != 0
    }

    pub(crate) fn sd_bring_up(&mut self, bus_mode: BusMode) -> Result<(), MmcError> {
        let BusMode::Sd { mode, width } = bus_mode else {
            return Err(MmcError::InvalidParameter);
        };

        self.send_cmd(MmcCommand::new(SD_CMD_8_SEND_IF_COND, IF_COND_27V_33V, ResponseType::R7))?
            .ready()?;

        let max_current = self.bus.read32(SRS18);
        let max_3v3 = (max_current & 0xFF) * 4;
        let max_1v8 = ((max_current >> 16) & 0xFF) * 4;
        let xpc = max_3v3 >= MAX_CURRENT_MA && max_1v8 >= MAX_CURRENT_MA;
        let mut s18r = self.is_uhsi_supported();

        self.send_cmd(MmcCommand::new(SD_CMD_55, 0, ResponseType::R1))?;
        self.send_cmd(MmcCommand::new(SD_ACMD_41_SEND_OP_COND, 0, ResponseType::R3))?;
        let ocr = self.response();

        if matches!(mode, SpeedMode::SdDefaultSpeed | SpeedMode::SdHighSpeed) {
            s18r = false;
        }

        let (card_volt, host_volt) = pick_card_voltage(ocr);
        if host_volt != SRS10_SET_3_3V_BUS_VOLTAGE {
            self.set_sdhost_power(host_volt)?;
            self.send_cmd(MmcCommand::new(MMC_CMD_0_GO_IDLE_STATE, 0, ResponseType::NoResp))?;
            delay_cycles(DELAY_COUNT);
            self.send_cmd(MmcCommand::new(SD_CMD_8_SEND_IF_COND, IF_COND_27V_33V, ResponseType::R7))
                .map_err(|_| MmcError::SdCardNotSupportVoltage)?;
        }

        let mut arg = card_volt | SDCARD_ACMD41_HCS;
        if s18r {
            arg |= SDCARD_REG_OCR_S18R;
        }
        if xpc {
            arg |= SDCARD_REG_OCR_XPC;
        }

        let mut ocr = 0;
        for _ in 0..self.poll_budget() {
            delay_cycles(DELAY_COUNT);
            self.send_cmd(MmcCommand::new(SD_CMD_55, 0, ResponseType::R1))?;
            delay_cycles(DELAY_COUNT);
            self.send_cmd(MmcCommand::new(SD_ACMD_41_SEND_OP_COND, arg, ResponseType::R3))?;
            ocr = self.response();
            if ocr & SDCARD_REG_OCR_READY != 0 {
                break;
            }
        }
        if ocr & SDCARD_REG_OCR_READY == 0 {
            return Err(MmcError::OpCondError);
        }

        let s18a = ocr & SDCARD_REG_OCR_S18A != 0;
        if s18a {
            self.switch_signal_voltage(width, 2)?;
        }

        self.send_cmd(MmcCommand::new(MMC_CMD_2_ALL_SEND_CID, 0, ResponseType::R2))
            .map_err(|_| MmcError::CidResponseError)?;
        self.send_cmd(MmcCommand::new(MMC_CMD_3_SET_RELATIVE_ADDR, 0, ResponseType::R6))
            .map_err(|_| MmcError::RcaError)?;
        self.rca = (self.response() >> 16) & 0xFFFF;

        if !s18a && s18r {
            if let Err(e) = self.probe_uhs_signalling() {
                debug!("UHS-I signalling probe: {}", e);
            }
        }

        self.send_cmd(MmcCommand::new(MMC_CMD_9_SEND_CSD, self.rca_arg(), ResponseType::R2))?;

        let resp = self
            .send_cmd(MmcCommand::new(
                MMC_CMD_7_SELECT_DESELECT_CARD,
                self.rca_arg(),
                ResponseType::R1b,
            ))
            .map_err(|_| MmcError::CardSelectError)?;
        self.check_device_status(resp)?;

        // Card interrupts are masked while the bus width changes
        let srs13 = self.bus.read32(SRS13);
        self.bus.write32(SRS13, srs13 & !SRS13_CARD_INTERRUPT_STAT_EN);
        delay_cycles(DELAY_COUNT);

        self.send_cmd(MmcCommand::new(SD_CMD_55, self.rca_arg(), ResponseType::R1))?;
        let bus_width = match width {
            BusWidth::Bit4 => SDCARD_BIS_BUS_WIDTH_4BIT,
            _ => SDCARD_BIS_BUS_WIDTH_1BIT,
        };
        self.send_cmd(MmcCommand::new(SD_ACMD_6, bus_width as u32, ResponseType::R1))
            .map_err(|_| MmcError::DataWidthError)?;
        if width == BusWidth::Bit4 {
            self.bus.set_bits32(SRS10, SRS10_DATA_WIDTH_4BIT);
        }
        self.bus.write32(SRS13, srs13);
        self.init_complete = true;

        let scr = self.read_scr()?;
        debug!("SCR: {:08x} {:08x}", scr[0], scr[1]);

        self.set_sd_host_device_bus_mode(mode)?;
        self.set_host_sdclk(self.config.clk_rate)?;

        let clk = self.config.clk_rate;
        match mode {
            SpeedMode::SdSdr12 => self.phy_training(PhyDelay::UhsSdr12, clk)?,
            SpeedMode::SdSdr25 => self.phy_training(PhyDelay::UhsSdr25, clk)?,
            SpeedMode::SdSdr50 => {
                self.phy_training(PhyDelay::UhsSdr50, clk)?;
                if self.bus.read32(SRS17) & SRS17_USE_TUNING_SDR50 != 0 {
                    self.sd_tuning()?;
                }
            }
            SpeedMode::SdSdr104 => self.sd_tuning()?,
            SpeedMode::SdDdr50 => self.phy_training(PhyDelay::UhsDdr50, clk)?,
            SpeedMode::SdHighSpeed => self.phy_training(PhyDelay::HighSpeed, clk)?,
            _ => self.phy_training(PhyDelay::DefaultSpeed, clk)?,
        }

        info!("SD card ready, rca {:#x}, {:?}", self.rca, mode);
        Ok(())
    }

    /// CMD11 sequence bringing the bus to 1.8V signalling.
    pub(crate) fn switch_signal_voltage(
        &self,
        width: BusWidth,
        settle_delays: u32,
    ) -> Result<(), MmcError> {
        if width != BusWidth::Bit4 {
            return Err(MmcError::ModeNotSupportDataWidth);
        }
        self.bus.set_bits32(SRS10, SRS10_DATA_WIDTH_4BIT);

        self.send_cmd(MmcCommand::new(SD_CMD_11_VOLTAGE_SWITCH, 0, ResponseType::R1))?;

        self.bus.clear_bits32(SRS11, SRS11_SD_CLOCK_ENABLE);
        if self.bus.read32(SRS09) & PresentState::DAT_LINES.bits() != 0 {
            warn!("DAT lines not driven low after CMD11");
            return Err(MmcError::SwitchVoltageFailed);
        }

        self.enable_1v8_signalling(settle_delays)?;

        let dat = PresentState::DAT_LINES.bits();
        if self.bus.read32(SRS09) & dat != dat {
            return Err(MmcError::SwitchVoltageFailed);
        }
        Ok(())
    }

    fn enable_1v8_signalling(&self, settle_delays: u32) -> Result<(), MmcError> {
        self.bus.set_bits32(SRS15, SRS15_18V_ENABLE);
        for _ in 0..settle_delays {
            delay_cycles(DELAY_COUNT);
        }
        if self.bus.read32(SRS15) & SRS15_18V_ENABLE == 0 {
            return Err(MmcError::SwitchVoltageFailed);
        }

        self.bus.set_bits32(SRS11, SRS11_INT_CLOCK_ENABLE);
        self.wait_set(SRS11, SRS11_INT_CLOCK_STABLE)?;
        self.bus.set_bits32(SRS11, SRS11_SD_CLOCK_ENABLE);
        delay_cycles(DELAY_COUNT);
        Ok(())
    }

    // A card that skipped S18A may still take SDR50 after a switch check
    pub(crate) fn probe_uhs_signalling(&self) -> Result<(), MmcError> {
        let function = SDCARD_SWITCH_ACCESS_MODE_SDR50;
        let arg = switch_arg(function, SDCARD_SWITCH_GROUP_NR_1) | SDCARD_SWITCH_FUNC_MODE_CHECK;

        let mut status = SwitchStatus([0; SWITCH_STATUS_WORDS]);
        self.cmd6_single_block_read(arg, &mut status.0)
            .map_err(|_| MmcError::SdCardNotSupportBusMode)?;

        match status.status_code(SDCARD_SWITCH_GROUP_NR_1) {
            SWITCH_STATUS_NOT_SUPPORTED => Err(MmcError::SdCardNotSupportBusMode),
            code if code == function => {
                self.bus.set_bits32(SRS10, SRS10_DATA_WIDTH_4BIT);
                self.bus.clear_bits32(SRS11, SRS11_SD_CLOCK_ENABLE);
                self.enable_1v8_signalling(2)
            }
            _ => Err(MmcError::TransferFail),
        }
    }

    fn read_scr(&self) -> Result<[u32; 2], MmcError> {
        let mut scr = [0u32; 2];

        self.wait_card_ready()?;
        self.reset_lines()?;

        self.send_cmd(MmcCommand::new(SD_CMD_16, SCR_REG_DATA_SIZE, ResponseType::R1))?;
        self.send_cmd(MmcCommand::new(SD_CMD_55, self.rca_arg(), ResponseType::R1))?;
        let result = self
            .pio_read(&mut scr, SD_ACMD_51, 0)
            .and_then(|_| self.wait_card_ready());

        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result.map(|_| scr)
    }

    fn set_sd_host_device_bus_mode(&self, mode: SpeedMode) -> Result<(), MmcError> {
        self.process_switch_function(access_mode(mode), SDCARD_SWITCH_GROUP_NR_1)?;
        self.set_host_uhsi_mode(mode);
        Ok(())
    }

    fn process_switch_function(&self, function: u8, group: u8) -> Result<(), MmcError> {
        let base = switch_arg(function, group);

        let status = self
            .exec_cmd6(base | SDCARD_SWITCH_FUNC_MODE_CHECK, function, group)
            .map_err(|_| MmcError::SdCardNotSupportBusMode)?;
        if status.status_code(group) == SWITCH_STATUS_NOT_SUPPORTED {
            return Err(MmcError::SdCardNotSupportBusMode);
        }

        let status = self
            .exec_cmd6(base | SDCARD_SWITCH_FUNC_MODE_SWITCH, function, group)
            .map_err(|_| MmcError::SdCardNotSupportBusMode)?;
        if status.status_code(group) != function {
            return Err(MmcError::SdCardCmd6SwitchError);
        }

        debug!("SD switch group {} to function {}", group, function);
        Ok(())
    }

    fn exec_cmd6(&self, arg: u32, function: u8, group: u8) -> Result<SwitchStatus, MmcError> {
        let mut status = SwitchStatus([0; SWITCH_STATUS_WORDS]);

        for _ in 0..COMMANDS_TIMEOUT {
            self.cmd6_single_block_read(arg, &mut status.0)?;
            if status.version() != 1 || !status.busy(group, function) {
                return Ok(status);
            }
        }
        Err(MmcError::TransferFail)
    }

    fn set_host_uhsi_mode(&self, mode: SpeedMode) {
        let (uhs_mode, high_speed) = match mode {
            SpeedMode::SdSdr25 | SpeedMode::SdHighSpeed => (1, true),
            SpeedMode::SdSdr50 => (2, true),
            SpeedMode::SdSdr104 => (3, true),
            SpeedMode::SdDdr50 => (4, true),
            _ => (0, false),
        };

        self.bus
            .modify32(SRS15, |v| (v & !SRS15_DRIVER_TYPE_MASK) | SRS15_DRIVER_TYPE_B);
        if high_speed {
            self.bus.set_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);
        } else {
            self.bus.clear_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);
        }
        self.bus.modify32(SRS15, |v| {
            (v & !SRS15_UHS_MODE_MASK) | (uhs_mode << SRS15_UHS_MODE_SHIFT)
        });
    }
}

fn switch_arg(function: u8, group: u8) -> u32 {
    let shift = (group as u32 - 1) * 4;
    (0x00FF_FFFF & !(0xF << shift)) | ((function as u32) << shift)
}
