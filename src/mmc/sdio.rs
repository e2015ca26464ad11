use log::{debug, info, warn};

use crate::{delay_cycles, err::MmcError};

use super::{
    cmd::{MmcCommand, ResponseType},
    config::{BusMode, BusWidth, SpeedMode},
    constant::*,
    regs::{CmdFlags, RegisterBus},
    sd::pick_card_voltage,
    MmcHost,
};

const CIS_MAX_TUPLES: u32 = 256;
const TUPLE_CISTPL_NULL: u8 = 0x00;
const CCCR_ABORT_RESET: u8 = 0x08;
const CCCR_BUS_WIDTH_MASK: u8 = 0x03;
const CCCR_BUS_WIDTH_4BIT: u8 = 0x02;

/// Contents of the CISTPL_MANFID tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdioManufacturer {
    pub code: u16,
    pub info: u16,
}

fn check_function(function: u8) -> Result<(), MmcError> {
    if function == 0 || function > SDIO_MAX_FUNCTION {
        return Err(MmcError::InvalidParameter);
    }
    Ok(())
}

impl<B: RegisterBus> MmcHost<B> {
    // CMD52, one byte in or out; returns the R5 data byte
    fn io_rw_direct(&self, write: bool, function: u8, addr: u32, data: u8) -> Result<u8, MmcError> {
        let arg = ((write as u32) << 31)
            | ((function as u32 & 0x7) << 28)
            | ((addr & 0x1_FFFF) << 9)
            | data as u32;
        self.send_cmd(MmcCommand::new(SDIO_CMD_52_IO_RW_DIRECT, arg, ResponseType::R5))?;
        Ok((self.response() & 0xFF) as u8)
    }

    /// Read consecutive CCCR bytes starting at `reg`.
    pub fn cccr_read(&self, reg: u32, buf: &mut [u8]) -> Result<(), MmcError> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.io_rw_direct(false, 0, reg + i as u32, 0)?;
        }
        Ok(())
    }

    pub fn cccr_write(&self, reg: u32, data: &[u8]) -> Result<(), MmcError> {
        for (i, byte) in data.iter().enumerate() {
            self.io_rw_direct(true, 0, reg + i as u32, *byte)?;
        }
        Ok(())
    }

    /// Read bytes from the function basic registers of `function`.
    pub fn fbr_read(&self, function: u8, reg: u32, buf: &mut [u8]) -> Result<(), MmcError> {
        check_function(function)?;
        self.cccr_read(FBR_FUNCTION_STRIDE * function as u32 + reg, buf)
    }

    pub fn fbr_write(&self, function: u8, reg: u32, data: &[u8]) -> Result<(), MmcError> {
        check_function(function)?;
        self.cccr_write(FBR_FUNCTION_STRIDE * function as u32 + reg, data)
    }

    /// Walk the tuple chain at `address` and copy the body of the first
    /// `code` tuple into `buf`.
    pub fn cis_tuple(&self, address: u32, code: u8, buf: &mut [u8]) -> Result<(), MmcError> {
        let mut addr = address;

        for _ in 0..CIS_MAX_TUPLES {
            let mut tuple = [0u8; 1];
            self.cccr_read(addr, &mut tuple)?;

            match tuple[0] {
                TUPLE_CISTPL_END => break,
                TUPLE_CISTPL_NULL => {
                    addr += 1;
                    continue;
                }
                _ => {}
            }

            let mut link = [0u8; 1];
            self.cccr_read(addr + 1, &mut link)?;

            if tuple[0] == code {
                let len = buf.len().min(link[0] as usize);
                return self.cccr_read(addr + 2, &mut buf[..len]);
            }
            addr += 2 + link[0] as u32;
        }

        debug!("CIS tuple {:#x} not found from {:#x}", code, address);
        Err(MmcError::TupleNotFound)
    }

    pub(crate) fn sdio_bring_up(&mut self, bus_mode: BusMode) -> Result<(), MmcError> {
        let BusMode::Sd { mode, width } = bus_mode else {
            return Err(MmcError::InvalidParameter);
        };

        let mut s18r = self.is_uhsi_supported();

        self.send_cmd(MmcCommand::new(SD_CMD_5, 0, ResponseType::R4))
            .map_err(|_| MmcError::OpCondError)?;
        let ocr = self.response();

        if matches!(mode, SpeedMode::SdDefaultSpeed | SpeedMode::SdHighSpeed) {
            s18r = false;
        }

        let (card_volt, host_volt) = pick_card_voltage(ocr);
        if host_volt != SRS10_SET_3_3V_BUS_VOLTAGE {
            self.set_sdhost_power(host_volt)?;
        }

        let mut arg = card_volt;
        if s18r {
            arg |= SDCARD_REG_OCR_S18R;
        }

        let mut ocr = 0;
        for _ in 0..self.poll_budget() {
            delay_cycles(DELAY_COUNT);
            self.send_cmd(MmcCommand::new(SD_CMD_5, arg, ResponseType::R4))
                .map_err(|_| MmcError::OpCondError)?;
            ocr = self.response();
            if ocr & SDCARD_R4_CARD_READY != 0 {
                break;
            }
        }
        if ocr & SDCARD_R4_CARD_READY == 0 {
            return Err(MmcError::OpCondError);
        }

        let s18a = ocr & SDCARD_REG_OCR_S18A != 0;
        if s18a {
            self.switch_signal_voltage(width, 2)?;
        }

        self.send_cmd(MmcCommand::new(MMC_CMD_3_SET_RELATIVE_ADDR, 0, ResponseType::R6))
            .map_err(|_| MmcError::RcaError)?;
        self.rca = (self.response() >> 16) & 0xFFFF;

        if !s18a && s18r {
            if let Err(e) = self.probe_uhs_signalling() {
                debug!("UHS-I signalling probe: {}", e);
            }
        }

        let resp = self
            .send_cmd(MmcCommand::new(
                MMC_CMD_7_SELECT_DESELECT_CARD,
                self.rca_arg(),
                ResponseType::R1b,
            ))
            .map_err(|_| MmcError::CardSelectError)?;
        self.check_device_status(resp)?;

        let srs13 = self.bus.read32(SRS13);
        self.bus.write32(SRS13, srs13 & !SRS13_CARD_INTERRUPT_STAT_EN);
        delay_cycles(DELAY_COUNT);

        self.cccr_write(CCCR_ABORT, &[CCCR_ABORT_RESET])?;

        // Function interrupts stay masked across the width change
        let mut int_enable = [0u8; 1];
        self.cccr_read(CCCR_INT_ENABLE, &mut int_enable)?;
        if int_enable[0] & CARD_INT_STATUS_MASK != 0 {
            self.cccr_write(CCCR_INT_ENABLE, &[int_enable[0] & !CARD_INT_STATUS_MASK])?;
        }

        let mut bus_control = [0u8; 1];
        self.cccr_read(CCCR_BUS_CONTROL, &mut bus_control)?;
        let mut value = bus_control[0] & !CCCR_BUS_WIDTH_MASK;
        if width == BusWidth::Bit4 {
            value |= CCCR_BUS_WIDTH_4BIT;
        }
        self.cccr_write(CCCR_BUS_CONTROL, &[value])
            .map_err(|_| MmcError::DataWidthError)?;
        if width == BusWidth::Bit4 {
            self.bus.set_bits32(SRS10, SRS10_DATA_WIDTH_4BIT);
        }

        self.cccr_write(CCCR_INT_ENABLE, &int_enable)?;
        self.cccr_write(CCCR_FN0_BLOCK_SIZE, &(BLK_SIZE as u16).to_le_bytes())?;

        self.bus.write32(SRS13, srs13);
        self.init_complete = true;

        let mut cis = [0u8; 3];
        self.cccr_read(CCCR_CIS_POINTER, &mut cis)?;
        let cis_addr = u32::from_le_bytes([cis[0], cis[1], cis[2], 0]);

        let mut manfid = [0u8; 4];
        self.cis_tuple(cis_addr, TUPLE_CISTPL_MANFID, &mut manfid)?;
        let manufacturer = SdioManufacturer {
            code: u16::from_le_bytes([manfid[0], manfid[1]]),
            info: u16::from_le_bytes([manfid[2], manfid[3]]),
        };
        self.sdio_manufacturer = Some(manufacturer);

        self.change_sdio_device_bus_mode(mode)?;
        self.set_host_sdclk(self.config.clk_rate)?;

        info!(
            "SDIO card ready, rca {:#x}, manufacturer {:#06x}/{:#06x}",
            self.rca, manufacturer.code, manufacturer.info
        );
        Ok(())
    }

    fn change_sdio_device_bus_mode(&self, mode: SpeedMode) -> Result<(), MmcError> {
        let mut high_speed = [0u8; 1];
        self.cccr_read(CCCR_HIGH_SPEED, &mut high_speed)?;
        let mut value = high_speed[0] & !SDIO_CCCR_13_BSS_MASK;

        let bss = match mode {
            SpeedMode::SdHighSpeed | SpeedMode::SdSdr25 => {
                if value & SDIO_CCCR_13_SHS == 0 {
                    return Err(MmcError::SdioBusSpeedUnsupported);
                }
                Some(SDIO_CCCR_13_EHS)
            }
            SpeedMode::SdSdr50 | SpeedMode::SdSdr104 | SpeedMode::SdDdr50 => {
                let mut uhs = [0u8; 1];
                self.cccr_read(CCCR_UHSI_SUPPORT, &mut uhs)?;
                let (needed, bss) = match mode {
                    SpeedMode::SdSdr50 => (SDIO_CCCR_14_SSDR50, SDIO_CCCR_13_BSS_SDR50),
                    SpeedMode::SdSdr104 => (SDIO_CCCR_14_SSDR104, SDIO_CCCR_13_BSS_SDR104),
                    _ => (SDIO_CCCR_14_SDDR50, SDIO_CCCR_13_BSS_DDR50),
                };
                if uhs[0] & needed == 0 {
                    warn!("SDIO card does not support {:?}", mode);
                    return Err(MmcError::SdioBusSpeedUnsupported);
                }
                Some(bss)
            }
            _ => None,
        };

        if let Some(bss) = bss {
            value |= bss;
        }
        self.cccr_write(CCCR_HIGH_SPEED, &[value])?;

        if bss.is_some() {
            self.bus.set_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);
        } else {
            self.bus.clear_bits32(SRS10, SRS10_HIGH_SPEED_ENABLE);
        }
        Ok(())
    }

    fn enable_function(&mut self, function: u8) -> Result<(), MmcError> {
        if self.sdio_functions & (1 << function) != 0 {
            return Ok(());
        }

        let mut enable = [0u8; 1];
        self.cccr_read(CCCR_IO_ENABLE, &mut enable)?;
        self.cccr_write(CCCR_IO_ENABLE, &[enable[0] | (1 << function)])?;

        let mut ready = [0u8; 1];
        let mut budget = self.poll_budget();
        loop {
            self.cccr_read(CCCR_IO_READY, &mut ready)?;
            if ready[0] & (1 << function) != 0 {
                break;
            }
            if budget == 0 {
                return Err(MmcError::Timeout);
            }
            budget -= 1;
        }

        self.fbr_write(function, FBR_BLOCK_SIZE, &(BLK_SIZE as u16).to_le_bytes())?;
        self.sdio_functions |= 1 << function;
        debug!("SDIO function {} enabled", function);
        Ok(())
    }

    fn io_rw_extended_arg(write: bool, function: u8, address: u32) -> u32 {
        ((write as u32) << 31)
            | ((function as u32) << 28)
            | ((address & 0x1_FFFF) << 9)
            | (BLK_SIZE & 0x1FF)
    }

    /// Polled 512-byte CMD53 read from `address` of IO function `function`.
    pub fn sdio_single_block_read(
        &mut self,
        function: u8,
        address: u32,
        dst: &mut [u32; BLK_WORDS],
    ) -> Result<(), MmcError> {
        self.ensure_idle()?;
        check_function(function)?;
        self.enable_function(function)?;

        self.reset_lines()?;
        let arg = Self::io_rw_extended_arg(false, function, address);
        let result = self.pio_read_with(
            dst,
            SDIO_CMD_53_IO_RW_EXTENDED,
            arg,
            CmdFlags::RESPONSE_CHECK_TYPE_R5,
        );

        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }

    /// Polled 512-byte CMD53 write to `address` of IO function `function`.
    pub fn sdio_single_block_write(
        &mut self,
        function: u8,
        address: u32,
        src: &[u32; BLK_WORDS],
    ) -> Result<(), MmcError> {
        self.ensure_idle()?;
        check_function(function)?;
        self.enable_function(function)?;

        self.reset_lines()?;
        let arg = Self::io_rw_extended_arg(true, function, address);
        let result = self.pio_write_with(
            SDIO_CMD_53_IO_RW_EXTENDED,
            arg,
            src,
            CmdFlags::RESPONSE_CHECK_TYPE_R5,
        );

        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }
}
