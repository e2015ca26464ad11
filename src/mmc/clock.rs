use log::{debug, info};

use crate::{delay_cycles, err::MmcError};

use super::{constant::*, regs::RegisterBus, MmcHost};

const MAX_DIVIDER: u32 = 2046;
const TIMEOUT_BASE_INTERVAL: u32 = 8192;
const MAX_TIMEOUT_EXPONENT: u32 = 14;

/// Smallest divider `i` for which `base / i` does not exceed `target`.
pub(crate) fn sd_clock_divider(base_khz: u32, target_khz: u32) -> u32 {
    let mut i = 1;
    while i < MAX_DIVIDER {
        let freq = base_khz / i;
        if freq < target_khz || (freq == target_khz && base_khz % i == 0) {
            break;
        }
        i += 1;
    }
    i
}

/// SRS11 data timeout counter value for `timeout_us` at the given timeout clock.
pub(crate) fn timeout_exponent(clock_khz: u32, timeout_us: u32) -> u32 {
    let mhz = clock_khz / 1000;
    let (sdmclk, timeout) = if mhz == 0 {
        (clock_khz, timeout_us / 1000)
    } else {
        (mhz, timeout_us)
    };

    let mut j = 0;
    while j < MAX_TIMEOUT_EXPONENT {
        let interval = (TIMEOUT_BASE_INTERVAL as u64) << j;
        if (timeout as u64) < interval / sdmclk as u64 {
            break;
        }
        j += 1;
    }
    j
}

impl<B: RegisterBus> MmcHost<B> {
    pub(crate) fn soft_reset(&self) -> Result<(), MmcError> {
        self.bus.set_bits32(HRS00, HRS0_SOFTWARE_RESET);
        delay_cycles(DELAY_COUNT);
        self.wait_clear(HRS00, HRS0_SOFTWARE_RESET)?;
        debug!("host controller reset done");
        Ok(())
    }

    // Program the SD clock divider for the requested rate in kHz
    pub(crate) fn set_host_sdclk(&self, freq_khz: u32) -> Result<(), MmcError> {
        self.bus.clear_bits32(SRS11, SRS11_SD_CLOCK_ENABLE);

        let base_khz = ((self.bus.read32(SRS16) & SRS16_BASE_CLOCK_MASK) >> 8) * 1000;
        if base_khz == 0 {
            return Err(MmcError::BaseClockIsZero);
        }

        let i = sd_clock_divider(base_khz, freq_khz);
        let div = (i / 2) << 8;

        let mut value = self.bus.read32(SRS11);
        value &= !(SRS11_SEL_FREQ_BASE_MASK | SRS11_CLOCK_GENERATOR_SELECT);
        value |= (div & 0xFF00) | ((div & 0x30000) >> 10) | SRS11_INT_CLOCK_ENABLE;
        self.bus.write32(SRS11, value);

        self.wait_set(SRS11, SRS11_INT_CLOCK_STABLE)?;
        self.bus.set_bits32(SRS11, SRS11_SD_CLOCK_ENABLE);

        info!("SD clock: base {} kHz, divider {}, target {} kHz", base_khz, i, freq_khz);
        Ok(())
    }

    pub(crate) fn set_data_timeout(&self, timeout_us: u32) -> Result<(), MmcError> {
        let caps = self.bus.read32(SRS16);
        let mut clock = caps & SRS16_TIMEOUT_CLOCK_MASK;

        if caps & SRS16_TIMEOUT_CLOCK_UNIT_MHZ == 0 && timeout_us < 1000 {
            return Err(MmcError::InvalidParameter);
        }
        if clock == 0 {
            return Err(MmcError::BaseClockIsZero);
        }
        if caps & SRS16_TIMEOUT_CLOCK_UNIT_MHZ != 0 {
            clock *= 1000;
        }

        let j = timeout_exponent(clock, timeout_us);
        self.bus
            .modify32(SRS11, |v| (v & !SRS11_TIMEOUT_MASK) | (j << 16));
        Ok(())
    }

    /// Switch bus power off, or on at the given SRS10 voltage selection.
    pub(crate) fn set_sdhost_power(&self, voltage: u32) -> Result<(), MmcError> {
        self.bus.clear_bits32(SRS10, SRS10_SD_BUS_POWER);
        self.bus.clear_bits32(SRS10, SRS10_BUS_VOLTAGE_MASK);

        if voltage == 0 {
            return Ok(());
        }

        let caps = self.bus.read32(SRS16);
        let supported = match voltage {
            SRS10_SET_3_3V_BUS_VOLTAGE => caps & SRS16_VOLTAGE_3_3V_SUPPORT != 0,
            SRS10_SET_3_0V_BUS_VOLTAGE => caps & SRS16_VOLTAGE_3_0V_SUPPORT != 0,
            SRS10_SET_1_8V_BUS_VOLTAGE => caps & SRS16_VOLTAGE_1_8V_SUPPORT != 0,
            _ => false,
        };
        if !supported {
            return Err(MmcError::InvalidParameter);
        }

        self.bus.set_bits32(SRS10, voltage | SRS10_SD_BUS_POWER);
        delay_cycles(DELAY_COUNT);
        Ok(())
    }

    /// Reset the CMD and DAT line state machines.
    pub(crate) fn reset_lines(&self) -> Result<(), MmcError> {
        self.bus.set_bits32(SRS11, SRS11_RESET_DATA_CMD_LINE);
        self.wait_clear(SRS11, SRS11_RESET_DATA_CMD_LINE)?;
        Ok(())
    }
}
