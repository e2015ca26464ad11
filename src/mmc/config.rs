use core::fmt;

use crate::err::MmcError;

use super::constant::*;

/// Clock rates in kHz.
pub struct ClockRate;

impl ClockRate {
    pub const KHZ_400: u32 = 400;
    pub const MHZ_12_5: u32 = 12_500;
    pub const MHZ_25: u32 = 25_000;
    pub const MHZ_26: u32 = 26_000;
    pub const MHZ_50: u32 = 50_000;
    pub const MHZ_70: u32 = 70_000;
    pub const MHZ_100: u32 = 100_000;
    pub const MHZ_200: u32 = 200_000;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Mmc,
    Sd,
    Sdio,
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CardType::Mmc => write!(f, "eMMC"),
            CardType::Sd => write!(f, "SD"),
            CardType::Sdio => write!(f, "SDIO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusWidth {
    Bit1,
    Bit4,
    Bit8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusVoltage {
    V3_3,
    V1_8,
}

/// Requested bus speed mode. The eMMC modes map onto the host mode select
/// field, the SD modes onto UHS-I / switch function settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedMode {
    MmcLegacy,
    MmcSdr,
    MmcDdr,
    MmcHs200,
    MmcHs400,
    MmcHs400Es,
    SdDefaultSpeed,
    SdHighSpeed,
    SdSdr12,
    SdSdr25,
    SdSdr50,
    SdSdr104,
    SdDdr50,
}

impl SpeedMode {
    /// Value programmed into the host mode select field.
    pub fn host_mode(&self) -> u32 {
        match self {
            SpeedMode::MmcSdr => MODE_SDR,
            SpeedMode::MmcDdr => MODE_DDR,
            SpeedMode::MmcHs200 => MODE_HS200,
            SpeedMode::MmcHs400 => MODE_HS400,
            SpeedMode::MmcHs400Es => MODE_HS400_ES,
            SpeedMode::MmcLegacy => MODE_LEGACY,
            _ => MODE_SDCARD,
        }
    }

    pub fn is_mmc(&self) -> bool {
        matches!(
            self,
            SpeedMode::MmcLegacy
                | SpeedMode::MmcSdr
                | SpeedMode::MmcDdr
                | SpeedMode::MmcHs200
                | SpeedMode::MmcHs400
                | SpeedMode::MmcHs400Es
        )
    }

    /// UHS-I modes need the 1.8V signalling request.
    pub fn is_uhs(&self) -> bool {
        !self.is_mmc() && !matches!(self, SpeedMode::SdDefaultSpeed | SpeedMode::SdHighSpeed)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MmcConfig {
    pub card_type: CardType,
    /// Target SD clock in kHz.
    pub clk_rate: u32,
    pub bus_speed_mode: SpeedMode,
    pub data_bus_width: BusWidth,
    /// eMMC only.
    pub bus_voltage: BusVoltage,
    /// Upper bound on every register poll and busy retry.
    pub poll_budget: u32,
}

impl Default for MmcConfig {
    fn default() -> Self {
        Self {
            card_type: CardType::Mmc,
            clk_rate: ClockRate::KHZ_400,
            bus_speed_mode: SpeedMode::MmcLegacy,
            data_bus_width: BusWidth::Bit1,
            bus_voltage: BusVoltage::V3_3,
            poll_budget: 0x0010_0000,
        }
    }
}

impl MmcConfig {
    pub fn new(card_type: CardType) -> Self {
        let bus_speed_mode = match card_type {
            CardType::Mmc => SpeedMode::MmcLegacy,
            CardType::Sd | CardType::Sdio => SpeedMode::SdDefaultSpeed,
        };
        Self {
            card_type,
            bus_speed_mode,
            ..Default::default()
        }
    }

    pub fn with_clock(mut self, clk_rate_khz: u32) -> Self {
        self.clk_rate = clk_rate_khz;
        self
    }

    pub fn with_speed_mode(mut self, mode: SpeedMode) -> Self {
        self.bus_speed_mode = mode;
        self
    }

    pub fn with_bus_width(mut self, width: BusWidth) -> Self {
        self.data_bus_width = width;
        self
    }

    pub fn with_voltage(mut self, voltage: BusVoltage) -> Self {
        self.bus_voltage = voltage;
        self
    }

    pub fn with_poll_budget(mut self, budget: u32) -> Self {
        self.poll_budget = budget;
        self
    }
}

/// eMMC HS timing switch kinds used by `device_set_hs_timing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcTiming {
    Legacy,
    Sdr,
    Ddr,
    Hs200,
}

/// A validated bus mode. Each variant carries only what its setup path needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    MmcLegacy { width: BusWidth },
    MmcSdr { width: BusWidth },
    /// DDR uses the dual data rate width encodings (4-bit or 8-bit only).
    MmcDdr { dual_width: u32 },
    MmcHs200 { width: BusWidth },
    MmcHs400 { enhanced_strobe: bool },
    Sd { mode: SpeedMode, width: BusWidth },
}

impl BusMode {
    pub fn from_config(cfg: &MmcConfig) -> Result<Self, MmcError> {
        let mode = cfg.bus_speed_mode;
        let width = cfg.data_bus_width;

        match cfg.card_type {
            CardType::Mmc if !mode.is_mmc() => return Err(MmcError::InvalidParameter),
            CardType::Sd | CardType::Sdio if mode.is_mmc() => {
                return Err(MmcError::InvalidParameter);
            }
            _ => {}
        }

        let bus_mode = match mode {
            SpeedMode::MmcLegacy => BusMode::MmcLegacy { width },
            SpeedMode::MmcSdr => BusMode::MmcSdr { width },
            SpeedMode::MmcDdr => match width {
                BusWidth::Bit8 => BusMode::MmcDdr { dual_width: MMC_DUAL_DATA_WIDTH_8BIT },
                BusWidth::Bit4 => BusMode::MmcDdr { dual_width: MMC_DUAL_DATA_WIDTH_4BIT },
                BusWidth::Bit1 => return Err(MmcError::ModeNotSupportDataWidth),
            },
            SpeedMode::MmcHs200 => match width {
                BusWidth::Bit1 => return Err(MmcError::ModeNotSupportDataWidth),
                _ => BusMode::MmcHs200 { width },
            },
            SpeedMode::MmcHs400 | SpeedMode::MmcHs400Es => match width {
                BusWidth::Bit8 => BusMode::MmcHs400 {
                    enhanced_strobe: mode == SpeedMode::MmcHs400Es,
                },
                _ => return Err(MmcError::ModeNotSupportDataWidth),
            },
            _ => {
                if mode.is_uhs() && width != BusWidth::Bit4 {
                    return Err(MmcError::ModeNotSupportDataWidth);
                }
                if width == BusWidth::Bit8 {
                    return Err(MmcError::ModeNotSupportDataWidth);
                }
                BusMode::Sd { mode, width }
            }
        };

        Ok(bus_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hs400_needs_eight_bit_bus() {
        let cfg = MmcConfig::new(CardType::Mmc)
            .with_speed_mode(SpeedMode::MmcHs400)
            .with_bus_width(BusWidth::Bit4);
        assert_eq!(BusMode::from_config(&cfg), Err(MmcError::ModeNotSupportDataWidth));

        let cfg = cfg.with_bus_width(BusWidth::Bit8).with_speed_mode(SpeedMode::MmcHs400Es);
        assert_eq!(
            BusMode::from_config(&cfg),
            Ok(BusMode::MmcHs400 { enhanced_strobe: true })
        );
    }

    #[test]
    fn ddr_carries_dual_width_encoding() {
        let cfg = MmcConfig::new(CardType::Mmc)
            .with_speed_mode(SpeedMode::MmcDdr)
            .with_bus_width(BusWidth::Bit4);
        assert_eq!(BusMode::from_config(&cfg), Ok(BusMode::MmcDdr { dual_width: 0x5 }));

        let cfg = cfg.with_bus_width(BusWidth::Bit1);
        assert_eq!(BusMode::from_config(&cfg), Err(MmcError::ModeNotSupportDataWidth));
    }

    #[test]
    fn card_and_mode_families_must_match() {
        let cfg = MmcConfig::new(CardType::Sd).with_speed_mode(SpeedMode::MmcHs200);
        assert_eq!(BusMode::from_config(&cfg), Err(MmcError::InvalidParameter));

        let cfg = MmcConfig::new(CardType::Mmc).with_speed_mode(SpeedMode::SdSdr50);
        assert_eq!(BusMode::from_config(&cfg), Err(MmcError::InvalidParameter));
    }

    #[test]
    fn uhs_modes_need_four_bit_bus() {
        let cfg = MmcConfig::new(CardType::Sd).with_speed_mode(SpeedMode::SdSdr104);
        assert_eq!(BusMode::from_config(&cfg), Err(MmcError::ModeNotSupportDataWidth));

        let cfg = cfg.with_bus_width(BusWidth::Bit4);
        assert!(BusMode::from_config(&cfg).is_ok());

        let cfg = MmcConfig::new(CardType::Sd).with_speed_mode(SpeedMode::SdHighSpeed);
        assert!(BusMode::from_config(&cfg).is_ok());
    }
}
