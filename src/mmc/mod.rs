mod block;
mod clock;
mod cmd;
mod cq;
mod emmc;
mod hpi;
mod packed;
mod phy;
mod sd;
mod sdio;

pub mod config;
pub mod constant;
pub mod irq;
pub mod regs;

#[cfg(test)]
pub(crate) mod sim;

use core::fmt::Display;

use log::{debug, info, warn};

use block::AdmaTable;
use config::{BusMode, BusVoltage, CardType, ClockRate, MmcConfig, SpeedMode};
use constant::*;
use cq::TaskDescriptorList;
use hpi::HpiState;
use regs::{PresentState, RegisterBus};

use crate::{delay_cycles, err::MmcError};

pub use block::AdmaDescriptor;
pub use cmd::{CmdResponse, MmcCommand, ResponseType};
pub use emmc::ExtCsd;
pub use hpi::HpiPause;
pub use phy::{longest_valid_window, PhyDelay};
pub use sdio::SdioManufacturer;

/// Driver-visible transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    NotInitialised,
    InitSuccess,
    InitFailure,
    InProgress,
    Success,
    Fail,
    ResponseError,
}

impl TransferState {
    /// Everything but `InProgress` is terminal.
    pub fn is_terminal(&self) -> bool {
        *self != TransferState::InProgress
    }
}

impl Display for TransferState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TransferState::NotInitialised => write!(f, "not initialised"),
            TransferState::InitSuccess => write!(f, "init success"),
            TransferState::InitFailure => write!(f, "init failure"),
            TransferState::InProgress => write!(f, "transfer in progress"),
            TransferState::Success => write!(f, "transfer success"),
            TransferState::Fail => write!(f, "transfer fail"),
            TransferState::ResponseError => write!(f, "response error"),
        }
    }
}

/// MSS MMC host controller with its attached card.
pub struct MmcHost<B: RegisterBus> {
    bus: B,
    config: MmcConfig,
    bus_mode: Option<BusMode>,
    state: TransferState,
    init_complete: bool,
    rca: u32,
    // Set when the in-flight DMA transfer needs a trailing CMD12
    multi_block: bool,
    // Data phase done, waiting for the CMD12 response
    transfer_complete: bool,
    cq_initialised: bool,
    cq_task_count: u32,
    hpi: HpiState,
    sdio_functions: u8,
    sdio_manufacturer: Option<SdioManufacturer>,
    handler: Option<fn(u32)>,
    adma_table: AdmaTable,
    cq_desc: TaskDescriptorList,
}

impl<B: RegisterBus> Display for MmcHost<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "MSS MMC Controller {{ card: {}, rca: {:#x}, state: {}, bus_mode: {:?} }}",
            self.config.card_type, self.rca, self.state, self.bus_mode
        )
    }
}

impl<B: RegisterBus> MmcHost<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            config: MmcConfig::default(),
            bus_mode: None,
            state: TransferState::NotInitialised,
            init_complete: false,
            rca: RCA_VALUE,
            multi_block: false,
            transfer_complete: false,
            cq_initialised: false,
            cq_task_count: 0,
            hpi: HpiState::default(),
            sdio_functions: 0,
            sdio_manufacturer: None,
            handler: None,
            adma_table: AdmaTable::new(),
            cq_desc: TaskDescriptorList::new(),
        }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn config(&self) -> &MmcConfig {
        &self.config
    }

    pub fn bus_mode(&self) -> Option<BusMode> {
        self.bus_mode
    }

    pub fn card_type(&self) -> CardType {
        self.config.card_type
    }

    pub fn rca(&self) -> u32 {
        self.rca
    }

    pub fn is_initialised(&self) -> bool {
        self.init_complete
    }

    pub fn transfer_status(&self) -> TransferState {
        self.state
    }

    /// Completion callback, called from the interrupt handler with the SRS12 snapshot.
    pub fn set_handler(&mut self, handler: fn(u32)) {
        self.handler = Some(handler);
    }

    pub fn sdio_manufacturer(&self) -> Option<SdioManufacturer> {
        self.sdio_manufacturer
    }

    /// Initialize the host controller and bring the card to the configured bus mode.
    pub fn init(&mut self, cfg: MmcConfig) -> Result<(), MmcError> {
        info!("Init MSS MMC controller for {} card", cfg.card_type);

        self.config = cfg;
        self.bus_mode = None;
        self.handler = None;
        self.init_complete = false;
        self.state = TransferState::NotInitialised;
        self.rca = RCA_VALUE;
        self.multi_block = false;
        self.transfer_complete = false;
        self.cq_initialised = false;
        self.cq_task_count = 0;
        self.hpi = HpiState::default();
        self.sdio_functions = 0;
        self.sdio_manufacturer = None;

        let bus_mode = BusMode::from_config(&cfg)?;

        let result = self.bring_up(bus_mode);
        match result {
            Ok(()) => {
                self.bus_mode = Some(bus_mode);
                self.state = TransferState::InitSuccess;
                info!("MSS MMC initialization completed: {}", self);
            }
            Err(e) => {
                self.init_complete = false;
                self.state = TransferState::InitFailure;
                warn!("MSS MMC initialization failed: {}", e);
            }
        }

        self.bus.write32(SRS12, SRS12_CLEAR_KEEP_CARD);
        result
    }

    fn bring_up(&mut self, bus_mode: BusMode) -> Result<(), MmcError> {
        self.controller_setup()?;

        match self.config.card_type {
            CardType::Mmc => {
                self.go_idle()?;
                self.mmc_bring_up(bus_mode)
            }
            CardType::Sd => {
                self.go_idle()?;
                self.sd_bring_up(bus_mode)
            }
            CardType::Sdio => self.sdio_bring_up(bus_mode),
        }
    }

    fn controller_setup(&mut self) -> Result<(), MmcError> {
        self.soft_reset()?;

        self.bus.write32(HRS01, DEBOUNCING_TIME);

        let mode = match self.config.card_type {
            CardType::Mmc => MODE_LEGACY,
            _ => MODE_SDCARD,
        };
        self.set_host_mode(mode);

        self.bus.write32(SRS12, SRS12_STATUS_CLEAR);

        let caps = self.bus.read32(SRS16);
        debug!("MMC capabilities: {:#x}", caps);
        if caps & SRS16_64BIT_SUPPORT != 0 {
            self.bus.set_bits32(SRS15, SRS15_64_BIT_ADDRESSING | SRS15_HOST_4_ENABLE);
        }

        // Status bits latch, nothing is signalled until a transfer arms SRS14
        self.bus.write32(SRS13, SRS13_STATUS_EN);
        self.bus.write32(SRS14, 0);

        self.set_data_timeout(DATA_TIMEOUT_VALUE)?;
        self.set_sdhost_power(0)?;

        let present = PresentState::from_bits_truncate(self.bus.read32(SRS09));
        if !present.contains(PresentState::CARD_STATE_STABLE) {
            return Err(MmcError::CardStateUnstable);
        }
        if self.config.card_type == CardType::Sd && !present.contains(PresentState::CARD_INSERTED) {
            return Err(MmcError::CardNotInserted);
        }

        self.bus
            .clear_bits32(SRS10, SRS10_DATA_WIDTH_4BIT | SRS10_EXTENDED_DATA_TRANSFER_WIDTH);

        let voltage = match (self.config.card_type, self.config.bus_voltage) {
            (CardType::Mmc, BusVoltage::V1_8) => SRS10_SET_1_8V_BUS_VOLTAGE,
            (CardType::Mmc, BusVoltage::V3_3)
                if matches!(
                    self.config.bus_speed_mode,
                    SpeedMode::MmcHs200 | SpeedMode::MmcHs400 | SpeedMode::MmcHs400Es
                ) =>
            {
                warn!("{:?} needs 1.8V signalling", self.config.bus_speed_mode);
                return Err(MmcError::InvalidParameter);
            }
            _ => SRS10_SET_3_3V_BUS_VOLTAGE,
        };
        self.set_sdhost_power(voltage)?;

        self.set_host_sdclk(ClockRate::KHZ_400)?;
        delay_cycles(DELAY_COUNT);

        Ok(())
    }

    fn go_idle(&self) -> Result<(), MmcError> {
        self.send_cmd(MmcCommand::new(MMC_CMD_0_GO_IDLE_STATE, 0, ResponseType::NoResp))
            .map_err(|_| MmcError::ResetError)?;
        delay_cycles(DELAY_COUNT);
        Ok(())
    }

    fn set_host_mode(&self, mode: u32) {
        self.bus
            .modify32(HRS06, |v| (v & !HRS6_EMMC_MODE_MASK) | (mode & HRS6_EMMC_MODE_MASK));
    }

    // Transfer entry guard: initialised and nothing in flight
    fn ensure_idle(&self) -> Result<(), MmcError> {
        if !self.init_complete {
            return Err(MmcError::NotInitialised);
        }
        if self.state == TransferState::InProgress {
            return Err(MmcError::TransferInProgress);
        }
        Ok(())
    }

    fn poll_budget(&self) -> u32 {
        self.config.poll_budget.max(1)
    }

    /// Spin until `done` holds for the value read at `offset`.
    fn wait_for(&self, offset: usize, done: impl Fn(u32) -> bool) -> Result<u32, MmcError> {
        for _ in 0..self.poll_budget() {
            let value = self.bus.read32(offset);
            if done(value) {
                return Ok(value);
            }
        }
        warn!("register {:#x} poll timed out", offset);
        Err(MmcError::Timeout)
    }

    fn wait_set(&self, offset: usize, mask: u32) -> Result<u32, MmcError> {
        self.wait_for(offset, |v| v & mask != 0)
    }

    fn wait_clear(&self, offset: usize, mask: u32) -> Result<u32, MmcError> {
        self.wait_for(offset, |v| v & mask == 0)
    }

    fn wait_not_inhibited(&self) -> Result<(), MmcError> {
        let inhibit = PresentState::CMD_INHIBIT_CMD | PresentState::CMD_INHIBIT_DAT;
        self.wait_clear(SRS09, inhibit.bits())?;
        Ok(())
    }
}
