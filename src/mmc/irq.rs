use log::{debug, trace, warn};
use spin::Mutex;

use super::{
    constant::*,
    regs::{CmdFlags, CqIrqStatus, IrqStatus, Mmio, RegisterBus},
    MmcHost, TransferState,
};

/// Highest priority source pending in an SRS12 snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerEvent {
    Error(u32),
    CommandComplete,
    TransferComplete,
    DmaBoundary,
    CommandQueue,
    Unknown(u32),
    None,
}

impl ControllerEvent {
    pub fn decode(status: u32) -> Self {
        let irq = IrqStatus::from_bits_truncate(status);
        if irq.contains(IrqStatus::ERROR_INTERRUPT) || irq.has_error() {
            ControllerEvent::Error(status)
        } else if irq.contains(IrqStatus::COMMAND_COMPLETE) {
            ControllerEvent::CommandComplete
        } else if irq.contains(IrqStatus::TRANSFER_COMPLETE) {
            ControllerEvent::TransferComplete
        } else if irq.contains(IrqStatus::DMA_INTERRUPT) {
            ControllerEvent::DmaBoundary
        } else if irq.contains(IrqStatus::CMD_QUEUING) {
            ControllerEvent::CommandQueue
        } else if status != 0 {
            ControllerEvent::Unknown(status)
        } else {
            ControllerEvent::None
        }
    }
}

impl<B: RegisterBus> MmcHost<B> {
    /// Service one pending controller interrupt and return the resulting state.
    ///
    /// Only the highest priority source is handled per call, the others stay
    /// latched in SRS12 and raise the line again.
    pub fn handle_interrupt(&mut self) -> TransferState {
        let status = self.bus.read32(SRS12);
        let event = ControllerEvent::decode(status);
        trace!("MMC irq {:#x}: {:?}", status, event);

        match event {
            ControllerEvent::Error(status) => {
                self.bus.write32(SRS12, status);
                warn!("transfer error interrupt: {:#x}", status);
                self.finish(TransferState::Fail, status);
            }
            ControllerEvent::CommandComplete => {
                self.bus.write32(SRS12, IrqStatus::COMMAND_COMPLETE.bits());
                let card_status = self.response();
                if card_status & CARD_STATUS_ALL_ERRORS_MASK != 0 {
                    debug!("card status error in irq: {:#x}", card_status);
                    self.transfer_complete = false;
                    self.finish(TransferState::ResponseError, status);
                } else if self.transfer_complete {
                    self.transfer_complete = false;
                    self.finish(TransferState::Success, status);
                }
            }
            ControllerEvent::TransferComplete => {
                self.bus.write32(SRS12, status);
                if self.multi_block {
                    self.multi_block = false;
                    self.transfer_complete = true;
                    self.issue_cmd(MMC_CMD_12_STOP_TRANSMISSION, self.rca_arg(), CmdFlags::R1_48);
                } else {
                    self.finish(TransferState::Success, status);
                }
            }
            ControllerEvent::DmaBoundary => {
                // Writing the system address back restarts SDMA at the boundary
                let lo = self.bus.read32(SRS22);
                let hi = self.bus.read32(SRS23);
                self.bus.write32(SRS22, lo);
                self.bus.write32(SRS23, hi);
                self.bus.write32(SRS12, IrqStatus::DMA_INTERRUPT.bits());
            }
            ControllerEvent::CommandQueue => {
                self.bus.write32(SRS12, status);
                self.service_cq(status);
            }
            ControllerEvent::Unknown(status) => {
                debug!("unexpected MMC irq status {:#x}", status);
                self.bus.write32(SRS12, status);
            }
            ControllerEvent::None => {}
        }

        self.state
    }

    fn service_cq(&mut self, status: u32) {
        let cq_raw = self.bus.read32(CQRS04);
        self.bus.write32(CQRS04, cq_raw);
        let cq_status = CqIrqStatus::from_bits_truncate(cq_raw);

        if cq_status.contains(CqIrqStatus::RESP_ERR) {
            warn!("command queue response error");
            self.finish(TransferState::Fail, status);
        } else if cq_status.contains(CqIrqStatus::TASK_COMPLETE) {
            let done = self.bus.read32(CQRS11);
            self.bus.write32(CQRS11, done);
            self.cq_task_count = self.cq_task_count.saturating_sub(done.count_ones());
            trace!("CQ tasks {:#x} done, {} left", done, self.cq_task_count);
            if self.cq_task_count == 0 {
                self.finish(TransferState::Success, status);
            }
        }
    }

    fn finish(&mut self, state: TransferState, status: u32) {
        self.bus.write32(SRS14, 0);
        self.state = state;
        if let Some(handler) = self.handler {
            handler(status);
        }
    }
}

/// Controller instance serviced by the platform interrupt entry.
pub static MMC_HOST: Mutex<Option<MmcHost<Mmio>>> = Mutex::new(None);

/// Hand the initialised host over to the interrupt path.
///
/// Returns false if a host is already installed.
pub fn install_host(host: MmcHost<Mmio>) -> bool {
    let mut guard = MMC_HOST.lock();
    if guard.is_none() {
        *guard = Some(host);
        debug!("MMC host installed for interrupt handling");
        true
    } else {
        debug!("MMC host already installed");
        false
    }
}

pub fn take_host() -> Option<MmcHost<Mmio>> {
    MMC_HOST.lock().take()
}

/// Run `f` on the installed host.
///
/// The MMC interrupt line has to be masked around this call. The interrupt
/// entry only tries the lock and skips servicing while it is held here.
pub fn with_host<R>(f: impl FnOnce(&mut MmcHost<Mmio>) -> R) -> Option<R> {
    MMC_HOST.lock().as_mut().map(f)
}

/// PLIC entry for the MMC main interrupt.
///
/// Returns `None` when no host is installed or the foreground holds it.
pub fn mmc_main_plic_irq_handler() -> Option<TransferState> {
    let mut guard = MMC_HOST.try_lock()?;
    guard.as_mut().map(|host| host.handle_interrupt())
}
