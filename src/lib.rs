#![cfg_attr(not(test), no_std)]

pub mod err;
pub mod mmc;

pub use err::MmcError;
pub use mmc::config::{BusMode, BusVoltage, BusWidth, CardType, ClockRate, MmcConfig, SpeedMode};
pub use mmc::irq::{
    install_host, mmc_main_plic_irq_handler, take_host, with_host, ControllerEvent, MMC_HOST,
};
pub use mmc::regs::{Mmio, RegisterBus};
pub use mmc::{HpiPause, MmcHost, SdioManufacturer, TransferState};

/// Busy-wait for roughly `count` loop iterations.
pub(crate) fn delay_cycles(count: u32) {
    cfg_if::cfg_if! {
        if #[cfg(test)] {
            let _ = count;
        } else {
            use core::sync::atomic::{fence, Ordering};
            for _ in 0..count {
                // Keep the loop from being optimized away
                fence(Ordering::SeqCst);
            }
        }
    }
}
