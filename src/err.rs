// ===== Driver error codes =====

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmcError {
    InitFailure,
    NotInitialised,
    TransferInProgress,
    TransferFail,
    DataWidthError,
    RcaError,
    CidResponseError,
    OpCondError,
    ResetError,
    CrcError,
    UnsupportedHwRevision,
    InvalidParameter,
    BaseClockIsZero,
    CardStateUnstable,
    CardNotInserted,
    ModeNotSupportDataWidth,
    ClockDividerError,
    ResponseError,
    ErrorInterrupt,
    SwitchVoltageFailed,
    CardSelectError,
    DeviceNotSupportHs400,
    DeviceNotSupportHs200,
    DeviceNotSupportDdr,
    DeviceNotSupportSdr,
    DeviceNotSupportLowPower,
    Hs400ModeSetupFailure,
    DeviceNotSupportCq,
    CqInitFailure,
    CqNotInitialised,
    SdCardNotSupportSpeed,
    SdCardNotSupportVoltage,
    SdCardNotSupportBusMode,
    SdCardCmd6SwitchError,
    SdCardTuningFailed,
    SdioBusSpeedUnsupported,
    DeviceNotSupportHpi,
    DeviceIsNotInHpiMode,
    DeviceHpiNotDisabled,
    DataSizeIsNotMultiBlock,
    TupleNotFound,
    Timeout,
}

impl fmt::Display for MmcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmcError::InitFailure => write!(f, "Initialization failed"),
            MmcError::NotInitialised => write!(f, "Controller not initialised"),
            MmcError::TransferInProgress => write!(f, "Another transfer is in progress"),
            MmcError::TransferFail => write!(f, "Transfer failed"),
            MmcError::DataWidthError => write!(f, "Data width switch failed"),
            MmcError::RcaError => write!(f, "Relative card address not accepted"),
            MmcError::CidResponseError => write!(f, "CID response error"),
            MmcError::OpCondError => write!(f, "Operating condition negotiation failed"),
            MmcError::ResetError => write!(f, "Card reset failed"),
            MmcError::CrcError => write!(f, "CRC error"),
            MmcError::UnsupportedHwRevision => write!(f, "Unsupported hardware revision"),
            MmcError::InvalidParameter => write!(f, "Invalid parameter"),
            MmcError::BaseClockIsZero => write!(f, "Base clock reads as zero"),
            MmcError::CardStateUnstable => write!(f, "Card state not stable"),
            MmcError::CardNotInserted => write!(f, "No card inserted"),
            MmcError::ModeNotSupportDataWidth => write!(f, "Mode does not support this data width"),
            MmcError::ClockDividerError => write!(f, "Clock divider or timing error"),
            MmcError::ResponseError => write!(f, "Card status reported an error"),
            MmcError::ErrorInterrupt => write!(f, "Controller error interrupt"),
            MmcError::SwitchVoltageFailed => write!(f, "1.8V signal switch failed"),
            MmcError::CardSelectError => write!(f, "Card select failed"),
            MmcError::DeviceNotSupportHs400 => write!(f, "Device does not support HS400"),
            MmcError::DeviceNotSupportHs200 => write!(f, "Device does not support HS200"),
            MmcError::DeviceNotSupportDdr => write!(f, "Device does not support DDR"),
            MmcError::DeviceNotSupportSdr => write!(f, "Device does not support SDR"),
            MmcError::DeviceNotSupportLowPower => write!(f, "Device does not support 1.8V operation"),
            MmcError::Hs400ModeSetupFailure => write!(f, "HS400 mode setup failed"),
            MmcError::DeviceNotSupportCq => write!(f, "Device does not support command queuing"),
            MmcError::CqInitFailure => write!(f, "Command queue initialization failed"),
            MmcError::CqNotInitialised => write!(f, "Command queue not initialised"),
            MmcError::SdCardNotSupportSpeed => write!(f, "SD card does not support this speed"),
            MmcError::SdCardNotSupportVoltage => write!(f, "SD card does not support this voltage"),
            MmcError::SdCardNotSupportBusMode => write!(f, "SD card does not support this bus mode"),
            MmcError::SdCardCmd6SwitchError => write!(f, "SD switch function failed"),
            MmcError::SdCardTuningFailed => write!(f, "SD tuning failed"),
            MmcError::SdioBusSpeedUnsupported => write!(f, "SDIO bus speed not supported"),
            MmcError::DeviceNotSupportHpi => write!(f, "Device does not support HPI"),
            MmcError::DeviceIsNotInHpiMode => write!(f, "No transfer paused by HPI"),
            MmcError::DeviceHpiNotDisabled => write!(f, "HPI not disabled"),
            MmcError::DataSizeIsNotMultiBlock => write!(f, "Transfer is not multi-block"),
            MmcError::TupleNotFound => write!(f, "CIS tuple not found"),
            MmcError::Timeout => write!(f, "Timed out waiting for the controller"),
        }
    }
}
