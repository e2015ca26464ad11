#![allow(unused)]

// Host register block (HRS)
pub const HRS00: usize = 0x000; // General information, soft reset
pub const HRS01: usize = 0x004; // Debounce setting
pub const HRS04: usize = 0x010; // PHY settings access
pub const HRS06: usize = 0x018; // eMMC control

// Slot register block (SRS)
pub const SRS00: usize = 0x200; // SDMA system address / argument 2
pub const SRS01: usize = 0x204; // Block size / block count
pub const SRS02: usize = 0x208; // Argument 1
pub const SRS03: usize = 0x20C; // Command / transfer mode
pub const SRS04: usize = 0x210; // Response 0
pub const SRS05: usize = 0x214; // Response 1
pub const SRS06: usize = 0x218; // Response 2
pub const SRS07: usize = 0x21C; // Response 3
pub const SRS08: usize = 0x220; // Data buffer port
pub const SRS09: usize = 0x224; // Present state
pub const SRS10: usize = 0x228; // Host control 1
pub const SRS11: usize = 0x22C; // Host control 2 (clock, timeout, resets)
pub const SRS12: usize = 0x230; // Interrupt status
pub const SRS13: usize = 0x234; // Interrupt status enable
pub const SRS14: usize = 0x238; // Interrupt signal enable
pub const SRS15: usize = 0x23C; // Auto CMD error / host control 2
pub const SRS16: usize = 0x240; // Capabilities 1
pub const SRS17: usize = 0x244; // Capabilities 2
pub const SRS18: usize = 0x248; // Max current
pub const SRS22: usize = 0x258; // DMA system address low
pub const SRS23: usize = 0x25C; // DMA system address high

// Command queue register block (CQRS)
pub const CQRS00: usize = 0x400; // Version
pub const CQRS02: usize = 0x408; // Configuration
pub const CQRS04: usize = 0x410; // Interrupt status
pub const CQRS05: usize = 0x414; // Interrupt status enable
pub const CQRS06: usize = 0x418; // Interrupt signal enable
pub const CQRS08: usize = 0x420; // Task descriptor list base low
pub const CQRS09: usize = 0x424; // Task descriptor list base high
pub const CQRS10: usize = 0x428; // Doorbell
pub const CQRS11: usize = 0x42C; // Task completion notification
pub const CQRS16: usize = 0x440; // Send status configuration 1
pub const CQRS17: usize = 0x444; // Send status configuration 2
pub const CQRS18: usize = 0x448; // Direct command response

// HRS00 / HRS04 / HRS06
pub const HRS0_SOFTWARE_RESET: u32 = 0x0000_0001;
pub const DEBOUNCING_TIME: u32 = 0x0030_0000;
pub const HRS_PHY_ACKNOWLEDGE_REQUEST: u32 = 0x0400_0000;
pub const HRS_PHY_WRITE_REQUEST: u32 = 0x0100_0000;
pub const HRS6_EMMC_MODE_MASK: u32 = 0x0000_0007;
pub const HRS6_EMMC_TUNE_VALUE_MASK: u32 = 0x0000_3F00;
pub const HRS6_EMMC_TUNE_REQUEST: u32 = 0x0000_8000;

// eMMC host mode select (HRS06[2:0])
pub const MODE_SDCARD: u32 = 0x0;
pub const MODE_SDR: u32 = 0x2;
pub const MODE_DDR: u32 = 0x3;
pub const MODE_HS200: u32 = 0x4;
pub const MODE_HS400: u32 = 0x5;
pub const MODE_HS400_ES: u32 = 0x6;
pub const MODE_LEGACY: u32 = 0x7;

// SRS01
pub const BLOCK_COUNT_SHIFT: u32 = 16;
pub const SRS1_DMA_BUFF_SIZE_512KB: u32 = 0x0000_7000;

// SRS10
pub const SRS10_SET_3_3V_BUS_VOLTAGE: u32 = 0x7 << 9;
pub const SRS10_SET_3_0V_BUS_VOLTAGE: u32 = 0x6 << 9;
pub const SRS10_SET_1_8V_BUS_VOLTAGE: u32 = 0x5 << 9;
pub const SRS10_BUS_VOLTAGE_MASK: u32 = 0x7 << 9;
pub const SRS10_SD_BUS_POWER: u32 = 0x0000_0100;
pub const SRS10_DMA_SELECT_SDMA: u32 = 0x0 << 3;
pub const SRS10_DMA_SELECT_ADMA2: u32 = 0x2 << 3;
pub const SRS10_DMA_SELECT_MASK: u32 = 0x3 << 3;
pub const SRS10_DATA_WIDTH_4BIT: u32 = 0x0000_0002;
pub const SRS10_EXTENDED_DATA_TRANSFER_WIDTH: u32 = 0x0000_0020;
pub const SRS10_HIGH_SPEED_ENABLE: u32 = 0x0000_0004;

// SRS11
pub const SRS11_TIMEOUT_MASK: u32 = 0xF << 16;
pub const SRS11_SD_CLOCK_ENABLE: u32 = 0x0000_0004;
pub const SRS11_SEL_FREQ_BASE_MASK: u32 = 0x0000_FF00 | 0x0000_00C0;
pub const SRS11_CLOCK_GENERATOR_SELECT: u32 = 0x1 << 5;
pub const SRS11_INT_CLOCK_STABLE: u32 = 0x0000_0002;
pub const SRS11_INT_CLOCK_ENABLE: u32 = 0x0000_0001;
pub const SRS11_RESET_DATA_CMD_LINE: u32 = 0x0600_0000;

// SRS12 helpers (flag type lives in regs.rs)
pub const SRS12_ERROR_STATUS_MASK: u32 = 0xFFFF_8000;
pub const SRS12_STATUS_CLEAR: u32 = 0xFFFF_FFFF;
/// Clears everything except current-limit, card interrupt, removal and insertion.
pub const SRS12_CLEAR_KEEP_CARD: u32 = !(0x0080_0000 | 0x0000_0100 | 0x0000_0080 | 0x0000_0040);

// SRS13 / SRS14
pub const SRS13_STATUS_EN: u32 = (0x1 << 26)
    | 0x0200_0000
    | 0x0100_0000
    | 0x0080_0000
    | 0x0040_0000
    | 0x0020_0000
    | 0x0010_0000
    | 0x0008_0000
    | 0x0004_0000
    | 0x0002_0000
    | 0x0001_0000
    | (0x1 << 12)
    | (0x1 << 9)
    | (0x1 << 10)
    | (0x1 << 11)
    | 0x0000_0080
    | 0x0000_0040
    | 0x0000_0020
    | 0x0000_0010
    | 0x0000_0008
    | 0x0000_0004
    | 0x0000_0002
    | 0x0000_0001;
pub const SRS13_CARD_INTERRUPT_STAT_EN: u32 = 0x0000_0100;
pub const SRS14_COMMAND_COMPLETE_SIG_EN: u32 = 0x0000_0001;
pub const SRS14_TRANSFER_COMPLETE_SIG_EN: u32 = 0x0000_0002;
pub const SRS14_DMA_INTERRUPT_SIG_EN: u32 = 0x0000_0008;
pub const SRS14_CMD_QUEUING_SIG_EN: u32 = 0x0000_4000;
pub const SRS14_COMMAND_TIMEOUT_ERR_SIG_EN: u32 = 0x0001_0000;
pub const SRS14_DATA_TIMEOUT_ERR_SIG_EN: u32 = 0x0010_0000;
pub const SRS14_ADMA_ERROR_SIG_EN: u32 = 0x0200_0000;

// SRS15
pub const SRS15_64_BIT_ADDRESSING: u32 = 0x2000_0000;
pub const SRS15_HOST_4_ENABLE: u32 = 0x1000_0000;
pub const SRS15_SAMPLING_CLOCK_SELECT: u32 = 0x0080_0000;
pub const SRS15_EXECUTE_TUNING: u32 = 0x0040_0000;
pub const SRS15_DRIVER_TYPE_MASK: u32 = 0x3 << 20;
pub const SRS15_DRIVER_TYPE_B: u32 = 0x0 << 20;
pub const SRS15_18V_ENABLE: u32 = 0x0008_0000;
pub const SRS15_UHS_MODE_MASK: u32 = 0x7 << 16;
pub const SRS15_UHS_MODE_SHIFT: u32 = 16;

// SRS16 / SRS17
pub const SRS16_64BIT_SUPPORT: u32 = 0x1000_0000;
pub const SRS16_VOLTAGE_1_8V_SUPPORT: u32 = 0x0400_0000;
pub const SRS16_VOLTAGE_3_0V_SUPPORT: u32 = 0x0200_0000;
pub const SRS16_VOLTAGE_3_3V_SUPPORT: u32 = 0x0100_0000;
pub const SRS16_TIMEOUT_CLOCK_UNIT_MHZ: u32 = 0x0000_0080;
pub const SRS16_BASE_CLOCK_MASK: u32 = 0x0000_FF00;
pub const SRS16_TIMEOUT_CLOCK_MASK: u32 = 0x0000_003F;
pub const SRS17_USE_TUNING_SDR50: u32 = 0x0000_2000;
pub const SRS17_DDR50_SUPPORTED: u32 = 0x0000_0004;
pub const SRS17_SDR104_SUPPORTED: u32 = 0x0000_0002;
pub const SRS17_SDR50_SUPPORTED: u32 = 0x0000_0001;

// ADMA2 descriptor attributes
pub const ADMA2_DESCRIPTOR_TYPE_TRAN: u32 = 0x2 << 4;
pub const ADMA2_DESCRIPTOR_INT: u32 = 0x1 << 2;
pub const ADMA2_DESCRIPTOR_END: u32 = 0x1 << 1;
pub const ADMA2_DESCRIPTOR_VAL: u32 = 0x1 << 0;

// CQRS02 / CQRS04 / CQRS05 / CQRS06
pub const CQRS02_DIRECT_CMD_ENABLE: u32 = 0x0000_1000;
pub const CQRS02_TASK_DESCRIPTOR_SIZE_128: u32 = 1 << 8;
pub const CQRS02_COMMAND_QUEUING_ENABLE: u32 = 0x0000_0001;
pub const CQRS05_TASK_CLEARED_STAT_EN: u32 = 0x0000_0008;
pub const CQRS05_RESP_ERR_STAT_EN: u32 = 0x0000_0004;
pub const CQRS05_TASK_COMPLETE_STAT_EN: u32 = 0x0000_0002;
pub const CQRS06_RESP_ERR_INT_SIG_EN: u32 = 0x0000_0004;
pub const CQRS06_TASK_COMPLETE_INT_SIG_EN: u32 = 0x0000_0002;
pub const CQ_IDLE_TIME: u32 = 0x1000;

// CQ task descriptor fields
pub const CQ_DESC_VALID: u32 = 1 << 0;
pub const CQ_DESC_END: u32 = 1 << 1;
pub const CQ_DESC_INT: u32 = 1 << 2;
pub const CQ_DESC_ACT_TASK: u32 = 5 << 3;
pub const CQ_DESC_ACT_TRAN: u32 = 4 << 3;
pub const CQ_DESC_ACT_NOP: u32 = 0 << 3;
pub const CQ_DESC_CONTEXT_SHIFT: u32 = 7;
pub const CQ_DESC_DATA_DIR_READ: u32 = 1 << 12;
pub const CQ_DESC_DCMD_CMD_TIMING: u32 = 1 << 22;
pub const CQ_DESC_DCMD_RESP_TYPE_R1_R4_R5: u32 = 2 << 23;
pub const CQ_DESC_DCMD_RESP_TYPE_R1B: u32 = 3 << 23;
pub const CQ_DESC_DCMD_RESP_TYPE_NO_RESP: u32 = 0 << 23;
pub const CQ_HOST_NUMBER_OF_TASKS: usize = 32;
pub const CQ_DCMD_TASK_ID: u8 = 31;
pub const CQ_TASK_DESC_WORDS: usize = 8; // task descriptor + transfer descriptor, 128-bit each

// Card status (R1)
pub const CARD_STATUS_READY_FOR_DATA: u32 = 1 << 8;
pub const CARD_STATUS_ALL_ERRORS_MASK: u32 = (1 << 31)
    | (1 << 30)
    | (1 << 29)
    | (1 << 28)
    | (1 << 27)
    | (1 << 26)
    | (1 << 24)
    | (1 << 23)
    | (1 << 22)
    | (1 << 21)
    | (1 << 20)
    | (1 << 19)
    | (1 << 18)
    | (1 << 17)
    | (1 << 15)
    | (1 << 7)
    | (1 << 3);
pub const DEVICE_STATE_MASK: u32 = 0xF00;
pub const DEVICE_STATE_TRANS: u32 = 0x900;

// Command opcodes
pub const MMC_CMD_0_GO_IDLE_STATE: u8 = 0;
pub const MMC_CMD_1_SEND_OP_COND: u8 = 1;
pub const MMC_CMD_2_ALL_SEND_CID: u8 = 2;
pub const MMC_CMD_3_SET_RELATIVE_ADDR: u8 = 3;
pub const MMC_CMD_4_SET_DSR: u8 = 4;
pub const SD_CMD_5: u8 = 5;
pub const MMC_CMD_6_SWITCH: u8 = 6;
pub const MMC_CMD_7_SELECT_DESELECT_CARD: u8 = 7;
pub const MMC_CMD_8_SEND_EXT_CSD: u8 = 8;
pub const SD_CMD_8_SEND_IF_COND: u8 = 8;
pub const MMC_CMD_9_SEND_CSD: u8 = 9;
pub const SD_CMD_11_VOLTAGE_SWITCH: u8 = 11;
pub const MMC_CMD_12_STOP_TRANSMISSION: u8 = 12;
pub const MMC_CMD_13_SEND_STATUS: u8 = 13;
pub const MMC_CMD_15_GOTO_INACTIVE_STATE: u8 = 15;
pub const SD_CMD_16: u8 = 16;
pub const MMC_CMD_17_READ_SINGLE_BLOCK: u8 = 17;
pub const MMC_CMD_18_READ_MULTIPLE_BLOCK: u8 = 18;
pub const SD_CMD_19_SEND_TUNING_BLK: u8 = 19;
pub const MMC_CMD_21_SEND_TUNE_BLK: u8 = 21;
pub const MMC_CMD_23_SET_BLOCK_COUNT: u8 = 23;
pub const MMC_CMD_24_WRITE_SINGLE_BLOCK: u8 = 24;
pub const MMC_CMD_25_WRITE_MULTI_BLOCK: u8 = 25;
pub const SD_ACMD_6: u8 = 6;
pub const SD_ACMD_41_SEND_OP_COND: u8 = 41;
pub const SD_ACMD_51: u8 = 51;
pub const SDIO_CMD_52_IO_RW_DIRECT: u8 = 52;
pub const SDIO_CMD_53_IO_RW_EXTENDED: u8 = 53;
pub const SD_CMD_55: u8 = 55;
pub const CMD_SHIFT: u32 = 24;

// CMD6 arguments (eMMC)
pub const MMC_DW_CSD: u32 = 0x03B7_0000;
pub const MMC_LEGACY_MODE: u32 = 0x03B9_0000;
pub const MMC_HS_MODE: u32 = 0x03B9_0100;
pub const MMC_HS200_MODE: u32 = 0x03B9_0200;
pub const MMC_HS400_MODE: u32 = 0x03B9_0300;
pub const MMC_HPI_ENABLE: u32 = 0x03A1_0100;
pub const MMC_CQ_ENABLE: u32 = 0x030F_0100;
pub const MMC_ES_DUAL_DATA_WIDTH_8BIT: u32 = 0x86;
pub const MMC_DUAL_DATA_WIDTH_8BIT: u32 = 0x6;
pub const MMC_DUAL_DATA_WIDTH_4BIT: u32 = 0x5;
pub const MMC_DATA_WIDTH_8BIT: u32 = 0x2;
pub const MMC_DATA_WIDTH_4BIT: u32 = 0x1;

// Operating conditions
pub const MMC_DEVICE_LOW_POWER: u32 = 0x80;
pub const MMC_DEVICE_LOW_VOLT_SET: u32 = 0x4000_0080;
pub const MMC_DEVICE_3_3V_VOLT_SET: u32 = 0x4030_0000;
pub const BUSY_BIT_MASK: u32 = 0x8000_0000;
pub const IF_COND_27V_33V: u32 = 1 << 8;
pub const SDCARD_REG_OCR_2_9_3_0: u32 = 1 << 17;
pub const SDCARD_REG_OCR_3_0_3_1: u32 = 1 << 18;
pub const SDCARD_REG_OCR_3_2_3_3: u32 = 1 << 20;
pub const SDCARD_REG_OCR_3_3_3_4: u32 = 1 << 21;
pub const SDCARD_REG_OCR_S18R: u32 = 1 << 24;
pub const SDCARD_REG_OCR_S18A: u32 = 1 << 24;
pub const SDCARD_REG_OCR_XPC: u32 = 1 << 28;
pub const SDCARD_REG_OCR_READY: u32 = 1 << 31;
pub const SDCARD_ACMD41_HCS: u32 = 1 << 30;
pub const SDCARD_R4_CARD_READY: u32 = 1 << 31;
pub const MAX_CURRENT_MA: u32 = 150;

// SD switch function (CMD6)
pub const SDCARD_SWITCH_FUNC_MODE_SWITCH: u32 = 0x1 << 31;
pub const SDCARD_SWITCH_FUNC_MODE_CHECK: u32 = 0x0 << 31;
pub const SDCARD_SWITCH_ACCESS_MODE_SDR12: u8 = 0x0;
pub const SDCARD_SWITCH_ACCESS_MODE_SDR25: u8 = 0x1;
pub const SDCARD_SWITCH_ACCESS_MODE_SDR50: u8 = 0x2;
pub const SDCARD_SWITCH_ACCESS_MODE_SDR104: u8 = 0x3;
pub const SDCARD_SWITCH_ACCESS_MODE_DDR50: u8 = 0x4;
pub const SDCARD_SWITCH_GROUP_NR_1: u8 = 1;
pub const SDCARD_BIS_BUS_WIDTH_4BIT: u8 = 0x02;
pub const SDCARD_BIS_BUS_WIDTH_1BIT: u8 = 0x00;
pub const SDCARD_BUSWIDTH_MASK: u8 = 0xFC;

// SDIO CCCR / FBR / CIS
pub const CCCR_IO_ENABLE: u32 = 2;
pub const CCCR_IO_READY: u32 = 3;
pub const CCCR_INT_ENABLE: u32 = 4;
pub const CCCR_ABORT: u32 = 6;
pub const CCCR_BUS_CONTROL: u32 = 7;
pub const CCCR_CARD_CAPABILITY: u32 = 8;
pub const CCCR_CIS_POINTER: u32 = 9;
pub const CCCR_FN0_BLOCK_SIZE: u32 = 16;
pub const CCCR_HIGH_SPEED: u32 = 19;
pub const CCCR_UHSI_SUPPORT: u32 = 20;
pub const FBR_ADDR_CIS: u32 = 9;
pub const FBR_ADDR_CSA: u32 = 12;
pub const FBR_BLOCK_SIZE: u32 = 16;
pub const FBR_FUNCTION_STRIDE: u32 = 0x100;
pub const TUPLE_CISTPL_MANFID: u8 = 32;
pub const TUPLE_CISTPL_END: u8 = 255;
pub const SDIO_CCCR_13_SHS: u8 = 0x01;
pub const SDIO_CCCR_13_EHS: u8 = 0x02;
pub const SDIO_CCCR_13_BSS_MASK: u8 = 0x7 << 1;
pub const SDIO_CCCR_13_BSS_SDR50: u8 = 0x2 << 1;
pub const SDIO_CCCR_13_BSS_SDR104: u8 = 0x3 << 1;
pub const SDIO_CCCR_13_BSS_DDR50: u8 = 0x4 << 1;
pub const SDIO_CCCR_14_SSDR50: u8 = 0x1 << 0;
pub const SDIO_CCCR_14_SSDR104: u8 = 0x1 << 1;
pub const SDIO_CCCR_14_SDDR50: u8 = 0x1 << 2;
pub const CARD_INT_STATUS_MASK: u8 = 0xFE;
pub const SDIO_MAX_FUNCTION: u8 = 7;

// EXT_CSD byte offsets
pub const EXT_CSD_CQ_MODE_EN_OFFSET: usize = 15;
pub const EXT_CSD_ES_SUPPORT_OFFSET: usize = 184;
pub const EXT_CSD_HS_TIMING_OFFSET: usize = 185;
pub const EXT_CSD_REVISION_OFFSET: usize = 192;
pub const EXT_CSD_CARD_TYPE_OFFSET: usize = 196;
pub const EXT_CSD_SECTOR_COUNT_OFFSET: usize = 212;
pub const EXT_CSD_CORRECTLY_PRG_SECTORS_OFFSET: usize = 242;
pub const EXT_CSD_CQ_DEPTH_OFFSET: usize = 307;
pub const EXT_CSD_CQ_SUPPORT_OFFSET: usize = 308;

// EXT_CSD device type bits
pub const DEVICE_SUPPORT_HS400: u8 = 0x40;
pub const DEVICE_SUPPORT_HS200: u8 = 0x10;
pub const DEVICE_SUPPORT_DDR: u8 = 0x04;
pub const DEVICE_SUPPORT_SDR_50MHZ: u8 = 0x02;
pub const DEVICE_SUPPORT_SDR_25MHZ: u8 = 0x01;
pub const DEVICE_HPI_SUPPORT: u8 = 0x01;
pub const HPI_WITH_CMD12_SUPPORT: u8 = 0x02;

// Block read sentinels
pub const READ_SEND_EXT_CSD: u32 = 0xFFFF_FFFF;
pub const READ_SEND_SCR: u32 = 0xFFFF_FFFE;
pub const SCR_REG_DATA_SIZE: u32 = 8;

// Sizes and limits
pub const BLK_SIZE: u32 = 512;
pub const BLK_WORDS: usize = 128;
pub const WORD_SIZE: u32 = 4;
pub const SIZE_64KB: u32 = 0x0001_0000;
pub const SIZE_32MB: u32 = 0x0200_0000;
pub const SIZE_1GB: u32 = 0x4000_0000;
pub const ADMA_MAX_DESCRIPTORS: usize = (SIZE_32MB / SIZE_64KB) as usize;
pub const RCA_VALUE: u32 = 0x0001;
pub const RCA_SHIFT: u32 = 16;
pub const DATA_TIMEOUT_VALUE: u32 = 500_000;
pub const COMMANDS_TIMEOUT: u32 = 3000;
pub const DELAY_COUNT: u32 = 0xFFFF;
pub const SECTOR_ACCESS_MODE_MASK: u32 = 0x6000_0000;
pub const SD_TUNING_ITERATIONS: u32 = 40;
pub const TUNING_POSITIONS: usize = 40;

// PHY delay line addresses
pub const UIS_ADDR_HIGH_SPEED: u8 = 0x00;
pub const UIS_ADDR_DEFAULT_SPEED: u8 = 0x01;
pub const UIS_ADDR_UHSI_SDR12: u8 = 0x02;
pub const UIS_ADDR_UHSI_SDR25: u8 = 0x03;
pub const UIS_ADDR_UHSI_SDR50: u8 = 0x04;
pub const UIS_ADDR_UHSI_DDR50: u8 = 0x05;
pub const UIS_ADDR_MMC_LEGACY: u8 = 0x06;
pub const UIS_ADDR_MMC_SDR: u8 = 0x07;
pub const UIS_ADDR_MMC_DDR: u8 = 0x08;
pub const UIS_ADDR_SDCLK: u8 = 0x0B;
pub const UIS_ADDR_HS_SDCLK: u8 = 0x0C;
pub const UIS_ADDR_DAT_STROBE: u8 = 0x0D;
