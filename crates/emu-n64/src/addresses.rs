//! Physical memory map constants.
//!
//! All addresses are physical (post-translation). Register cells are
//! word-sized and big-endian, like everything else on the SysAD bus.

/// RDRAM, including the expansion pak: 8 MiB at physical zero.
pub const RDRAM_SIZE: usize = 8 * 1024 * 1024;

/// SP DMEM/IMEM: 4 KiB each, boot code staging area.
pub const SP_MEM_BASE: u32 = 0x0400_0000;
pub const SP_MEM_SIZE: usize = 0x2000;

/// RSP internal registers.
pub const RSP_REG_BASE: u32 = 0x0404_0000;
pub const RSP_DMA_SPADDR: u32 = 0x0404_0000;
pub const RSP_DMA_RAMADDR: u32 = 0x0404_0004;
pub const RSP_DMA_RDLEN: u32 = 0x0404_0008;
pub const RSP_DMA_WRLEN: u32 = 0x0404_000C;
pub const RSP_STATUS: u32 = 0x0404_0010;
pub const RSP_DMA_FULL: u32 = 0x0404_0014;
pub const RSP_DMA_BUSY: u32 = 0x0404_0018;
pub const RSP_SEMAPHORE: u32 = 0x0404_001C;
pub const RSP_REG_SIZE: usize = 0x20;

/// Video Interface registers.
pub const VI_REG_BASE: u32 = 0x0440_0000;
pub const VI_CTRL_REG: u32 = 0x0440_0000;
pub const VI_ORIGIN_REG: u32 = 0x0440_0004;
pub const VI_WIDTH_REG: u32 = 0x0440_0008;
pub const VI_V_INTR_REG: u32 = 0x0440_000C;
pub const VI_V_CURRENT_REG: u32 = 0x0440_0010;
pub const VI_BURST_REG: u32 = 0x0440_0014;
pub const VI_V_SYNC_REG: u32 = 0x0440_0018;
pub const VI_H_SYNC_REG: u32 = 0x0440_001C;
pub const VI_H_SYNC_LEAP_REG: u32 = 0x0440_0020;
pub const VI_H_VIDEO_REG: u32 = 0x0440_0024;
pub const VI_V_VIDEO_REG: u32 = 0x0440_0028;
pub const VI_V_BURST_REG: u32 = 0x0440_002C;
pub const VI_X_SCALE_REG: u32 = 0x0440_0030;
pub const VI_Y_SCALE_REG: u32 = 0x0440_0034;
pub const VI_TEST_ADDR_REG: u32 = 0x0440_0038;
pub const VI_STAGED_DATA_REG: u32 = 0x0440_003C;
pub const VI_REG_SIZE: usize = 0x40;

/// Audio Interface registers.
pub const AI_REG_BASE: u32 = 0x0450_0000;
pub const AI_DRAM_ADDR: u32 = 0x0450_0000;
pub const AI_LEN: u32 = 0x0450_0004;
pub const AI_CONTROL: u32 = 0x0450_0008;
pub const AI_STATUS: u32 = 0x0450_000C;
pub const AI_DACRATE: u32 = 0x0450_0010;
pub const AI_BITRATE: u32 = 0x0450_0014;
pub const AI_REG_SIZE: usize = 0x18;

/// Peripheral Interface registers.
pub const PI_REG_BASE: u32 = 0x0460_0000;
pub const PI_DRAM_ADDR_REG: u32 = 0x0460_0000;
pub const PI_CART_ADDR_REG: u32 = 0x0460_0004;
pub const PI_RD_LEN_REG: u32 = 0x0460_0008;
pub const PI_WR_LEN_REG: u32 = 0x0460_000C;
pub const PI_STATUS_REG: u32 = 0x0460_0010;
pub const PI_BSD_DOM1_LAT_REG: u32 = 0x0460_0014;
pub const PI_BSD_DOM1_PWD_REG: u32 = 0x0460_0018;
pub const PI_BSD_DOM1_PGS_REG: u32 = 0x0460_001C;
pub const PI_BSD_DOM1_RLS_REG: u32 = 0x0460_0020;
pub const PI_BSD_DOM2_LAT_REG: u32 = 0x0460_0024;
pub const PI_BSD_DOM2_PWD_REG: u32 = 0x0460_0028;
pub const PI_BSD_DOM2_PGS_REG: u32 = 0x0460_002C;
pub const PI_BSD_DOM2_RLS_REG: u32 = 0x0460_0030;
pub const PI_REG_SIZE: usize = 0x34;

/// Serial Interface registers.
pub const SI_REG_BASE: u32 = 0x0480_0000;
pub const SI_DRAM_ADDR: u32 = 0x0480_0000;
pub const SI_PIF_AD_RD64B: u32 = 0x0480_0004;
pub const SI_PIF_AD_WR4B: u32 = 0x0480_0008;
pub const SI_PIF_AD_WR64B: u32 = 0x0480_0010;
pub const SI_PIF_AD_RD4B: u32 = 0x0480_0014;
pub const SI_STATUS: u32 = 0x0480_0018;
pub const SI_REG_SIZE: usize = 0x1C;

/// Cartridge ROM window.
pub const CART_ROM_BASE: u32 = 0x1000_0000;
pub const CART_ROM_END: u32 = 0x1FBF_FFFF;

/// PIF ROM + RAM: 2 KiB, the RAM is the last 64 bytes.
pub const PIF_BASE: u32 = 0x1FC0_0000;
pub const PIF_SIZE: usize = 0x800;
pub const PIF_RAM_OFFSET: usize = 0x7C0;
/// The PIF command byte lives in the last word of PIF RAM.
pub const PIF_COMMAND: u32 = 0x1FC0_07FC;
